/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for search planning and execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// The descriptor or engine configuration does not match the data it
   /// describes. Not recoverable per request.
   #[error("configuration error: {0}")]
   Configuration(String),

   /// No search term was supplied; callers serve an empty listing.
   #[error("no search term supplied")]
   EmptySearch,

   /// The requested page lies beyond the available results.
   #[error("page {page} is out of range (there are {num_pages} pages)")]
   InvalidPage { page: u64, num_pages: u64 },

   /// The field selector does not index into the searchable fields.
   #[error("field selector {index} is out of range ({available} searchable fields)")]
   InvalidFieldSelector { index: usize, available: usize },

   /// An order code could not be parsed.
   #[error("invalid order code '{0}': expected dot-separated signed column indices")]
   InvalidOrderCode(String),

   /// Table or column name contains invalid characters.
   ///
   /// Identifiers must match `[a-zA-Z_][a-zA-Z0-9_]*`.
   #[error("invalid identifier '{name}': must match [a-zA-Z_][a-zA-Z0-9_]*")]
   InvalidColumnName { name: String },

   /// An exact lookup was issued without any field to match on.
   #[error("lookup requires at least one field")]
   EmptyLookup,

   /// An exact lookup matched more than one row.
   #[error("lookup matched {0} rows, expected 0 or 1")]
   MultipleRowsReturned(usize),

   /// SQLite type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] catalog_sqlite_conn_mgr::Error),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::Configuration(_) => "CONFIGURATION_ERROR".to_string(),
         Error::EmptySearch => "EMPTY_SEARCH".to_string(),
         Error::InvalidPage { .. } => "INVALID_PAGE".to_string(),
         Error::InvalidFieldSelector { .. } => "INVALID_FIELD_SELECTOR".to_string(),
         Error::InvalidOrderCode(_) => "INVALID_ORDER_CODE".to_string(),
         Error::InvalidColumnName { .. } => "INVALID_COLUMN_NAME".to_string(),
         Error::EmptyLookup => "EMPTY_LOOKUP".to_string(),
         Error::MultipleRowsReturned(_) => "MULTIPLE_ROWS_RETURNED".to_string(),
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
      }
   }

   /// Whether the failure came from the storage layer (connectivity or SQL).
   ///
   /// Storage errors are never retried here; they propagate to the caller.
   pub fn is_storage(&self) -> bool {
      matches!(
         self,
         Error::Sqlx(_) | Error::ConnectionManager(_) | Error::UnsupportedDatatype(_)
      )
   }
}
