use std::path::PathBuf;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// Errors surfaced by the catalog search facade.
#[derive(Error, Debug)]
pub enum Error {
   /// Error from the listing engine (planning, paging, decoding, SQL).
   #[error(transparent)]
   Engine(#[from] catalog_query_engine::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] catalog_sqlite_conn_mgr::Error),

   /// Configuration file could not be read or parsed.
   #[error("invalid configuration file {}: {source}", path.display())]
   Config {
      path: PathBuf,
      #[source]
      source: Box<dyn std::error::Error + Send + Sync>,
   },

   #[error("JSON error: {0}")]
   Json(#[from] serde_json::Error),
}

impl Error {
   /// Machine-readable code for callers that render errors.
   pub fn error_code(&self) -> String {
      match self {
         Error::Engine(e) => e.error_code(),
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
         Error::Config { .. } => "CONFIGURATION_ERROR".to_string(),
         Error::Json(_) => "JSON_ERROR".to_string(),
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let mut state = serializer.serialize_struct("Error", 2)?;
      state.serialize_field("code", &self.error_code())?;
      state.serialize_field("message", &self.to_string())?;
      state.end()
   }
}

pub type Result<T> = std::result::Result<T, Error>;
