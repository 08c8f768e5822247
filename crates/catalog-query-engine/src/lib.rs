//! # catalog-query-engine
//!
//! A search-driven, lazily paginated listing engine for large catalog tables.
//!
//! Classic admin listings count the whole table, paginate with OFFSET and
//! filter through an ORM on every request. This engine instead:
//!
//! - never runs an unfiltered listing query (no term, no query);
//! - builds its own `WHERE`/`INNER JOIN`/`ORDER BY`/`LIMIT`/`OFFSET` from a
//!   handful of request parameters;
//! - counts each distinct search once per session and reuses that count
//!   while the client pages through it;
//! - searches one chosen field, including a related-table field reached
//!   through a foreign-key chain (`author__name`).
//!
//! ## Core Types
//!
//! - **[`TableDescriptor`]**: immutable table/column metadata
//! - **[`SearchRequest`]**: one request's term, field selector, order code and page
//! - **[`SearchEngine`]**: the concrete [`SearchListing`] implementation
//! - **[`SessionStore`]**: per-session count cache
//! - **[`QueryExecutor`]**: where statements run; [`SqliteExecutor`] for SQLite
//!
//! ## Example
//!
//! ```no_run
//! use catalog_query_engine::{
//!    DescriptorConfig, EngineConfig, SearchEngine, SearchRequest, SessionStore,
//!    SqliteExecutor, TableDescriptor,
//! };
//! use catalog_sqlite_conn_mgr::SqliteDatabase;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = TableDescriptor::from_config(
//!    DescriptorConfig::new("books_book")
//!       .with_columns(["id", "title", "serial_number"])
//!       .with_search_fields(["title", "serial_number"]),
//! )?;
//! let engine = SearchEngine::new(descriptor, EngineConfig::default())?;
//! let executor = SqliteExecutor::new(SqliteDatabase::connect("books.db", None).await?);
//! let sessions = SessionStore::new();
//! let session = sessions.new_session();
//!
//! let page = engine
//!    .search(&executor, &sessions, &session, &SearchRequest::new("atlas"))
//!    .await?;
//! println!("{} of {}", page.rows.len(), page.total_count);
//! # Ok(())
//! # }
//! ```

pub mod clauses;
mod config;
mod count_cache;
mod decode;
pub mod descriptor;
mod engine;
mod error;
mod executor;
pub mod planner;
pub mod window;

pub use clauses::{OrderCode, OrderTerm};
pub use config::{EngineConfig, OutOfRangePolicy};
pub use count_cache::{
   DEFAULT_MAX_SESSIONS, SessionCountState, SessionStore, get_count, query_key,
};
pub use descriptor::{
   ColumnSpec, DescriptorConfig, RelationConfig, RelationHop, SortDirection, SortKey,
   TableDescriptor,
};
pub use engine::{SearchEngine, SearchListing, SearchResults};
pub use error::{Error, Result};
pub use executor::{QueryExecutor, Row, SqliteExecutor};
pub use planner::{CountQuery, QueryPlan, SearchRequest};
pub use window::PageWindow;
