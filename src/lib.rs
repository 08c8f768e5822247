//! # catalog-search
//!
//! Search-driven listings over large SQLite catalog tables.
//!
//! A listing stays blank until a search term arrives. Each distinct search
//! is counted once per session; paging through it afterwards costs one
//! `LIMIT`/`OFFSET` query per page.
//!
//! ## Example
//!
//! ```no_run
//! use catalog_search::{CatalogSearch, CatalogSearchConfig, ListingParams};
//!
//! # async fn run() -> catalog_search::Result<()> {
//! let config = CatalogSearchConfig::from_path("catalog.json")?;
//! let catalog = CatalogSearch::open(config).await?;
//!
//! let session = catalog.new_session();
//! let params = ListingParams::from_pairs([("q", "atlas"), ("o", "-2"), ("p", "2")]);
//! let listing = catalog.listing(&session, &params).await?;
//! println!("{} matches", listing.results.total_count);
//!
//! catalog.close().await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use catalog_query_engine::{
   DescriptorConfig, EngineConfig, QueryExecutor, Row, SearchEngine, SearchRequest,
   SearchResults, SessionStore, SqliteExecutor, TableDescriptor,
};
use catalog_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
use serde::Serialize;
use tracing::debug;

mod config;
mod error;
mod params;

pub use config::{CatalogSearchConfig, DatabaseSection};
pub use error::{Error, Result};
pub use params::ListingParams;

pub use catalog_query_engine as engine;
pub use catalog_sqlite_conn_mgr as conn_mgr;

/// A rendered listing: the page plus what the presentation layer needs to
/// draw its search box, column headers and navigation links.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
   /// Search term as received
   pub query: Option<String>,
   /// Field selector in effect, if one was given and valid
   pub field_selector: Option<usize>,
   /// Canonical order code in effect, if one was given and valid
   pub order: Option<String>,
   /// Display column names, in order-code index order
   pub columns: Vec<String>,
   /// Searchable field names, in field-selector index order
   pub search_fields: Vec<String>,
   pub results: SearchResults,
}

/// Builder for a [`CatalogSearch`].
#[derive(Debug, Clone)]
pub struct Builder {
   descriptor: DescriptorConfig,
   engine: EngineConfig,
   database: Option<SqliteDatabaseConfig>,
}

impl Builder {
   pub fn new(descriptor: DescriptorConfig) -> Self {
      Self {
         descriptor,
         engine: EngineConfig::default(),
         database: None,
      }
   }

   pub fn engine_config(mut self, engine: EngineConfig) -> Self {
      self.engine = engine;
      self
   }

   pub fn database_config(mut self, database: SqliteDatabaseConfig) -> Self {
      self.database = Some(database);
      self
   }

   /// Validate the configuration and run statements on `executor`.
   pub fn build_with<E: QueryExecutor>(self, executor: E) -> Result<CatalogSearch<E>> {
      let descriptor = TableDescriptor::from_config(self.descriptor)?;
      let engine = SearchEngine::new(descriptor, self.engine)?;

      Ok(CatalogSearch::assemble(engine, executor))
   }

   /// Validate the configuration and connect to the SQLite file at `path`.
   ///
   /// The descriptor is checked before any connection is opened.
   pub async fn open(self, path: impl AsRef<Path>) -> Result<CatalogSearch> {
      let descriptor = TableDescriptor::from_config(self.descriptor)?;
      let engine = SearchEngine::new(descriptor, self.engine)?;

      let db = SqliteDatabase::connect(path.as_ref(), self.database).await?;
      debug!("catalog {} opened", engine.descriptor().table_name());

      Ok(CatalogSearch::assemble(engine, SqliteExecutor::new(db)))
   }
}

impl From<&CatalogSearchConfig> for Builder {
   fn from(config: &CatalogSearchConfig) -> Self {
      Builder::new(config.descriptor.clone())
         .engine_config(config.engine.clone())
         .database_config(config.database.pool.clone())
   }
}

/// One searchable catalog listing with its per-session count cache.
pub struct CatalogSearch<E = SqliteExecutor> {
   engine: SearchEngine,
   executor: E,
   sessions: SessionStore,
}

impl CatalogSearch {
   /// Open the listing described by a configuration file.
   pub async fn open(config: CatalogSearchConfig) -> Result<Self> {
      Builder::from(&config).open(&config.database.path).await
   }

   /// Close the underlying database. Later requests fail with a
   /// connection error.
   pub async fn close(&self) -> Result<()> {
      self.executor.database().close().await?;
      debug!("catalog {} closed", self.engine.descriptor().table_name());
      Ok(())
   }
}

impl<E: QueryExecutor> CatalogSearch<E> {
   fn assemble(engine: SearchEngine, executor: E) -> Self {
      let sessions = SessionStore::with_max_sessions(engine.config().max_sessions);
      Self {
         engine,
         executor,
         sessions,
      }
   }

   pub fn engine(&self) -> &SearchEngine {
      &self.engine
   }

   pub fn executor(&self) -> &E {
      &self.executor
   }

   pub fn sessions(&self) -> &SessionStore {
      &self.sessions
   }

   /// Mint a session id for a new client.
   pub fn new_session(&self) -> String {
      self.sessions.new_session()
   }

   /// Drop a session's cached count. Returns whether it existed.
   pub fn forget_session(&self, session_id: &str) -> bool {
      self.sessions.forget(session_id)
   }

   /// Serve a listing from raw query parameters.
   pub async fn listing(
      &self,
      session_id: &str,
      params: &ListingParams,
   ) -> Result<ListingResponse> {
      let descriptor = self.engine.descriptor();
      let request = params.to_request(descriptor.searchable().len());
      let results = self.search(session_id, &request).await?;

      Ok(ListingResponse {
         query: request.term,
         field_selector: request.field_selector,
         order: request.order_code.map(|code| code.to_string()),
         columns: descriptor
            .display_columns()
            .iter()
            .map(|column| column.name.clone())
            .collect(),
         search_fields: descriptor
            .searchable()
            .iter()
            .map(|column| column.name.clone())
            .collect(),
         results,
      })
   }

   /// Serve a listing from an already-parsed request.
   pub async fn search(&self, session_id: &str, request: &SearchRequest) -> Result<SearchResults> {
      Ok(self
         .engine
         .search(&self.executor, &self.sessions, session_id, request)
         .await?)
   }

   /// Fetch the single row whose columns equal the given values.
   pub async fn lookup<K, V>(&self, fields: &[(K, V)]) -> Result<Option<Row>>
   where
      K: AsRef<str>,
      V: AsRef<str>,
   {
      let fields = fields
         .iter()
         .map(|(column, value)| (column.as_ref().to_string(), value.as_ref().to_string()))
         .collect::<Vec<_>>();

      Ok(self.engine.lookup(&self.executor, &fields).await?)
   }
}
