//! The seam between planned SQL and the storage engine.
//!
//! The engine only ever hands an executor a finished statement and its bound
//! string parameters. [`SqliteExecutor`] runs them on the read pool of a
//! [`SqliteDatabase`]; tests wrap it to count round-trips.

use std::future::Future;
use std::sync::Arc;

use catalog_sqlite_conn_mgr::SqliteDatabase;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::Sqlite;
use tracing::trace;

use crate::Result;

/// A decoded result row, keyed by column name in SELECT order.
pub type Row = IndexMap<String, JsonValue>;

/// Runs statements produced by the planner.
///
/// Each call is one blocking round-trip; implementations must not retry.
pub trait QueryExecutor: Send + Sync {
   /// Run a `SELECT COUNT(*) ...` statement and return the count.
   fn fetch_count(&self, sql: &str, params: &[String])
   -> impl Future<Output = Result<u64>> + Send;

   /// Run a row-returning statement.
   fn fetch_rows(&self, sql: &str, params: &[String])
   -> impl Future<Output = Result<Vec<Row>>> + Send;
}

/// Executes statements on a SQLite read pool.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
   db: Arc<SqliteDatabase>,
}

impl SqliteExecutor {
   pub fn new(db: Arc<SqliteDatabase>) -> Self {
      Self { db }
   }

   pub fn database(&self) -> &Arc<SqliteDatabase> {
      &self.db
   }
}

impl QueryExecutor for SqliteExecutor {
   fn fetch_count(
      &self,
      sql: &str,
      params: &[String],
   ) -> impl Future<Output = Result<u64>> + Send {
      async move {
         let pool = self.db.read_pool()?;
         trace!("count: {}", sql);

         let mut q = sqlx::query_scalar::<Sqlite, i64>(sql);
         for value in params {
            q = q.bind(value.clone());
         }
         let count = q.fetch_one(pool).await?;

         Ok(u64::try_from(count).unwrap_or_default())
      }
   }

   fn fetch_rows(
      &self,
      sql: &str,
      params: &[String],
   ) -> impl Future<Output = Result<Vec<Row>>> + Send {
      async move {
         let pool = self.db.read_pool()?;
         trace!("rows: {}", sql);

         let mut q = sqlx::query::<Sqlite>(sql);
         for value in params {
            q = q.bind(value.clone());
         }
         let rows = q.fetch_all(pool).await?;

         decode_rows(rows)
      }
   }
}

/// Helper to decode SQLite rows to JSON
pub(crate) fn decode_rows(rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<Row>> {
   use sqlx::{Column, Row as _};

   let mut values = Vec::with_capacity(rows.len());
   for row in rows {
      let mut value = IndexMap::default();
      for (i, column) in row.columns().iter().enumerate() {
         let v = row.try_get_raw(i)?;
         let v = crate::decode::to_json(v)?;
         value.insert(column.name().to_string(), v);
      }
      values.push(value);
   }
   Ok(values)
}
