//! Configuration for SQLite database connection pools

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Configuration for SqliteDatabase connection pools
///
/// # Examples
///
/// ```
/// use catalog_sqlite_conn_mgr::SqliteDatabaseConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = SqliteDatabaseConfig::default();
///
/// // Override just one field
/// let config = SqliteDatabaseConfig {
///     max_read_connections: 3,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SqliteDatabaseConfig {
   /// Maximum number of concurrent read connections
   ///
   /// Every search request runs its count and page queries on this pool.
   ///
   /// Default: 6
   pub max_read_connections: u32,

   /// Idle timeout for both read and write connections
   ///
   /// Read from configuration files as whole seconds (`idleTimeoutSecs`).
   ///
   /// Default: 30 seconds
   #[serde(rename = "idleTimeoutSecs", deserialize_with = "duration_from_secs")]
   pub idle_timeout: Duration,
}

impl Default for SqliteDatabaseConfig {
   fn default() -> Self {
      Self {
         max_read_connections: 6,
         idle_timeout: Duration::from_secs(30),
      }
   }
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
   D: Deserializer<'de>,
{
   u64::deserialize(deserializer).map(Duration::from_secs)
}
