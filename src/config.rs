//! Configuration file for a catalog listing

use std::fs;
use std::path::{Path, PathBuf};

use catalog_query_engine::{DescriptorConfig, EngineConfig};
use catalog_sqlite_conn_mgr::SqliteDatabaseConfig;
use serde::Deserialize;

use crate::{Error, Result};

/// Where the catalog lives and how its pools are sized.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSection {
   /// SQLite database file
   pub path: PathBuf,

   #[serde(flatten)]
   pub pool: SqliteDatabaseConfig,
}

/// Everything needed to open a [`CatalogSearch`](crate::CatalogSearch).
///
/// ```json
/// {
///    "database": { "path": "books.db", "maxReadConnections": 4 },
///    "descriptor": {
///       "table": "books_book",
///       "columns": ["id", "title", "serial_number", "author_id"],
///       "listDisplay": ["id", "title", "serial_number"],
///       "searchFields": ["title", "serial_number", "author__name"],
///       "defaultSort": { "column": "id", "direction": "desc" },
///       "relations": [
///          { "from": "books_book", "name": "author", "fkColumn": "author_id",
///            "to": "books_author", "toColumn": "id" }
///       ]
///    },
///    "engine": { "pageSize": 15 }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSearchConfig {
   pub database: DatabaseSection,
   pub descriptor: DescriptorConfig,
   #[serde(default)]
   pub engine: EngineConfig,
}

impl CatalogSearchConfig {
   /// Parse a configuration document.
   pub fn from_json_str(json: &str) -> Result<Self> {
      Ok(serde_json::from_str(json)?)
   }

   /// Read and parse a configuration file.
   ///
   /// A relative `database.path` is resolved against the file's directory.
   pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
      let path = path.as_ref();
      let config_error = |source: Box<dyn std::error::Error + Send + Sync>| Error::Config {
         path: path.to_path_buf(),
         source,
      };

      let text = fs::read_to_string(path).map_err(|e| config_error(e.into()))?;
      let mut config: Self = serde_json::from_str(&text).map_err(|e| config_error(e.into()))?;

      if config.database.path.is_relative()
         && let Some(dir) = path.parent()
      {
         config.database.path = dir.join(&config.database.path);
      }

      Ok(config)
   }
}
