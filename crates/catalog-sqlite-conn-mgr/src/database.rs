//! SQLite database with connection pooling and optional write access

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::debug;

use crate::casefold;
use crate::config::SqliteDatabaseConfig;
use crate::error::{Error, Result};
use crate::write_guard::WriteGuard;

/// SQLite database with connection pooling for concurrent reads and optional exclusive writes.
///
/// ## Architecture
///
/// The database maintains two connection pools:
/// - **`read_pool`**: Pool of read-only connections for concurrent reads
/// - **`write_conn`**: Single-connection pool for exclusive write access (enforced by max_connections=1)
///
/// ## State Management
///
/// - **`wal_initialized`**: Tracks whether WAL journal mode has been enabled (lazy initialization)
/// - **`closed`**: Prevents use after the database has been closed
/// - **`path`**: Database file path for cleanup operations
///
/// ## Usage Pattern
///
/// ```text
/// 1. Connect to database (creates the file when missing)
/// 2. Read operations: Access read_pool for concurrent reads
/// 3. Write operations: Acquire writer (lazily enables WAL on first call)
/// 4. Close database when done
/// ```
#[derive(Debug)]
pub struct SqliteDatabase {
   /// Pool of read-only connections (defaults to max_connections=6) for concurrent reads
   read_pool: Pool<Sqlite>,

   /// Single read-write connection pool (max_connections=1) for serialized writes
   write_conn: Pool<Sqlite>,

   /// Tracks if WAL mode has been initialized (set on first write)
   wal_initialized: AtomicBool,

   /// Marks database as closed to prevent further operations
   closed: AtomicBool,

   /// Path to database file (used for cleanup)
   path: PathBuf,
}

impl SqliteDatabase {
   /// Open (or create) the database at `path`.
   ///
   /// Every connection in both pools has the `casefold()` SQL function
   /// registered.
   ///
   /// The write pool is opened first with `create_if_missing` so the read-only
   /// pool always finds an existing file.
   pub async fn connect(
      path: impl AsRef<Path>,
      custom_config: Option<SqliteDatabaseConfig>,
   ) -> Result<Arc<Self>> {
      let config = custom_config.unwrap_or_default();
      let path = path.as_ref().to_path_buf();

      if let Some(parent) = path.parent()
         && !parent.as_os_str().is_empty()
      {
         std::fs::create_dir_all(parent)?;
      }

      let write_options = SqliteConnectOptions::new()
         .filename(&path)
         .create_if_missing(true);
      let write_conn = SqlitePoolOptions::new()
         .max_connections(1)
         .idle_timeout(config.idle_timeout)
         .after_connect(|conn, _meta| Box::pin(casefold::register(conn)))
         .connect_with(write_options)
         .await?;

      let read_options = SqliteConnectOptions::new().filename(&path).read_only(true);
      let read_pool = SqlitePoolOptions::new()
         .max_connections(config.max_read_connections.max(1))
         .idle_timeout(config.idle_timeout)
         .after_connect(|conn, _meta| Box::pin(casefold::register(conn)))
         .connect_with(read_options)
         .await?;

      debug!(
         "Connected to {} ({} read connections)",
         path.display(),
         config.max_read_connections
      );

      Ok(Arc::new(Self {
         read_pool,
         write_conn,
         wal_initialized: AtomicBool::new(false),
         closed: AtomicBool::new(false),
         path,
      }))
   }

   /// Path of the underlying database file
   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Read-only pool shared by concurrent queries
   pub fn read_pool(&self) -> Result<&Pool<Sqlite>> {
      if self.closed.load(Ordering::Acquire) {
         return Err(Error::DatabaseClosed);
      }
      Ok(&self.read_pool)
   }

   /// Acquire the single write connection, waiting for any current writer.
   ///
   /// The first successful call switches the database to WAL journal mode.
   pub async fn acquire_writer(&self) -> Result<WriteGuard> {
      if self.closed.load(Ordering::Acquire) {
         return Err(Error::DatabaseClosed);
      }

      let mut conn = self.write_conn.acquire().await?;

      if !self.wal_initialized.load(Ordering::Acquire) {
         sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&mut *conn)
            .await?;
         self.wal_initialized.store(true, Ordering::Release);
         debug!("Enabled WAL mode for {}", self.path.display());
      }

      Ok(WriteGuard::new(conn))
   }

   /// Close both pools. Further reads or writes fail with [`Error::DatabaseClosed`].
   pub async fn close(&self) -> Result<()> {
      if self.closed.swap(true, Ordering::AcqRel) {
         return Ok(());
      }
      self.read_pool.close().await;
      self.write_conn.close().await;
      debug!("Closed {}", self.path.display());
      Ok(())
   }

   /// Close the database and delete its file together with WAL/SHM side files.
   pub async fn remove(&self) -> Result<()> {
      self.close().await?;

      let main = self.path.clone();
      let mut wal = main.clone().into_os_string();
      wal.push("-wal");
      let mut shm = main.clone().into_os_string();
      shm.push("-shm");

      for file in [main, PathBuf::from(wal), PathBuf::from(shm)] {
         match std::fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
         }
      }

      Ok(())
   }
}
