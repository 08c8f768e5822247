use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use catalog_query_engine::{
   DescriptorConfig, EngineConfig, Error, OutOfRangePolicy, QueryExecutor, RelationConfig,
   Result, Row, SearchEngine, SearchRequest, SessionStore, SortDirection, SqliteExecutor,
   TableDescriptor,
};
use catalog_sqlite_conn_mgr::SqliteDatabase;
use tempfile::TempDir;

/// Wraps the SQLite executor and counts round-trips by kind.
struct CountingExecutor {
   inner: SqliteExecutor,
   counts: AtomicUsize,
   pages: AtomicUsize,
}

impl CountingExecutor {
   fn count_queries(&self) -> usize {
      self.counts.load(Ordering::SeqCst)
   }

   fn page_queries(&self) -> usize {
      self.pages.load(Ordering::SeqCst)
   }

   fn round_trips(&self) -> usize {
      self.count_queries() + self.page_queries()
   }
}

impl QueryExecutor for CountingExecutor {
   async fn fetch_count(&self, sql: &str, params: &[String]) -> Result<u64> {
      self.counts.fetch_add(1, Ordering::SeqCst);
      self.inner.fetch_count(sql, params).await
   }

   async fn fetch_rows(&self, sql: &str, params: &[String]) -> Result<Vec<Row>> {
      self.pages.fetch_add(1, Ordering::SeqCst);
      self.inner.fetch_rows(sql, params).await
   }
}

struct TestCatalog {
   executor: CountingExecutor,
   _temp: TempDir,
}

/// Seed 80 books, 3 authors and 2 publishers.
///
/// ```text
/// books_book.id     1..=80
/// title             "Atlas Vol N" for even N, "Field Guide N" for odd N
/// serial_number     "SN-001" .. "SN-080"
/// author_id         N % 3 + 1
///
/// author 1 Tolkien   -> publisher 1 Allen & Unwin
/// author 2 Le Guin   -> publisher 2 Ace Books
/// author 3 Pratchett -> publisher 2 Ace Books
/// ```
async fn create_catalog() -> TestCatalog {
   let _ = tracing_subscriber::fmt().with_test_writer().try_init();

   let temp = TempDir::new().expect("Failed to create temp directory");
   let db = SqliteDatabase::connect(temp.path().join("catalog.db"), None)
      .await
      .expect("Failed to connect to test database");

   let mut writer = db.acquire_writer().await.unwrap();
   for ddl in [
      "CREATE TABLE books_publisher (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
      "CREATE TABLE books_author (id INTEGER PRIMARY KEY, name TEXT NOT NULL, publisher_id INTEGER NOT NULL REFERENCES books_publisher(id))",
      "CREATE TABLE books_book (id INTEGER PRIMARY KEY, title TEXT NOT NULL, serial_number TEXT, description TEXT NOT NULL, author_id INTEGER NOT NULL REFERENCES books_author(id))",
      "INSERT INTO books_publisher (id, name) VALUES (1, 'Allen & Unwin'), (2, 'Ace Books')",
      "INSERT INTO books_author (id, name, publisher_id) VALUES (1, 'Tolkien', 1), (2, 'Le Guin', 2), (3, 'Pratchett', 2)",
   ] {
      sqlx::query(ddl).execute(&mut *writer).await.unwrap();
   }

   sqlx::query("BEGIN").execute(&mut *writer).await.unwrap();
   for n in 1..=80_i64 {
      let title = if n % 2 == 0 {
         format!("Atlas Vol {}", n)
      } else {
         format!("Field Guide {}", n)
      };
      sqlx::query(
         "INSERT INTO books_book (id, title, serial_number, description, author_id) VALUES (?, ?, ?, ?, ?)",
      )
      .bind(n)
      .bind(title)
      .bind(format!("SN-{:03}", n))
      .bind("A book about places")
      .bind(n % 3 + 1)
      .execute(&mut *writer)
      .await
      .unwrap();
   }
   sqlx::query("COMMIT").execute(&mut *writer).await.unwrap();
   drop(writer);

   TestCatalog {
      executor: CountingExecutor {
         inner: SqliteExecutor::new(db),
         counts: AtomicUsize::new(0),
         pages: AtomicUsize::new(0),
      },
      _temp: temp,
   }
}

fn books_descriptor() -> TableDescriptor {
   TableDescriptor::from_config(
      DescriptorConfig::new("books_book")
         .with_columns(["id", "title", "serial_number", "description", "author_id"])
         .with_list_display(["id", "title", "serial_number"])
         .with_search_fields([
            "id",
            "title",
            "serial_number",
            "author__name",
            "author__publisher__name",
         ])
         .with_default_sort("id", SortDirection::Asc)
         .with_relation(RelationConfig::new(
            "books_book",
            "author",
            "author_id",
            "books_author",
            "id",
         ))
         .with_relation(RelationConfig::new(
            "books_author",
            "publisher",
            "publisher_id",
            "books_publisher",
            "id",
         )),
   )
   .unwrap()
}

fn engine_with(config: EngineConfig) -> SearchEngine {
   SearchEngine::new(books_descriptor(), config).unwrap()
}

fn page_of_15() -> EngineConfig {
   EngineConfig {
      page_size: 15,
      ..Default::default()
   }
}

fn row_ids(rows: &[Row]) -> Vec<i64> {
   rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
}

// ─── Scenarios ───

#[tokio::test]
async fn title_search_ordered_by_serial_desc_second_page() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();
   let session = sessions.new_session();

   let request = SearchRequest::new("atlas")
      .with_field_selector(1)
      .with_order_code("-2".parse().unwrap())
      .with_page(2);

   let results = engine
      .search(&catalog.executor, &sessions, &session, &request)
      .await
      .unwrap();

   // 40 even ids match; serial DESC puts 80 first, so page 2 starts at 50.
   assert_eq!(results.total_count, 40);
   assert_eq!(results.rows.len(), 15);
   assert_eq!(row_ids(&results.rows)[..3], [50, 48, 46]);
   assert_eq!((results.window.from_index, results.window.to_index), (15, 30));
   assert!(results.window.multi_page);
   assert!(results.window.can_show_all);
   assert_eq!(catalog.executor.count_queries(), 1);
   assert_eq!(catalog.executor.page_queries(), 1);
}

#[tokio::test]
async fn paging_same_search_reuses_cached_count() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();
   let session = sessions.new_session();
   let base = SearchRequest::new("atlas")
      .with_field_selector(1)
      .with_order_code("-2".parse().unwrap());

   engine
      .search(&catalog.executor, &sessions, &session, &base.clone().with_page(2))
      .await
      .unwrap();
   let third = engine
      .search(&catalog.executor, &sessions, &session, &base.with_page(3))
      .await
      .unwrap();

   assert_eq!(catalog.executor.count_queries(), 1);
   assert_eq!(catalog.executor.page_queries(), 2);
   assert_eq!(third.window.from_index, 30);
   assert_eq!(row_ids(&third.rows), vec![20, 18, 16, 14, 12, 10, 8, 6, 4, 2]);
   assert_eq!(third.window.next_page, None);
}

#[tokio::test]
async fn missing_term_touches_nothing() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();

   let results = engine
      .search(
         &catalog.executor,
         &sessions,
         "anonymous",
         &SearchRequest::default().with_page(4),
      )
      .await
      .unwrap();

   assert!(results.rows.is_empty());
   assert_eq!(results.total_count, 0);
   assert_eq!(catalog.executor.round_trips(), 0);
   assert_eq!(sessions.state("anonymous").await, None);
}

#[tokio::test]
async fn blank_term_touches_nothing() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();

   let results = engine
      .search(&catalog.executor, &sessions, "s", &SearchRequest::new("  "))
      .await
      .unwrap();

   assert!(results.rows.is_empty());
   assert_eq!(catalog.executor.round_trips(), 0);
}

// ─── Count cache invalidation ───

#[tokio::test]
async fn changing_term_or_field_recounts() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();
   let session = sessions.new_session();

   let atlas = engine
      .search(
         &catalog.executor,
         &sessions,
         &session,
         &SearchRequest::new("atlas").with_field_selector(1),
      )
      .await
      .unwrap();
   let guide = engine
      .search(
         &catalog.executor,
         &sessions,
         &session,
         &SearchRequest::new("guide").with_field_selector(1),
      )
      .await
      .unwrap();
   let serial = engine
      .search(
         &catalog.executor,
         &sessions,
         &session,
         &SearchRequest::new("guide").with_field_selector(2),
      )
      .await
      .unwrap();

   assert_eq!(atlas.total_count, 40);
   assert_eq!(guide.total_count, 40);
   assert_eq!(serial.total_count, 0);
   assert_eq!(catalog.executor.count_queries(), 3);
}

#[tokio::test]
async fn changing_order_does_not_recount() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();
   let session = sessions.new_session();
   let request = SearchRequest::new("atlas").with_field_selector(1);

   engine
      .search(&catalog.executor, &sessions, &session, &request)
      .await
      .unwrap();
   let reordered = engine
      .search(
         &catalog.executor,
         &sessions,
         &session,
         &request.with_order_code("-0".parse().unwrap()),
      )
      .await
      .unwrap();

   assert_eq!(catalog.executor.count_queries(), 1);
   assert_eq!(row_ids(&reordered.rows)[0], 80);
}

#[tokio::test]
async fn search_is_case_insensitive() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();

   let results = engine
      .search(
         &catalog.executor,
         &sessions,
         "s",
         &SearchRequest::new("ATLAS vol").with_field_selector(1),
      )
      .await
      .unwrap();

   assert_eq!(results.total_count, 40);
}

// ─── Related fields ───

#[tokio::test]
async fn related_field_search_joins_author() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();

   let results = engine
      .search(
         &catalog.executor,
         &sessions,
         "s",
         &SearchRequest::new("tolk").with_field_selector(3),
      )
      .await
      .unwrap();

   // author_id = n % 3 + 1 == 1 for n = 3, 6, ..., 78
   assert_eq!(results.total_count, 26);
   assert_eq!(row_ids(&results.rows)[..3], [3, 6, 9]);
   assert!(results.rows.iter().all(|r| r["author_id"] == 1));
}

#[tokio::test]
async fn two_hop_related_field_search() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();

   let results = engine
      .search(
         &catalog.executor,
         &sessions,
         "s",
         &SearchRequest::new("ace").with_field_selector(4),
      )
      .await
      .unwrap();

   assert_eq!(results.total_count, 54);
   assert!(results.rows.iter().all(|r| r["author_id"] != 1));
}

#[tokio::test]
async fn search_all_fields_when_unselected() {
   let catalog = create_catalog().await;
   let engine = engine_with(EngineConfig {
      search_all_when_unselected: true,
      ..page_of_15()
   });
   let sessions = SessionStore::new();

   let results = engine
      .search(&catalog.executor, &sessions, "s", &SearchRequest::new("unwin"))
      .await
      .unwrap();

   assert_eq!(results.total_count, 26);
}

#[tokio::test]
async fn search_folds_non_ascii_case() {
   let temp = TempDir::new().unwrap();
   let db = SqliteDatabase::connect(temp.path().join("places.db"), None)
      .await
      .unwrap();
   let mut writer = db.acquire_writer().await.unwrap();
   for sql in [
      "CREATE TABLE places (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
      "INSERT INTO places (id, name) VALUES (1, 'École Straße'), (2, 'ÉCOLE'), (3, 'Ecole'), (4, 'Σοφία')",
   ] {
      sqlx::query(sql).execute(&mut *writer).await.unwrap();
   }
   drop(writer);

   let engine = SearchEngine::new(
      TableDescriptor::from_config(
         DescriptorConfig::new("places")
            .with_columns(["id", "name"])
            .with_search_fields(["name"]),
      )
      .unwrap(),
      EngineConfig::default(),
   )
   .unwrap();
   let executor = SqliteExecutor::new(db);
   let sessions = SessionStore::new();

   let ecole = engine
      .search(&executor, &sessions, "s", &SearchRequest::new("école"))
      .await
      .unwrap();
   let strasse = engine
      .search(&executor, &sessions, "s", &SearchRequest::new("STRASSE"))
      .await
      .unwrap();
   let sofia = engine
      .search(&executor, &sessions, "s", &SearchRequest::new("ΣΟΦ"))
      .await
      .unwrap();

   assert_eq!(ecole.total_count, 2);
   assert_eq!(row_ids(&ecole.rows), vec![1, 2]);
   // Lower-casing is not full case folding: ß does not expand to ss.
   assert_eq!(strasse.total_count, 0);
   assert_eq!(sofia.total_count, 1);
}

// ─── Out-of-range pages ───

#[tokio::test]
async fn page_past_end_clamps_to_last_page() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();

   let results = engine
      .search(
         &catalog.executor,
         &sessions,
         "s",
         &SearchRequest::new("atlas").with_field_selector(1).with_page(99),
      )
      .await
      .unwrap();

   assert_eq!(results.window.page_number, 3);
   assert_eq!(results.rows.len(), 10);
   assert_eq!(row_ids(&results.rows)[0], 62);
}

#[tokio::test]
async fn page_past_end_served_empty_under_empty_policy() {
   let catalog = create_catalog().await;
   let engine = engine_with(EngineConfig {
      out_of_range: OutOfRangePolicy::Empty,
      ..page_of_15()
   });
   let sessions = SessionStore::new();

   let results = engine
      .search(
         &catalog.executor,
         &sessions,
         "s",
         &SearchRequest::new("atlas").with_field_selector(1).with_page(99),
      )
      .await
      .unwrap();

   assert!(results.rows.is_empty());
   assert_eq!(results.total_count, 40);
   assert_eq!(results.window.page_number, 99);
   assert_eq!(catalog.executor.page_queries(), 0);
}

// ─── Errors ───

#[tokio::test]
async fn out_of_range_order_index_is_configuration_error() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();

   let result = engine
      .search(
         &catalog.executor,
         &sessions,
         "s",
         &SearchRequest::new("atlas").with_order_code("7".parse().unwrap()),
      )
      .await;

   assert!(matches!(result, Err(Error::Configuration(_))));
   assert_eq!(catalog.executor.round_trips(), 0);
   assert_eq!(sessions.state("s").await, None);
}

#[tokio::test]
async fn rejected_request_keeps_previous_count() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();
   let session = sessions.new_session();

   engine
      .search(
         &catalog.executor,
         &sessions,
         &session,
         &SearchRequest::new("atlas").with_field_selector(1),
      )
      .await
      .unwrap();
   let before = sessions.state(&session).await;

   let bad_order = engine
      .search(
         &catalog.executor,
         &sessions,
         &session,
         &SearchRequest::new("guide").with_order_code("3.9".parse().unwrap()),
      )
      .await;
   let bad_field = engine
      .search(
         &catalog.executor,
         &sessions,
         &session,
         &SearchRequest::new("guide").with_field_selector(5),
      )
      .await;

   assert!(matches!(bad_order, Err(Error::Configuration(_))));
   assert!(matches!(bad_field, Err(Error::InvalidFieldSelector { index: 5, .. })));
   assert_eq!(catalog.executor.count_queries(), 1);
   assert_eq!(sessions.state(&session).await, before);
}

#[tokio::test]
async fn storage_failure_propagates() {
   let catalog = create_catalog().await;
   let descriptor = TableDescriptor::from_config(
      DescriptorConfig::new("books_book")
         .with_columns(["id", "isbn"])
         .with_search_fields(["isbn"]),
   )
   .unwrap();
   let engine = SearchEngine::new(descriptor, page_of_15()).unwrap();
   let sessions = SessionStore::new();

   let err = engine
      .search(&catalog.executor, &sessions, "s", &SearchRequest::new("x"))
      .await
      .unwrap_err();

   assert!(err.is_storage());
   assert_eq!(sessions.state("s").await, None);
}

#[tokio::test]
async fn closed_database_is_storage_error() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());
   let sessions = SessionStore::new();
   catalog.executor.inner.database().close().await.unwrap();

   let err = engine
      .search(&catalog.executor, &sessions, "s", &SearchRequest::new("atlas"))
      .await
      .unwrap_err();

   assert!(matches!(err, Error::ConnectionManager(_)));
}

// ─── Lookup ───

#[tokio::test]
async fn lookup_finds_single_record() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());

   let row = engine
      .lookup(
         &catalog.executor,
         &[("serial_number".to_string(), "SN-007".to_string())],
      )
      .await
      .unwrap()
      .unwrap();

   assert_eq!(row["id"], 7);
   assert_eq!(row["title"], "Field Guide 7");
}

#[tokio::test]
async fn lookup_without_match_is_none() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());

   let row = engine
      .lookup(
         &catalog.executor,
         &[
            ("serial_number".to_string(), "SN-007".to_string()),
            ("title".to_string(), "Atlas Vol 8".to_string()),
         ],
      )
      .await
      .unwrap();

   assert!(row.is_none());
}

#[tokio::test]
async fn lookup_with_several_matches_fails() {
   let catalog = create_catalog().await;
   let engine = engine_with(page_of_15());

   let result = engine
      .lookup(
         &catalog.executor,
         &[("author_id".to_string(), "1".to_string())],
      )
      .await;

   assert!(matches!(result, Err(Error::MultipleRowsReturned(2))));
}

// ─── Concurrency ───

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_requests_in_one_session_count_once() {
   let catalog = Arc::new(create_catalog().await);
   let engine = Arc::new(engine_with(page_of_15()));
   let sessions = Arc::new(SessionStore::new());
   let session = sessions.new_session();

   let handles: Vec<_> = (1..=16)
      .map(|page| {
         let catalog = Arc::clone(&catalog);
         let engine = Arc::clone(&engine);
         let sessions = Arc::clone(&sessions);
         let session = session.clone();
         tokio::spawn(async move {
            let request = SearchRequest::new("atlas")
               .with_field_selector(1)
               .with_page(page % 3 + 1);
            engine
               .search(&catalog.executor, &sessions, &session, &request)
               .await
               .unwrap()
               .total_count
         })
      })
      .collect();

   for handle in handles {
      assert_eq!(handle.await.unwrap(), 40);
   }
   assert_eq!(catalog.executor.count_queries(), 1);
   assert_eq!(catalog.executor.page_queries(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_in_one_session_keep_count_consistent() {
   let catalog = Arc::new(create_catalog().await);
   let engine = Arc::new(engine_with(page_of_15()));
   let sessions = Arc::new(SessionStore::new());
   let session = sessions.new_session();

   let expected: HashMap<&str, u64> = [("atlas", 40), ("guide", 40), ("vol 1", 5), ("zzz", 0)]
      .into_iter()
      .collect();

   let mut handles = Vec::new();
   for i in 0..32 {
      let term = *expected.keys().nth(i % expected.len()).unwrap();
      let catalog = Arc::clone(&catalog);
      let engine = Arc::clone(&engine);
      let sessions = Arc::clone(&sessions);
      let session = session.clone();
      handles.push(tokio::spawn(async move {
         let request = SearchRequest::new(term).with_field_selector(1);
         let results = engine
            .search(&catalog.executor, &sessions, &session, &request)
            .await
            .unwrap();
         (term, results.total_count)
      }));
   }

   for handle in handles {
      let (term, total) = handle.await.unwrap();
      assert_eq!(total, expected[term], "term {}", term);
   }

   let state = sessions.state(&session).await.unwrap();
   let term = state.last_query_key.rsplit(':').next().unwrap();
   assert_eq!(state.cached_count, expected[term]);
}
