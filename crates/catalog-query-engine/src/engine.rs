//! The listing engine: count, window, plan, fetch.

use std::future::Future;

use serde::Serialize;
use tracing::debug;

use crate::config::{EngineConfig, OutOfRangePolicy};
use crate::count_cache::{SessionStore, get_count, query_key};
use crate::descriptor::TableDescriptor;
use crate::executor::{QueryExecutor, Row};
use crate::planner::{QueryPlan, SearchRequest, plan, plan_count, plan_lookup};
use crate::window::{PageWindow, describe_window};
use crate::{Error, Result};

/// The hooks a search-only listing needs.
pub trait SearchListing {
   /// Build the page statement for a request.
   fn plan_query(&self, request: &SearchRequest) -> Result<QueryPlan>;

   /// Describe a page of a result set of `total_count` rows.
   fn describe_window(&self, total_count: u64, page_number: u64) -> Result<PageWindow>;

   /// Total rows matching the request, served from the session's count cache.
   fn resolve_count<E: QueryExecutor>(
      &self,
      executor: &E,
      sessions: &SessionStore,
      session_id: &str,
      request: &SearchRequest,
   ) -> impl Future<Output = Result<u64>> + Send;
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
   pub rows: Vec<Row>,
   pub total_count: u64,
   pub window: PageWindow,
}

impl SearchResults {
   fn empty(window: PageWindow) -> Self {
      Self {
         rows: Vec::new(),
         total_count: window.total_count,
         window,
      }
   }
}

/// Search-driven listing over one table.
#[derive(Debug, Clone)]
pub struct SearchEngine {
   descriptor: TableDescriptor,
   config: EngineConfig,
}

impl SearchEngine {
   pub fn new(descriptor: TableDescriptor, config: EngineConfig) -> Result<Self> {
      config.validate()?;
      Ok(Self { descriptor, config })
   }

   pub fn descriptor(&self) -> &TableDescriptor {
      &self.descriptor
   }

   pub fn config(&self) -> &EngineConfig {
      &self.config
   }

   /// Serve one listing request.
   ///
   /// Without a search term this returns an empty page and performs no I/O.
   /// The page statement is planned before anything runs, so a request that
   /// can never be served fails without touching the database or the
   /// session's count. Otherwise it issues at most two statements: a count
   /// (only when the session's cached count is for a different search) and
   /// the page query.
   pub async fn search<E: QueryExecutor>(
      &self,
      executor: &E,
      sessions: &SessionStore,
      session_id: &str,
      request: &SearchRequest,
   ) -> Result<SearchResults> {
      let requested = match self.plan_query(request) {
         Ok(plan) => plan,
         Err(Error::EmptySearch) => {
            debug!("no search term; serving empty listing");
            return Ok(SearchResults::empty(self.describe_window(0, 1)?));
         }
         Err(e) => return Err(e),
      };

      let total_count = self
         .resolve_count(executor, sessions, session_id, request)
         .await?;

      let window = match self.describe_window(total_count, request.effective_page()) {
         Ok(window) => window,
         Err(Error::InvalidPage { page, num_pages }) => match self.config.out_of_range {
            OutOfRangePolicy::Clamp => {
               debug!("page {} past end; clamping to {}", page, num_pages);
               self.describe_window(total_count, num_pages)?
            }
            OutOfRangePolicy::Empty => {
               debug!("page {} past end; serving empty page", page);
               return Ok(SearchResults::empty(PageWindow::past_end(
                  total_count,
                  self.config.page_size,
                  page,
                  self.config.max_show_all,
               )));
            }
         },
         Err(e) => return Err(e),
      };

      let plan = if window.page_number == request.effective_page() {
         requested
      } else {
         let page_number = i64::try_from(window.page_number).unwrap_or(i64::MAX);
         self.plan_query(&request.clone().with_page(page_number))?
      };
      let rows = executor
         .fetch_rows(&plan.sql_text, &plan.bound_params)
         .await?;

      Ok(SearchResults {
         rows,
         total_count,
         window,
      })
   }

   /// Fetch the single row whose columns equal the given values.
   ///
   /// Returns `None` when nothing matches and
   /// [`Error::MultipleRowsReturned`] when more than one row does.
   pub async fn lookup<E: QueryExecutor>(
      &self,
      executor: &E,
      fields: &[(String, String)],
   ) -> Result<Option<Row>> {
      let plan = plan_lookup(&self.descriptor, fields)?;
      let mut rows = executor
         .fetch_rows(&plan.sql_text, &plan.bound_params)
         .await?;

      match rows.len() {
         0 => Ok(None),
         1 => Ok(rows.pop()),
         count => Err(Error::MultipleRowsReturned(count)),
      }
   }
}

impl SearchListing for SearchEngine {
   fn plan_query(&self, request: &SearchRequest) -> Result<QueryPlan> {
      plan(&self.descriptor, request, &self.config)
   }

   fn describe_window(&self, total_count: u64, page_number: u64) -> Result<PageWindow> {
      describe_window(
         total_count,
         self.config.page_size,
         page_number,
         self.config.max_show_all,
      )
   }

   fn resolve_count<E: QueryExecutor>(
      &self,
      executor: &E,
      sessions: &SessionStore,
      session_id: &str,
      request: &SearchRequest,
   ) -> impl Future<Output = Result<u64>> + Send {
      async move {
         let count = plan_count(&self.descriptor, request, &self.config)?;
         let term = request.search_term().unwrap_or_default();
         let key = query_key(self.descriptor.table_name(), request.field_selector, term);

         get_count(
            sessions,
            session_id,
            &key,
            &count.sql_text,
            &count.bound_params,
            executor,
         )
         .await
      }
   }
}
