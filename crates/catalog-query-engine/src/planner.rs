//! Assembles complete SQL statements for a search request.
//!
//! A page query has the shape
//!
//! ```text
//! SELECT <columns> FROM <table> [INNER JOIN ...] WHERE <predicate>
//!    ORDER BY <terms> LIMIT <page_size> OFFSET <offset>
//! ```
//!
//! and the matching count query reuses the same joins and predicate, so the
//! count and the rows always describe the same result set. Nothing is
//! planned without a search term: listings stay blank until one is given.

use tracing::trace;

use crate::clauses::{
   OrderCode, build_join_clause, build_order_clause, build_search_clause, merge_relation_paths,
   qualified_column, quote_identifier,
};
use crate::config::EngineConfig;
use crate::descriptor::{ColumnSpec, TableDescriptor};
use crate::{Error, Result};

/// One incoming listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
   /// Free-text term; absent or blank means "show nothing"
   pub term: Option<String>,
   /// Index into the searchable fields
   pub field_selector: Option<usize>,
   pub order_code: Option<OrderCode>,
   /// 1-based; anything below 1 is treated as 1
   pub page_number: i64,
}

impl Default for SearchRequest {
   fn default() -> Self {
      Self {
         term: None,
         field_selector: None,
         order_code: None,
         page_number: 1,
      }
   }
}

impl SearchRequest {
   pub fn new(term: impl Into<String>) -> Self {
      Self {
         term: Some(term.into()),
         ..Default::default()
      }
   }

   pub fn with_field_selector(mut self, index: usize) -> Self {
      self.field_selector = Some(index);
      self
   }

   pub fn with_order_code(mut self, code: OrderCode) -> Self {
      self.order_code = Some(code);
      self
   }

   pub fn with_page(mut self, page_number: i64) -> Self {
      self.page_number = page_number;
      self
   }

   /// The term to search for, or `None` when the listing must stay empty.
   pub fn search_term(&self) -> Option<&str> {
      self.term.as_deref().filter(|term| !term.trim().is_empty())
   }

   /// Page number clamped to at least 1.
   pub fn effective_page(&self) -> u64 {
      u64::try_from(self.page_number).unwrap_or(0).max(1)
   }
}

/// A fully assembled page query. Built per request, never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
   pub sql_text: String,
   /// One `%term%` per LIKE placeholder, in placeholder order
   pub bound_params: Vec<String>,
   pub limit: u64,
   pub offset: u64,
}

/// The count statement matching a [`QueryPlan`]'s filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountQuery {
   pub sql_text: String,
   pub bound_params: Vec<String>,
}

/// Largest value SQLite accepts for `LIMIT`/`OFFSET` (a signed 64-bit integer).
pub const MAX_SQL_OFFSET: u64 = i64::MAX as u64;

/// Row offset of a page. Pages below 1 start at 0; offsets past SQLite's
/// integer range are clamped to [`MAX_SQL_OFFSET`].
pub fn offset_for(page_size: u64, page_number: i64) -> u64 {
   let page = u64::try_from(page_number).unwrap_or(0).max(1);
   page_size.saturating_mul(page - 1).min(MAX_SQL_OFFSET)
}

/// Searchable fields a request targets.
///
/// An explicit selector picks one field. Without one, the first field is
/// used, or every field when `search_all_when_unselected` is set.
pub fn resolve_search_columns<'a>(
   descriptor: &'a TableDescriptor,
   request: &SearchRequest,
   config: &EngineConfig,
) -> Result<Vec<&'a ColumnSpec>> {
   let searchable = descriptor.searchable();
   match request.field_selector {
      Some(index) => searchable
         .get(index)
         .map(|column| vec![column])
         .ok_or(Error::InvalidFieldSelector {
            index,
            available: searchable.len(),
         }),
      None if config.search_all_when_unselected => Ok(searchable.iter().collect()),
      None => Ok(searchable.iter().take(1).collect()),
   }
}

/// FROM/JOIN/WHERE tail shared by the count and page statements.
struct SearchFilter {
   from_clause: String,
   predicate: String,
   params: Vec<String>,
}

fn build_filter(
   descriptor: &TableDescriptor,
   request: &SearchRequest,
   config: &EngineConfig,
) -> Result<SearchFilter> {
   let term = request.search_term().ok_or(Error::EmptySearch)?;
   let columns = resolve_search_columns(descriptor, request, config)?;
   let root = descriptor.table_name();

   let joins = build_join_clause(&merge_relation_paths(
      columns.iter().map(|column| column.hops()),
   ));
   let from_clause = if joins.is_empty() {
      format!("FROM {}", quote_identifier(root))
   } else {
      format!("FROM {} {}", quote_identifier(root), joins)
   };

   let (mut predicates, placeholders) = columns.iter().fold(
      (Vec::with_capacity(columns.len()), 0),
      |(mut predicates, placeholders), column| {
         let (sql, count) = build_search_clause(column, root);
         predicates.push(sql);
         (predicates, placeholders + count)
      },
   );
   let predicate = if predicates.len() == 1 {
      predicates.remove(0)
   } else {
      format!("({})", predicates.join(" OR "))
   };

   Ok(SearchFilter {
      from_clause,
      predicate,
      params: vec![format!("%{}%", term); placeholders],
   })
}

/// Plan the page query for a request.
///
/// Fails with [`Error::EmptySearch`] when there is no term; the caller then
/// serves an empty listing without touching the database.
pub fn plan(
   descriptor: &TableDescriptor,
   request: &SearchRequest,
   config: &EngineConfig,
) -> Result<QueryPlan> {
   let filter = build_filter(descriptor, request, config)?;
   let root = descriptor.table_name();

   let select_list = descriptor
      .columns()
      .iter()
      .map(|column| qualified_column(root, column))
      .collect::<Vec<_>>()
      .join(", ");
   let order_by = build_order_clause(
      request.order_code.as_ref(),
      descriptor.display_columns(),
      descriptor.default_sort(),
      root,
   )?;

   let limit = config.page_size;
   let offset = offset_for(limit, request.page_number);
   let sql_text = format!(
      "SELECT {} {} WHERE {} {} LIMIT {} OFFSET {}",
      select_list, filter.from_clause, filter.predicate, order_by, limit, offset
   );
   trace!("planned: {}", sql_text);

   Ok(QueryPlan {
      sql_text,
      bound_params: filter.params,
      limit,
      offset,
   })
}

/// Plan the `COUNT(*)` statement for a request's filter.
pub fn plan_count(
   descriptor: &TableDescriptor,
   request: &SearchRequest,
   config: &EngineConfig,
) -> Result<CountQuery> {
   let filter = build_filter(descriptor, request, config)?;

   Ok(CountQuery {
      sql_text: format!(
         "SELECT COUNT(*) {} WHERE {}",
         filter.from_clause, filter.predicate
      ),
      bound_params: filter.params,
   })
}

/// Plan an exact-match lookup of a single record.
///
/// Every `(column, value)` pair becomes an equality on the root table, bound
/// rather than inlined. The statement fetches at most two rows so the caller
/// can tell "one" from "more than one".
pub fn plan_lookup(descriptor: &TableDescriptor, fields: &[(String, String)]) -> Result<QueryPlan> {
   if fields.is_empty() {
      return Err(Error::EmptyLookup);
   }
   let root = descriptor.table_name();

   let mut conditions = Vec::with_capacity(fields.len());
   for (column, _) in fields {
      if !descriptor.has_column(column) {
         return Err(Error::InvalidColumnName {
            name: column.clone(),
         });
      }
      conditions.push(format!("{} = ?", qualified_column(root, column)));
   }

   let select_list = descriptor
      .columns()
      .iter()
      .map(|column| qualified_column(root, column))
      .collect::<Vec<_>>()
      .join(", ");

   Ok(QueryPlan {
      sql_text: format!(
         "SELECT {} FROM {} WHERE {} LIMIT 2",
         select_list,
         quote_identifier(root),
         conditions.join(" AND ")
      ),
      bound_params: fields.iter().map(|(_, value)| value.clone()).collect(),
      limit: 2,
      offset: 0,
   })
}
