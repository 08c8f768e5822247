//! SQL fragment builders: search predicates, join chains and ORDER BY.
//!
//! Everything here is pure. Identifiers come from a validated
//! [`TableDescriptor`](crate::TableDescriptor) and are always emitted
//! double-quoted; user input only ever reaches SQL as a bound parameter.
//!
//! # Case-insensitive search
//!
//! Both sides of the `LIKE` are folded with `casefold()`, the Unicode-aware
//! lower-casing function the connection manager registers on every
//! connection (SQLite's own `LOWER()` folds ASCII only). The column is cast
//! to text first, so numeric and date columns are searchable too:
//!
//! ```text
//! casefold(CAST("books_book"."title" AS TEXT)) LIKE casefold(?)
//! ```
//!
//! # Order codes
//!
//! An order code is a dot-joined list of signed, 0-based indices into the
//! display columns. `-2.1` sorts by display column 2 descending, then by
//! column 1 ascending. The sign is read from the text, so `-0` means
//! column 0 descending.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use catalog_sqlite_conn_mgr::CASEFOLD_FUNCTION;
use regex::Regex;

use crate::descriptor::{ColumnSpec, RelationHop, SortDirection, SortKey};
use crate::{Error, Result};

/// Validate that a table or column name is safe for SQL interpolation.
///
/// Accepts names matching `[a-zA-Z_][a-zA-Z0-9_]*`. Qualification is added
/// by the builders, so dots are rejected here.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
   let mut chars = name.chars();
   let valid_first = chars
      .next()
      .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');

   if !valid_first || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
      return Err(Error::InvalidColumnName {
         name: name.to_string(),
      });
   }

   Ok(())
}

/// Quote an identifier with double quotes.
///
/// Any embedded double quotes are doubled per SQL standard (`"` → `""`).
pub(crate) fn quote_identifier(name: &str) -> String {
   format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"table"."column"`
pub fn qualified_column(table: &str, column: &str) -> String {
   format!("{}.{}", quote_identifier(table), quote_identifier(column))
}

/// Build a case-insensitive substring predicate for one searchable column.
///
/// Returns the predicate and its placeholder count (always 1). Dotted
/// references are matched against the table at the end of their relation
/// path, so the caller must also emit that path's joins.
pub fn build_search_clause(column: &ColumnSpec, root_table: &str) -> (String, usize) {
   let target = qualified_column(column.table_for(root_table), &column.column);
   (
      format!(
         "{fold}(CAST({} AS TEXT)) LIKE {fold}(?)",
         target,
         fold = CASEFOLD_FUNCTION
      ),
      1,
   )
}

/// Build one `INNER JOIN` per hop, root side first.
///
/// Repeated calls with the same path produce identical output.
pub fn build_join_clause(path: &[RelationHop]) -> String {
   path.iter().fold(String::new(), |joined, hop| {
      let join = format!(
         "INNER JOIN {} ON {} = {}",
         quote_identifier(&hop.target_table),
         qualified_column(&hop.local_table, &hop.fk_column),
         qualified_column(&hop.target_table, &hop.target_column),
      );
      if joined.is_empty() {
         join
      } else {
         format!("{} {}", joined, join)
      }
   })
}

/// Merge several relation paths into one join sequence.
///
/// Hops shared between paths are emitted once; every path keeps its
/// root-to-leaf order.
pub(crate) fn merge_relation_paths<'a>(
   paths: impl IntoIterator<Item = &'a [RelationHop]>,
) -> Vec<RelationHop> {
   paths
      .into_iter()
      .flatten()
      .fold(Vec::new(), |mut merged: Vec<RelationHop>, hop| {
         if !merged.contains(hop) {
            merged.push(hop.clone());
         }
         merged
      })
}

/// One entry of an order code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
   /// Index into the display columns
   pub index: usize,
   pub direction: SortDirection,
}

impl OrderTerm {
   pub fn asc(index: usize) -> Self {
      Self {
         index,
         direction: SortDirection::Asc,
      }
   }

   pub fn desc(index: usize) -> Self {
      Self {
         index,
         direction: SortDirection::Desc,
      }
   }
}

impl fmt::Display for OrderTerm {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self.direction {
         SortDirection::Asc => write!(f, "{}", self.index),
         SortDirection::Desc => write!(f, "-{}", self.index),
      }
   }
}

/// Parsed `o` parameter: ordered signed column indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderCode(Vec<OrderTerm>);

impl OrderCode {
   pub fn new(terms: impl IntoIterator<Item = OrderTerm>) -> Self {
      Self(terms.into_iter().collect())
   }

   pub fn terms(&self) -> &[OrderTerm] {
      &self.0
   }

   pub fn is_empty(&self) -> bool {
      self.0.is_empty()
   }
}

fn order_code_pattern() -> &'static Regex {
   static RE: OnceLock<Regex> = OnceLock::new();
   RE.get_or_init(|| Regex::new(r"^-?\d+(\.-?\d+)*$").expect("invalid regex"))
}

impl FromStr for OrderCode {
   type Err = Error;

   fn from_str(code: &str) -> Result<Self> {
      let code = code.trim();
      if code.is_empty() {
         return Ok(Self::default());
      }
      if !order_code_pattern().is_match(code) {
         return Err(Error::InvalidOrderCode(code.to_string()));
      }

      code
         .split('.')
         .map(|part| {
            let (digits, direction) = match part.strip_prefix('-') {
               Some(rest) => (rest, SortDirection::Desc),
               None => (part, SortDirection::Asc),
            };
            let index = digits
               .parse::<usize>()
               .map_err(|_| Error::InvalidOrderCode(code.to_string()))?;
            Ok(OrderTerm { index, direction })
         })
         .collect::<Result<Vec<_>>>()
         .map(Self)
   }
}

impl fmt::Display for OrderCode {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      for (i, term) in self.0.iter().enumerate() {
         if i > 0 {
            f.write_str(".")?;
         }
         write!(f, "{}", term)?;
      }
      Ok(())
   }
}

/// Map an order code onto display columns.
///
/// An absent or empty code falls back to the descriptor's default sort.
/// Repeated indices keep their first occurrence. An index past the end of
/// `columns` is a [`Error::Configuration`]: the code and the descriptor
/// disagree about the display columns.
pub fn resolve_order<'a>(
   order: Option<&OrderCode>,
   columns: &'a [ColumnSpec],
   default_sort: &'a SortKey,
) -> Result<Vec<(&'a ColumnSpec, SortDirection)>> {
   let Some(code) = order.filter(|code| !code.is_empty()) else {
      return Ok(vec![(&default_sort.column, default_sort.direction)]);
   };

   let mut resolved: Vec<(&ColumnSpec, SortDirection)> = Vec::with_capacity(code.terms().len());
   for term in code.terms() {
      let column = columns.get(term.index).ok_or_else(|| {
         Error::Configuration(format!(
            "order index {} out of range ({} display columns)",
            term.index,
            columns.len()
         ))
      })?;
      if !resolved.iter().any(|(seen, _)| seen.name == column.name) {
         resolved.push((column, term.direction));
      }
   }

   Ok(resolved)
}

/// Build the ORDER BY clause for an order code.
pub fn build_order_clause(
   order: Option<&OrderCode>,
   columns: &[ColumnSpec],
   default_sort: &SortKey,
   root_table: &str,
) -> Result<String> {
   let parts: Vec<String> = resolve_order(order, columns, default_sort)?
      .into_iter()
      .map(|(column, direction)| {
         format!(
            "{} {}",
            qualified_column(column.table_for(root_table), &column.column),
            direction.as_sql()
         )
      })
      .collect();

   Ok(format!("ORDER BY {}", parts.join(", ")))
}
