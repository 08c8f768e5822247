//! Static metadata about the searchable table.
//!
//! A [`TableDescriptor`] is built once from a [`DescriptorConfig`] and never
//! changes afterwards. Field references use Django-style lookups: a plain
//! column (`title`) lives on the root table, while a dotted reference
//! (`author__name`) walks one foreign-key hop per leading segment.
//!
//! # Example
//!
//! ```
//! use catalog_query_engine::descriptor::{DescriptorConfig, RelationConfig, TableDescriptor};
//! use catalog_query_engine::SortDirection;
//!
//! let config = DescriptorConfig::new("books_book")
//!    .with_columns(["id", "title", "serial_number", "author_id"])
//!    .with_list_display(["id", "title", "serial_number"])
//!    .with_search_fields(["title", "author__name"])
//!    .with_default_sort("id", SortDirection::Asc)
//!    .with_relation(RelationConfig::new("books_book", "author", "author_id", "books_author", "id"));
//!
//! let descriptor = TableDescriptor::from_config(config).unwrap();
//! assert_eq!(descriptor.searchable()[1].table_for("books_book"), "books_author");
//! ```

use serde::{Deserialize, Serialize};

use crate::clauses::validate_identifier;
use crate::{Error, Result};

/// Separator between relation names and the leaf column in a field reference.
pub const LOOKUP_SEP: &str = "__";

/// Sort direction for an ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
   /// Ascending order (smallest first)
   #[default]
   Asc,
   /// Descending order (largest first)
   Desc,
}

impl SortDirection {
   /// SQL keyword for this direction.
   pub fn as_sql(self) -> &'static str {
      match self {
         SortDirection::Asc => "ASC",
         SortDirection::Desc => "DESC",
      }
   }
}

/// One foreign-key hop from `local_table` to `target_table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationHop {
   pub local_table: String,
   pub fk_column: String,
   pub target_table: String,
   pub target_column: String,
}

/// A column reference resolved against the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
   /// The reference as configured, e.g. `title` or `author__name`
   pub name: String,
   /// Position in the list it was declared in
   pub display_index: usize,
   /// Leaf column on the owning table
   pub column: String,
   /// Hops from the root table to the owning table, root first
   pub relation_path: Option<Vec<RelationHop>>,
}

impl ColumnSpec {
   /// Table that owns [`column`](Self::column) once all joins are applied.
   pub fn table_for<'a>(&'a self, root_table: &'a str) -> &'a str {
      match self.relation_path.as_deref().and_then(|hops| hops.last()) {
         Some(hop) => &hop.target_table,
         None => root_table,
      }
   }

   /// Hops required to reach this column; empty for root-table columns.
   pub fn hops(&self) -> &[RelationHop] {
      self.relation_path.as_deref().unwrap_or_default()
   }
}

/// Column plus direction used when a request carries no order code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
   pub column: ColumnSpec,
   pub direction: SortDirection,
}

/// A foreign key usable in dotted field references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationConfig {
   /// Table holding the foreign key
   pub from: String,
   /// Segment name used in references (`author` in `author__name`)
   pub name: String,
   /// Foreign key column on `from`
   pub fk_column: String,
   /// Referenced table
   pub to: String,
   /// Referenced column on `to`
   pub to_column: String,
}

impl RelationConfig {
   pub fn new(
      from: impl Into<String>,
      name: impl Into<String>,
      fk_column: impl Into<String>,
      to: impl Into<String>,
      to_column: impl Into<String>,
   ) -> Self {
      Self {
         from: from.into(),
         name: name.into(),
         fk_column: fk_column.into(),
         to: to.into(),
         to_column: to_column.into(),
      }
   }
}

/// Default ordering as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultSortConfig {
   pub column: String,
   #[serde(default)]
   pub direction: SortDirection,
}

/// Serializable description of a searchable table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorConfig {
   /// Root table name
   pub table: String,
   /// Every column of the root table that listings select
   pub columns: Vec<String>,
   /// Display order used by order codes; defaults to `columns`
   #[serde(default)]
   pub list_display: Vec<String>,
   /// Fields eligible for free-text search, in field-selector order
   pub search_fields: Vec<String>,
   /// Fallback ordering; defaults to the first display column ascending
   #[serde(default)]
   pub default_sort: Option<DefaultSortConfig>,
   #[serde(default)]
   pub relations: Vec<RelationConfig>,
}

impl DescriptorConfig {
   pub fn new(table: impl Into<String>) -> Self {
      Self {
         table: table.into(),
         columns: Vec::new(),
         list_display: Vec::new(),
         search_fields: Vec::new(),
         default_sort: None,
         relations: Vec::new(),
      }
   }

   pub fn with_columns<I, S>(mut self, columns: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      self.columns = columns.into_iter().map(Into::into).collect();
      self
   }

   pub fn with_list_display<I, S>(mut self, columns: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      self.list_display = columns.into_iter().map(Into::into).collect();
      self
   }

   pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      self.search_fields = fields.into_iter().map(Into::into).collect();
      self
   }

   pub fn with_default_sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
      self.default_sort = Some(DefaultSortConfig {
         column: column.into(),
         direction,
      });
      self
   }

   pub fn with_relation(mut self, relation: RelationConfig) -> Self {
      self.relations.push(relation);
      self
   }
}

/// Immutable metadata about the searchable table, owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
   table_name: String,
   columns: Vec<String>,
   display: Vec<ColumnSpec>,
   searchable: Vec<ColumnSpec>,
   default_sort: SortKey,
}

impl TableDescriptor {
   /// Validate a configuration and resolve every field reference in it.
   ///
   /// All failures are [`Error::Configuration`] or
   /// [`Error::InvalidColumnName`]: they describe a deployment mistake.
   pub fn from_config(config: DescriptorConfig) -> Result<Self> {
      validate_identifier(&config.table)?;
      if config.columns.is_empty() {
         return Err(Error::Configuration(format!(
            "table '{}' declares no columns",
            config.table
         )));
      }
      for column in &config.columns {
         validate_identifier(column)?;
      }
      for relation in &config.relations {
         for ident in [
            &relation.from,
            &relation.name,
            &relation.fk_column,
            &relation.to,
            &relation.to_column,
         ] {
            validate_identifier(ident)?;
         }
      }

      let resolver = Resolver {
         root: &config.table,
         columns: &config.columns,
         relations: &config.relations,
      };

      let display_names = if config.list_display.is_empty() {
         &config.columns
      } else {
         &config.list_display
      };
      let display = display_names
         .iter()
         .enumerate()
         .map(|(i, name)| resolver.resolve(name, i))
         .collect::<Result<Vec<_>>>()?;
      if let Some(related) = display.iter().find(|c| c.relation_path.is_some()) {
         return Err(Error::Configuration(format!(
            "display column '{}' must belong to '{}'",
            related.name, config.table
         )));
      }

      if config.search_fields.is_empty() {
         return Err(Error::Configuration(format!(
            "table '{}' declares no search fields",
            config.table
         )));
      }
      let searchable = config
         .search_fields
         .iter()
         .enumerate()
         .map(|(i, name)| resolver.resolve(name, i))
         .collect::<Result<Vec<_>>>()?;

      let default_sort = match &config.default_sort {
         Some(sort) => {
            let column = match display.iter().find(|c| c.name == sort.column) {
               Some(column) => column.clone(),
               None => resolver.resolve(&sort.column, 0)?,
            };
            if column.relation_path.is_some() {
               return Err(Error::Configuration(format!(
                  "default sort column '{}' must belong to '{}'",
                  sort.column, config.table
               )));
            }
            SortKey {
               column,
               direction: sort.direction,
            }
         }
         None => SortKey {
            column: display[0].clone(),
            direction: SortDirection::Asc,
         },
      };

      Ok(Self {
         table_name: config.table,
         columns: config.columns,
         display,
         searchable,
         default_sort,
      })
   }

   pub fn table_name(&self) -> &str {
      &self.table_name
   }

   /// Root-table columns selected by listing queries
   pub fn columns(&self) -> &[String] {
      &self.columns
   }

   /// Columns in display order; order codes index into this list
   pub fn display_columns(&self) -> &[ColumnSpec] {
      &self.display
   }

   pub fn searchable(&self) -> &[ColumnSpec] {
      &self.searchable
   }

   pub fn default_sort(&self) -> &SortKey {
      &self.default_sort
   }

   /// Whether `column` is one of the root table's columns.
   pub fn has_column(&self, column: &str) -> bool {
      self.columns.iter().any(|c| c == column)
   }
}

/// Resolves field references against one configuration.
struct Resolver<'a> {
   root: &'a str,
   columns: &'a [String],
   relations: &'a [RelationConfig],
}

impl Resolver<'_> {
   fn resolve(&self, reference: &str, display_index: usize) -> Result<ColumnSpec> {
      let segments: Vec<&str> = reference.split(LOOKUP_SEP).collect();
      for segment in &segments {
         validate_identifier(segment)?;
      }
      let Some((leaf, relation_names)) = segments.split_last() else {
         return Err(Error::InvalidColumnName {
            name: reference.to_string(),
         });
      };

      if relation_names.is_empty() {
         if !self.columns.iter().any(|c| c == leaf) {
            return Err(Error::Configuration(format!(
               "'{}' is not a column of '{}'",
               leaf, self.root
            )));
         }
         return Ok(ColumnSpec {
            name: reference.to_string(),
            display_index,
            column: leaf.to_string(),
            relation_path: None,
         });
      }

      // Each hop starts where the previous one ended, so the chain invariant
      // (target_table == next local_table) holds by construction.
      let (_, hops) = relation_names.iter().try_fold(
         (self.root, Vec::with_capacity(relation_names.len())),
         |(table, mut hops), name| {
            let relation = self
               .relations
               .iter()
               .find(|r| r.from == table && r.name == *name)
               .ok_or_else(|| {
                  Error::Configuration(format!(
                     "no relation '{}' from table '{}' (in '{}')",
                     name, table, reference
                  ))
               })?;
            hops.push(RelationHop {
               local_table: relation.from.clone(),
               fk_column: relation.fk_column.clone(),
               target_table: relation.to.clone(),
               target_column: relation.to_column.clone(),
            });
            Ok::<_, Error>((relation.to.as_str(), hops))
         },
      )?;

      Ok(ColumnSpec {
         name: reference.to_string(),
         display_index,
         column: leaf.to_string(),
         relation_path: Some(hops),
      })
   }
}
