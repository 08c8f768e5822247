//! Engine-level settings: page size, show-all threshold, out-of-range policy

use serde::{Deserialize, Serialize};

use crate::count_cache::DEFAULT_MAX_SESSIONS;
use crate::{Error, Result};

/// What to serve when the requested page lies past the last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutOfRangePolicy {
   /// Serve the last valid page instead
   #[default]
   Clamp,
   /// Serve an empty page that still reports the total count
   Empty,
}

/// Configuration for a [`SearchEngine`](crate::SearchEngine)
///
/// # Examples
///
/// ```
/// use catalog_query_engine::{EngineConfig, OutOfRangePolicy};
///
/// let config = EngineConfig {
///     page_size: 15,
///     out_of_range: OutOfRangePolicy::Empty,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
   /// Rows per page (the `LIMIT` of every page query)
   ///
   /// Default: 100
   pub page_size: u64,

   /// Largest total for which a listing may offer "show all"
   ///
   /// Default: 200
   pub max_show_all: u64,

   /// Handling of page numbers past the last page
   ///
   /// Default: [`OutOfRangePolicy::Clamp`]
   pub out_of_range: OutOfRangePolicy,

   /// OR a predicate for every searchable field when no field selector is
   /// given, instead of searching only the first searchable field
   ///
   /// Default: false
   pub search_all_when_unselected: bool,

   /// Sessions whose counts are remembered at once; the least recently used
   /// is dropped beyond this
   ///
   /// Default: 10 000
   pub max_sessions: usize,
}

impl Default for EngineConfig {
   fn default() -> Self {
      Self {
         page_size: 100,
         max_show_all: 200,
         out_of_range: OutOfRangePolicy::Clamp,
         search_all_when_unselected: false,
         max_sessions: DEFAULT_MAX_SESSIONS,
      }
   }
}

impl EngineConfig {
   /// Reject settings no request could be served with.
   pub fn validate(&self) -> Result<()> {
      if self.page_size == 0 {
         return Err(Error::Configuration(
            "page size must be greater than zero".into(),
         ));
      }
      if self.page_size > i64::MAX as u64 {
         return Err(Error::Configuration(format!(
            "page size must be at most {}",
            i64::MAX
         )));
      }
      if self.max_sessions == 0 {
         return Err(Error::Configuration(
            "max sessions must be greater than zero".into(),
         ));
      }
      Ok(())
   }
}
