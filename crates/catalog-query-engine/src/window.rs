//! Page bounds and listing flags derived from a cached total.
//!
//! The total always comes from the count cache; nothing in here counts rows.

use serde::Serialize;

use crate::{Error, Result};

/// Where the current page sits within the whole result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
   pub page_number: u64,
   pub page_size: u64,
   pub total_count: u64,
   /// At least 1, even for an empty result
   pub num_pages: u64,
   /// Whether the whole result is small enough to list on one page
   pub can_show_all: bool,
   pub multi_page: bool,
   /// 0-based offset of the first row on the page
   pub from_index: u64,
   /// Exclusive end offset of the page
   pub to_index: u64,
   pub previous_page: Option<u64>,
   pub next_page: Option<u64>,
}

impl PageWindow {
   /// Window for a page past the end, served empty.
   pub fn past_end(total_count: u64, page_size: u64, page_number: u64, max_show_all: u64) -> Self {
      let num_pages = num_pages(total_count, page_size);
      Self {
         page_number,
         page_size,
         total_count,
         num_pages,
         can_show_all: total_count <= max_show_all,
         multi_page: total_count > page_size,
         from_index: total_count,
         to_index: total_count,
         previous_page: Some(num_pages),
         next_page: None,
      }
   }

   /// Number of rows that fall on this page.
   pub fn len(&self) -> u64 {
      self.to_index - self.from_index
   }

   pub fn is_empty(&self) -> bool {
      self.len() == 0
   }
}

/// Number of pages needed for `total_count` rows; an empty result has one.
pub fn num_pages(total_count: u64, page_size: u64) -> u64 {
   if page_size == 0 {
      return 1;
   }
   total_count.div_ceil(page_size).max(1)
}

/// Describe page `page_number` (clamped to at least 1) of a result set.
///
/// Page 1 is always valid. Any later page whose offset reaches
/// `total_count` fails with [`Error::InvalidPage`]; the engine decides
/// whether to clamp or serve it empty.
pub fn describe_window(
   total_count: u64,
   page_size: u64,
   page_number: u64,
   max_show_all: u64,
) -> Result<PageWindow> {
   if page_size == 0 {
      return Err(Error::Configuration(
         "page size must be greater than zero".into(),
      ));
   }

   let page_number = page_number.max(1);
   let num_pages = num_pages(total_count, page_size);
   if page_number > num_pages {
      return Err(Error::InvalidPage {
         page: page_number,
         num_pages,
      });
   }

   let from_index = page_size * (page_number - 1);
   let to_index = from_index.saturating_add(page_size).min(total_count);

   Ok(PageWindow {
      page_number,
      page_size,
      total_count,
      num_pages,
      can_show_all: total_count <= max_show_all,
      multi_page: total_count > page_size,
      from_index,
      to_index,
      previous_page: (page_number > 1).then(|| page_number - 1),
      next_page: (page_number < num_pages).then(|| page_number + 1),
   })
}
