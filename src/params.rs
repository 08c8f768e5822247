//! Listing query parameters: `q`, `mf`, `o`, `p`

use catalog_query_engine::{OrderCode, SearchRequest};
use serde::Deserialize;
use tracing::{debug, warn};

/// Raw listing parameters as they arrive from a query string.
///
/// Every value is kept as text; [`ListingParams::to_request`] applies the
/// lenient parsing rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingParams {
   /// Search term
   pub q: Option<String>,
   /// Index into the searchable fields
   pub mf: Option<String>,
   /// Order code, e.g. `-2.1`
   pub o: Option<String>,
   /// 1-based page number
   pub p: Option<String>,
}

impl ListingParams {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn with_q(mut self, q: impl Into<String>) -> Self {
      self.q = Some(q.into());
      self
   }

   pub fn with_mf(mut self, mf: impl Into<String>) -> Self {
      self.mf = Some(mf.into());
      self
   }

   pub fn with_o(mut self, o: impl Into<String>) -> Self {
      self.o = Some(o.into());
      self
   }

   pub fn with_p(mut self, p: impl Into<String>) -> Self {
      self.p = Some(p.into());
      self
   }

   /// Collect parameters from decoded query-string pairs.
   ///
   /// Unknown keys are ignored; a repeated key keeps its last value.
   pub fn from_pairs<I, K, V>(pairs: I) -> Self
   where
      I: IntoIterator<Item = (K, V)>,
      K: AsRef<str>,
      V: Into<String>,
   {
      pairs.into_iter().fold(Self::default(), |mut params, (key, value)| {
         match key.as_ref() {
            "q" => params.q = Some(value.into()),
            "mf" => params.mf = Some(value.into()),
            "o" => params.o = Some(value.into()),
            "p" => params.p = Some(value.into()),
            other => debug!("ignoring listing parameter {}", other),
         }
         params
      })
   }

   /// Turn the raw parameters into a [`SearchRequest`].
   ///
   /// - `mf` that is not a number, or is past the last of `searchable`
   ///   fields, falls back to the default field.
   /// - `o` that does not parse is dropped so the default sort applies.
   /// - `p` that is not a number is page 1.
   pub fn to_request(&self, searchable: usize) -> SearchRequest {
      let mut request = SearchRequest {
         term: self.q.clone(),
         ..Default::default()
      };

      if let Some(mf) = non_blank(&self.mf) {
         match mf.parse::<usize>() {
            Ok(index) if index < searchable => request.field_selector = Some(index),
            Ok(index) => warn!(
               "field selector {} out of range ({} searchable fields); using default",
               index, searchable
            ),
            Err(_) => warn!("ignoring malformed field selector {:?}", mf),
         }
      }

      if let Some(o) = non_blank(&self.o) {
         match o.parse::<OrderCode>() {
            Ok(code) => request.order_code = Some(code),
            Err(e) => warn!("ignoring order code: {}", e),
         }
      }

      if let Some(p) = non_blank(&self.p) {
         match p.parse::<i64>() {
            Ok(page) => request.page_number = page,
            Err(_) => debug!("non-numeric page {:?}; using page 1", p),
         }
      }

      request
   }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
   value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
