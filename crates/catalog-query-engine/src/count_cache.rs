//! Session-scoped memoization of search result counts.
//!
//! `SELECT COUNT(*)` over a large table is the expensive part of a listing.
//! Each client session remembers the count of its most recent search; paging
//! through that search reuses it and only a new term or field selector
//! triggers another count.
//!
//! The check and the update happen under one per-session async lock, so two
//! concurrent requests from the same session cannot interleave and leave a
//! count stored under the wrong key. Different sessions never contend.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::Result;
use crate::executor::QueryExecutor;

/// Cached count for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCountState {
   /// Derived from table, field selector and term
   pub last_query_key: String,
   pub cached_count: u64,
}

type SessionSlot = Arc<tokio::sync::Mutex<Option<SessionCountState>>>;

/// Sessions a [`SessionStore`] keeps unless told otherwise.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Key-value store of per-session count state, keyed by session id.
///
/// The store is passed into the engine explicitly; it holds at most one
/// entry per session and entries are replaced, never appended to.
///
/// At most `max_sessions` sessions are kept. Registering one more evicts the
/// session used least recently; an evicted session simply counts again on
/// its next search.
#[derive(Debug)]
pub struct SessionStore {
   sessions: Mutex<IndexMap<String, SessionSlot>>,
   max_sessions: usize,
}

impl Default for SessionStore {
   fn default() -> Self {
      Self::with_max_sessions(DEFAULT_MAX_SESSIONS)
   }
}

impl SessionStore {
   pub fn new() -> Self {
      Self::default()
   }

   /// Store holding at most `max_sessions` sessions (at least one).
   pub fn with_max_sessions(max_sessions: usize) -> Self {
      Self {
         sessions: Mutex::new(IndexMap::new()),
         max_sessions: max_sessions.max(1),
      }
   }

   pub fn max_sessions(&self) -> usize {
      self.max_sessions
   }

   /// Register a fresh session and return its id.
   pub fn new_session(&self) -> String {
      let id = uuid::Uuid::new_v4().to_string();
      self.slot(&id);
      id
   }

   /// Drop a session's state. Returns whether the session existed.
   pub fn forget(&self, session_id: &str) -> bool {
      self.sessions.lock().shift_remove(session_id).is_some()
   }

   /// Current state of a session, if it has counted anything yet.
   pub async fn state(&self, session_id: &str) -> Option<SessionCountState> {
      let slot = self.sessions.lock().get(session_id).cloned()?;
      let state = slot.lock().await;
      state.clone()
   }

   pub fn len(&self) -> usize {
      self.sessions.lock().len()
   }

   pub fn is_empty(&self) -> bool {
      self.sessions.lock().is_empty()
   }

   /// The session's slot, created if needed and marked most recently used.
   fn slot(&self, session_id: &str) -> SessionSlot {
      // The map lock is released before the slot is awaited on.
      let mut sessions = self.sessions.lock();

      if let Some(index) = sessions.get_index_of(session_id) {
         let last = sessions.len() - 1;
         sessions.move_index(index, last);
         return Arc::clone(&sessions[last]);
      }

      while sessions.len() >= self.max_sessions {
         match sessions.shift_remove_index(0) {
            Some((evicted, _)) => debug!("evicting least recently used session {}", evicted),
            None => break,
         }
      }

      let slot = SessionSlot::default();
      sessions.insert(session_id.to_string(), Arc::clone(&slot));
      slot
   }
}

/// Build the cache key for one search.
///
/// Components are separated by `:`, which can appear in none of the
/// preceding parts (a validated identifier and a selector), so distinct
/// searches never share a key. A missing selector is written as `*`.
pub fn query_key(table: &str, field_selector: Option<usize>, term: &str) -> String {
   let selector = field_selector.map_or_else(|| "*".to_string(), |s| s.to_string());
   format!("{}:{}:{}", table, selector, term)
}

/// Return the count for `query_key`, running `count_sql` only on a miss.
///
/// At most one count query runs per distinct key per session; a hit
/// performs no I/O. A failed count leaves the previous state untouched.
pub async fn get_count<E: QueryExecutor>(
   store: &SessionStore,
   session_id: &str,
   query_key: &str,
   count_sql: &str,
   params: &[String],
   executor: &E,
) -> Result<u64> {
   let slot = store.slot(session_id);
   let mut state = slot.lock().await;

   if let Some(cached) = state.as_ref()
      && cached.last_query_key == query_key
   {
      trace!("count cache hit for session {}", session_id);
      return Ok(cached.cached_count);
   }

   debug!("count cache miss for session {} ({})", session_id, query_key);
   let count = executor.fetch_count(count_sql, params).await?;

   *state = Some(SessionCountState {
      last_query_key: query_key.to_string(),
      cached_count: count,
   });

   Ok(count)
}
