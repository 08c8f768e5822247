//! `casefold(x)`: Unicode lower-casing for SQL.
//!
//! SQLite's built-in `LOWER()` only folds ASCII letters, so `'ÉCOLE'` and
//! `'école'` compare unequal under it. Every connection opened by
//! [`SqliteDatabase`](crate::SqliteDatabase) gets this function registered
//! instead, backed by [`str::to_lowercase`].
//!
//! ```text
//! casefold(CAST("books_book"."title" AS TEXT)) LIKE casefold(?)
//! ```

use std::ffi::{CStr, c_char, c_int};
use std::ptr;

use libsqlite3_sys as ffi;
use sqlx::sqlite::SqliteConnection;
use tracing::trace;

/// Name the function is registered under.
pub const CASEFOLD_FUNCTION: &str = "casefold";

const CASEFOLD_NAME: &CStr = c"casefold";

/// Register `casefold()` on a freshly opened connection.
pub(crate) async fn register(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
   let mut handle = conn.lock_handle().await?;
   let db: *mut ffi::sqlite3 = handle.as_raw_handle().as_ptr();

   // SAFETY: db is a live connection handle held locked for the duration of
   // the call; the function keeps no user data.
   let rc = unsafe {
      ffi::sqlite3_create_function_v2(
         db,
         CASEFOLD_NAME.as_ptr(),
         1,
         ffi::SQLITE_UTF8 | ffi::SQLITE_DETERMINISTIC,
         ptr::null_mut(),
         Some(casefold),
         None,
         None,
         None,
      )
   };

   if rc != ffi::SQLITE_OK {
      return Err(sqlx::Error::Protocol(format!(
         "failed to register {}() (sqlite code {})",
         CASEFOLD_FUNCTION, rc
      )));
   }

   trace!("registered {}()", CASEFOLD_FUNCTION);
   Ok(())
}

/// NULL stays NULL; everything else is read as UTF-8 text and lower-cased.
unsafe extern "C" fn casefold(
   ctx: *mut ffi::sqlite3_context,
   argc: c_int,
   argv: *mut *mut ffi::sqlite3_value,
) {
   // SAFETY: SQLite passes `argc` valid values in `argv`; the text pointer
   // is valid for `sqlite3_value_bytes` bytes until the value changes.
   unsafe {
      if argc != 1 {
         ffi::sqlite3_result_null(ctx);
         return;
      }

      let value = *argv;
      if ffi::sqlite3_value_type(value) == ffi::SQLITE_NULL {
         ffi::sqlite3_result_null(ctx);
         return;
      }

      let text = ffi::sqlite3_value_text(value);
      let len = ffi::sqlite3_value_bytes(value);
      if text.is_null() || len <= 0 {
         ffi::sqlite3_result_text(ctx, c"".as_ptr(), 0, ffi::SQLITE_TRANSIENT());
         return;
      }

      let bytes = std::slice::from_raw_parts(text, len as usize);
      let folded = fold(bytes);
      match c_int::try_from(folded.len()) {
         Ok(folded_len) => ffi::sqlite3_result_text(
            ctx,
            folded.as_ptr().cast::<c_char>(),
            folded_len,
            ffi::SQLITE_TRANSIENT(),
         ),
         Err(_) => ffi::sqlite3_result_error_toobig(ctx),
      }
   }
}

fn fold(bytes: &[u8]) -> String {
   String::from_utf8_lossy(bytes).to_lowercase()
}
