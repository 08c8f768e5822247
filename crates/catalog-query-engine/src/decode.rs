//! SQLite value to JSON conversion

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteValueRef;
use sqlx::{TypeInfo, Value, ValueRef};

use crate::{Error, Result};

/// Convert one raw SQLite value to JSON.
///
/// Dispatches on the storage class of the value itself, not the declared
/// column type. BLOBs become base64 strings.
pub(crate) fn to_json(v: SqliteValueRef<'_>) -> Result<JsonValue> {
   if v.is_null() {
      return Ok(JsonValue::Null);
   }

   let type_name = v.type_info().name().to_string();
   let value = ValueRef::to_owned(&v);

   let json = match type_name.as_str() {
      "TEXT" => JsonValue::String(value.try_decode::<String>()?),
      "INTEGER" | "NUMERIC" | "BOOLEAN" => JsonValue::from(value.try_decode::<i64>()?),
      "REAL" => JsonValue::from(value.try_decode::<f64>()?),
      "BLOB" => JsonValue::String(STANDARD.encode(value.try_decode::<Vec<u8>>()?)),
      other => return Err(Error::UnsupportedDatatype(other.to_string())),
   };

   Ok(json)
}
