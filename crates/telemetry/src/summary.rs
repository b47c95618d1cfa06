use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value, json};

/// Reduces a payload to a JSON object that can always be shipped.
///
/// The sink only accepts objects (or nothing) as request and response summaries. Values that
/// serialize to an object are projected field by field and other serializable values go through
/// [`summarize_value`]. Anything serde refuses, such as maps with non-string keys or hand-written
/// impls that fail, falls back to `{"text": <Debug>}`. This never fails.
pub fn summarize<T>(value: &T) -> Value
where
    T: Serialize + fmt::Debug + ?Sized,
{
    match serde_json::to_value(value) {
        Ok(projection) => summarize_value(projection),
        Err(e) => {
            log::debug!("Payload is not JSON encodable, summarizing as text: {e}");
            json!({ "text": format!("{value:?}") })
        }
    }
}

/// Shapes an already projected payload for the sink. Objects and `null` are kept, scalars and
/// arrays are wrapped as `{"value": ...}`.
pub fn summarize_value(projection: Value) -> Value {
    match projection {
        Value::Object(_) | Value::Null => projection,
        other => Value::Object(Map::from_iter([("value".to_string(), other)])),
    }
}
