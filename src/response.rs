// Acknowledgement returned by the upload endpoint on HTTP 200, e.g.
// {"ok":true,"path":"/files/<token>/data-collection_<serial>_<timestamp>.tgz"}

use serde::Deserialize;
use serde_json::Value;

/// Raw shape of the acknowledgement. Both fields are kept as `Value`
/// because servers are loose about types and we only care about truthiness.
#[derive(Deserialize, Debug, Default)]
struct Ack {
    #[serde(default)]
    ok: Value,
    #[serde(default)]
    path: Value,
}

/// Returns the server-assigned path when `body` is a JSON object with a
/// truthy `ok` and a non-empty string `path`.
pub fn accepted_path(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    let ack: Ack = serde_json::from_str(body).ok()?;
    if !truthy(&ack.ok) {
        return None;
    }
    match ack.path {
        Value::String(path) if !path.is_empty() => Some(path),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
