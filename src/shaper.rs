//! Pretty-mode response shaping.
//!
//! In pretty mode the gateway's envelope (`header`) is dropped and the
//! interesting part of each reply is lifted out: key/value records become a
//! [`KeyValueMap`], and single-field replies (token, roles, users) become
//! that field. Without pretty mode callers get the body as decoded.

use crate::codec::RecordSet;
use crate::value::{KeyValueMap, Object, Reply, Value};

/// Envelope field carrying cluster id, member id, revision and raft term.
pub const ENVELOPE_FIELD: &str = "header";

/// Remove the response envelope when pretty mode is on.
pub fn strip_envelope(body: &mut Object, pretty: bool) {
    if pretty {
        body.remove(ENVELOPE_FIELD);
    }
}

/// Collapse decoded key/value records.
///
/// A single record yields its `value`. A list yields a map from each
/// record's `key` to its `value`, in input order; a key seen twice keeps
/// its first position and the later value.
pub fn flatten_records(records: Value) -> Reply {
    match RecordSet::detect(records) {
        RecordSet::Single(record) => {
            Reply::Value(record.get("value").cloned().unwrap_or_default())
        }
        RecordSet::Many(items) => {
            let mut map = KeyValueMap::new();
            for item in items {
                let Value::Object(mut record) = item else {
                    continue;
                };
                let Some(key) = record.remove("key").and_then(Value::into_bytes) else {
                    continue;
                };
                map.insert(key, record.remove("value").unwrap_or_default());
            }
            Reply::Records(map)
        }
    }
}

/// In pretty mode, flatten the records under `field` if present.
pub fn flatten_field(mut body: Object, field: &str, pretty: bool) -> Reply {
    if pretty {
        if let Some(records) = body.remove(field) {
            return flatten_records(records);
        }
    }
    Reply::Body(body)
}

/// In pretty mode, return just `field` if present.
pub fn unwrap_field(mut body: Object, field: &str, pretty: bool) -> Reply {
    if pretty {
        if let Some(value) = body.remove(field) {
            return Reply::Value(value);
        }
    }
    Reply::Body(body)
}

/// Lift `{ID, TTL}` out of the `result` wrapper the gateway puts around
/// keepalive replies. Bodies without the wrapper pass through.
pub fn unwrap_keepalive(mut body: Object) -> Object {
    let mut result = match body.remove("result") {
        Some(Value::Object(result)) => result,
        Some(other) => {
            body.insert("result".to_string(), other);
            return body;
        }
        None => return body,
    };
    let mut unwrapped = Object::new();
    for field in ["ID", "TTL"] {
        unwrapped.insert(
            field.to_string(),
            result.remove(field).unwrap_or_default(),
        );
    }
    unwrapped
}
