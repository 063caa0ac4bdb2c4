//! Base64 discipline for binary fields.
//!
//! The JSON gateway carries etcd `bytes` fields (keys, values, range ends,
//! permission keys) as base64 text. Outgoing string-typed parameters are
//! encoded with [`encode`]; designated response fields are decoded back
//! into [`Value::Bytes`] by [`decode_fields`] and [`decode_flat_list`].

use base64::prelude::*;
use tracing::debug;

use crate::params::{Param, Params};
use crate::value::{Object, Value};

/// Fields decoded on key/value records (`kvs`, `prev_kv`, `prev_kvs`).
pub const KV_FIELDS: &[&str] = &["key", "value"];

/// Fields decoded on permission records (`perm`).
pub const PERM_FIELDS: &[&str] = &["key", "range_end"];

pub fn encode_bytes(raw: &[u8]) -> String {
    BASE64_STANDARD.encode(raw)
}

pub fn decode_bytes(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_STANDARD.decode(encoded)
}

/// Base64-encode every string-typed value of a flat mapping.
///
/// Integers, booleans and nested maps pass through unchanged.
pub fn encode(params: Params) -> Params {
    params
        .into_iter()
        .map(|(name, value)| match value {
            Param::Str(raw) => (name, Param::Str(encode_bytes(&raw).into_bytes())),
            other => (name, other),
        })
        .collect()
}

/// A response field holding either one record or a list of records.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSet {
    Single(Value),
    Many(Vec<Value>),
}

impl RecordSet {
    /// A JSON array is a list of records; anything else is a single record.
    pub fn detect(value: Value) -> Self {
        match value {
            Value::Array(items) => RecordSet::Many(items),
            other => RecordSet::Single(other),
        }
    }

    pub fn records_mut(&mut self) -> std::slice::IterMut<'_, Value> {
        match self {
            RecordSet::Single(record) => std::slice::from_mut(record).iter_mut(),
            RecordSet::Many(records) => records.iter_mut(),
        }
    }

    /// Back to a value with the original single-or-list shape.
    pub fn into_value(self) -> Value {
        match self {
            RecordSet::Single(record) => record,
            RecordSet::Many(records) => Value::Array(records),
        }
    }
}

/// Decode the named fields of every record under `list_field`.
///
/// A missing `list_field` returns the body unchanged. Missing fields are
/// skipped, and a field that is not valid base64 is left as it arrived.
pub fn decode_fields(mut body: Object, list_field: &str, fields: &[&str]) -> Object {
    let Some(raw) = body.remove(list_field) else {
        return body;
    };

    let mut records = RecordSet::detect(raw);
    for record in records.records_mut() {
        if let Value::Object(record) = record {
            for field in fields {
                if let Some(slot) = record.get_mut(*field) {
                    decode_in_place(field, slot);
                }
            }
        }
    }

    body.insert(list_field.to_string(), records.into_value());
    body
}

/// Decode every element of a flat list of base64 strings under `field`.
///
/// Used for lease `keys`, which are bare byte strings rather than
/// key/value records.
pub fn decode_flat_list(mut body: Object, field: &str) -> Object {
    if let Some(Value::Array(items)) = body.get_mut(field) {
        for item in items.iter_mut() {
            decode_in_place(field, item);
        }
    }
    body
}

fn decode_in_place(field: &str, slot: &mut Value) {
    let Value::String(encoded) = &*slot else {
        return;
    };
    match decode_bytes(encoded) {
        Ok(raw) => *slot = Value::Bytes(raw),
        Err(e) => debug!(field, error = %e, "field is not base64, leaving as-is"),
    }
}
