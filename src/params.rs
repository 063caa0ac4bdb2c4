//! Request parameter mappings.
//!
//! A [`Params`] is built fresh for every call. String-typed values are byte
//! strings ([`Param::Str`]) so binary keys and range ends can be expressed;
//! the codec turns them into base64 text before they reach the wire.

use std::collections::BTreeMap;

/// A single request field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Str(Vec<u8>),
    Int(i64),
    Bool(bool),
    /// Nested structure, sent as a JSON object and never re-encoded.
    Map(Params),
}

impl Param {
    fn into_json(self) -> serde_json::Value {
        match self {
            Param::Str(bytes) => {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
            }
            Param::Int(n) => serde_json::Value::from(n),
            Param::Bool(b) => serde_json::Value::Bool(b),
            Param::Map(params) => params.into_json(),
        }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Str(s.as_bytes().to_vec())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Str(s.into_bytes())
    }
}

impl From<&String> for Param {
    fn from(s: &String) -> Self {
        Param::Str(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Param {
    fn from(bytes: &[u8]) -> Self {
        Param::Str(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Param {
    fn from(bytes: &[u8; N]) -> Self {
        Param::Str(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Param {
    fn from(bytes: Vec<u8>) -> Self {
        Param::Str(bytes)
    }
}

impl From<i64> for Param {
    fn from(n: i64) -> Self {
        Param::Int(n)
    }
}

impl From<i32> for Param {
    fn from(n: i32) -> Self {
        Param::Int(n.into())
    }
}

impl From<u32> for Param {
    fn from(n: u32) -> Self {
        Param::Int(n.into())
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Bool(b)
    }
}

impl From<Params> for Param {
    fn from(params: Params) -> Self {
        Param::Map(params)
    }
}

/// Field name to value mapping for one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    fields: BTreeMap<String, Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Param>) -> Option<Param> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into `self`; fields present in both take `other`'s value.
    pub fn merge(&mut self, other: Params) {
        self.fields.extend(other.fields);
    }

    /// Render as the JSON request body.
    pub fn into_json(self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .into_iter()
                .map(|(k, v)| (k, v.into_json()))
                .collect(),
        )
    }
}

impl IntoIterator for Params {
    type Item = (String, Param);
    type IntoIter = std::collections::btree_map::IntoIter<String, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<(String, Param)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Param)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
