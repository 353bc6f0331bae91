//! Format-independent view over parsed planet documents.
//!
//! The descriptor parser only sees the [`DocumentNode`] capabilities: node
//! kind, ordered key/value iteration and scalar extraction. Concrete formats
//! plug in underneath: [`DocValue`] is built through serde from RON or JSON
//! text and keeps every mapping entry in document order, duplicate keys
//! included. `serde_json::Value` implements the trait directly for callers
//! that already hold JSON.

use std::fmt;
use std::path::Path;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

/// Shape of a document node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Sequence,
    Mapping,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Null => "null",
            NodeKind::Bool => "bool",
            NodeKind::Integer => "integer",
            NodeKind::Float => "float",
            NodeKind::String => "string",
            NodeKind::Sequence => "sequence",
            NodeKind::Mapping => "mapping",
        };
        f.write_str(name)
    }
}

/// Read-only capabilities the descriptor parser needs from a document tree.
pub trait DocumentNode {
    /// Shape of this node.
    fn kind(&self) -> NodeKind;

    /// Key/value pairs of a mapping in document order. Empty for non-mappings.
    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Self)> + '_>;

    /// Elements of a sequence in document order. Empty for non-sequences.
    fn elements(&self) -> Box<dyn Iterator<Item = &Self> + '_>;

    /// Integer value, if the node is an integer scalar.
    fn as_integer(&self) -> Option<i64>;

    /// Floating-point value, if the node is a numeric scalar.
    fn as_float(&self) -> Option<f64>;

    /// String value, if the node is a string scalar.
    fn as_string(&self) -> Option<&str>;

    fn is_null(&self) -> bool {
        self.kind() == NodeKind::Null
    }

    fn is_mapping(&self) -> bool {
        self.kind() == NodeKind::Mapping
    }

    /// First value stored under `key` in a mapping.
    fn get(&self, key: &str) -> Option<&Self> {
        self.entries().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Errors produced while turning document text into a [`DocValue`] tree.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The text is not valid RON.
    #[error("invalid RON document: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// The text is not valid JSON.
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Text formats planet documents can be written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentFormat {
    Ron,
    Json,
}

impl DocumentFormat {
    /// Picks the format from a file extension. Anything but `.json` is RON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Ron,
        }
    }

    /// Parses document text into a generic tree.
    ///
    /// Blank text yields [`DocValue::Null`] rather than an error so that an
    /// empty file is reported as a missing root by the caller.
    pub fn parse(self, text: &str) -> Result<DocValue, DocumentError> {
        if text.trim().is_empty() {
            return Ok(DocValue::Null);
        }
        match self {
            DocumentFormat::Ron => Ok(ron::from_str(text)?),
            DocumentFormat::Json => Ok(serde_json::from_str(text)?),
        }
    }
}

/// Owned, order-preserving document tree.
#[derive(Clone, Debug, PartialEq)]
pub enum DocValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<DocValue>),
    /// Entries in document order. Keys may repeat.
    Mapping(Vec<(String, DocValue)>),
}

impl DocValue {
    /// Renders a scalar as a mapping key. Compound values cannot be keys.
    fn into_key(self) -> Option<String> {
        match self {
            DocValue::String(s) => Some(s),
            DocValue::Integer(i) => Some(i.to_string()),
            DocValue::Float(f) => Some(f.to_string()),
            DocValue::Bool(b) => Some(b.to_string()),
            DocValue::Null | DocValue::Sequence(_) | DocValue::Mapping(_) => None,
        }
    }
}

impl DocumentNode for DocValue {
    fn kind(&self) -> NodeKind {
        match self {
            DocValue::Null => NodeKind::Null,
            DocValue::Bool(_) => NodeKind::Bool,
            DocValue::Integer(_) => NodeKind::Integer,
            DocValue::Float(_) => NodeKind::Float,
            DocValue::String(_) => NodeKind::String,
            DocValue::Sequence(_) => NodeKind::Sequence,
            DocValue::Mapping(_) => NodeKind::Mapping,
        }
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Self)> + '_> {
        match self {
            DocValue::Mapping(entries) => Box::new(entries.iter().map(|(k, v)| (k.as_str(), v))),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn elements(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        match self {
            DocValue::Sequence(items) => Box::new(items.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            DocValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            DocValue::Integer(i) => Some(*i as f64),
            DocValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_string(&self) -> Option<&str> {
        match self {
            DocValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for DocValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DocValueVisitor)
    }
}

struct DocValueVisitor;

impl<'de> Visitor<'de> for DocValueVisitor {
    type Value = DocValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a planet document value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<DocValue, E> {
        Ok(DocValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DocValue, E> {
        Ok(DocValue::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DocValue, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => DocValue::Integer(i),
            Err(_) => DocValue::Float(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<DocValue, E> {
        Ok(DocValue::Float(v))
    }

    fn visit_char<E: de::Error>(self, v: char) -> Result<DocValue, E> {
        Ok(DocValue::String(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DocValue, E> {
        Ok(DocValue::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<DocValue, E> {
        Ok(DocValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<DocValue, E> {
        Ok(DocValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<DocValue, E> {
        Ok(DocValue::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<DocValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        DocValue::deserialize(deserializer)
    }

    fn visit_newtype_struct<D>(self, deserializer: D) -> Result<DocValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        DocValue::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<DocValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(DocValue::Sequence(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<DocValue, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(key) = map.next_key::<DocValue>()? {
            let key = key
                .into_key()
                .ok_or_else(|| de::Error::custom("mapping keys must be scalars"))?;
            let value = map.next_value()?;
            entries.push((key, value));
        }
        Ok(DocValue::Mapping(entries))
    }
}

impl DocumentNode for serde_json::Value {
    fn kind(&self) -> NodeKind {
        match self {
            serde_json::Value::Null => NodeKind::Null,
            serde_json::Value::Bool(_) => NodeKind::Bool,
            serde_json::Value::Number(n) if n.is_i64() => NodeKind::Integer,
            serde_json::Value::Number(_) => NodeKind::Float,
            serde_json::Value::String(_) => NodeKind::String,
            serde_json::Value::Array(_) => NodeKind::Sequence,
            serde_json::Value::Object(_) => NodeKind::Mapping,
        }
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Self)> + '_> {
        match self {
            serde_json::Value::Object(map) => Box::new(map.iter().map(|(k, v)| (k.as_str(), v))),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn elements(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        match self {
            serde_json::Value::Array(items) => Box::new(items.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn as_integer(&self) -> Option<i64> {
        serde_json::Value::as_i64(self)
    }

    fn as_float(&self) -> Option<f64> {
        serde_json::Value::as_f64(self)
    }

    fn as_string(&self) -> Option<&str> {
        serde_json::Value::as_str(self)
    }
}
