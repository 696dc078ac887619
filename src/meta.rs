//! Ordered metadata bags.
//!
//! [`Metadata`] is the consolidated-metadata currency of the reader: the
//! global dataset record, per-variable attribute bags, and execute-phase
//! requests are all bags. Entries keep insertion order so repeated
//! serializations of the same record are byte-identical.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::array::VariantArray;
use crate::errors::{MetadataMissingSnafu, MetadataTypeSnafu, Result, SerializationSnafu};

/// A value held by a [`Metadata`] bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Array(VariantArray),
    Str(String),
    StrList(Vec<String>),
    Nested(Metadata),
}

impl From<VariantArray> for Value {
    fn from(v: VariantArray) -> Self {
        Value::Array(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StrList(v)
    }
}

impl From<Metadata> for Value {
    fn from(v: Metadata) -> Self {
        Value::Nested(v)
    }
}

/// An ordered mapping from string keys to [`Value`]s. Keys are unique;
/// inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, Value)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// String entry at `key`, failing when absent or of a different shape.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(Value::Str(s)) => Ok(s),
            Some(_) => MetadataTypeSnafu { key, expected: "string" }.fail(),
            None => MetadataMissingSnafu { key }.fail(),
        }
    }

    pub fn get_str_list(&self, key: &str) -> Result<&[String]> {
        match self.get(key) {
            Some(Value::StrList(v)) => Ok(v),
            Some(_) => MetadataTypeSnafu { key, expected: "string list" }.fail(),
            None => MetadataMissingSnafu { key }.fail(),
        }
    }

    pub fn get_array(&self, key: &str) -> Result<&VariantArray> {
        match self.get(key) {
            Some(Value::Array(a)) => Ok(a),
            Some(_) => MetadataTypeSnafu { key, expected: "array" }.fail(),
            None => MetadataMissingSnafu { key }.fail(),
        }
    }

    pub fn get_nested(&self, key: &str) -> Result<&Metadata> {
        match self.get(key) {
            Some(Value::Nested(m)) => Ok(m),
            Some(_) => MetadataTypeSnafu { key, expected: "nested bag" }.fail(),
            None => MetadataMissingSnafu { key }.fail(),
        }
    }

    /// Integer array entry at `key` widened to `u64`.
    pub fn get_u64s(&self, key: &str) -> Result<Vec<u64>> {
        let arr = self.get_array(key)?;
        (0..arr.len())
            .map(|i| {
                arr.get_i64(i)
                    .map(|v| v as u64)
                    .context(MetadataTypeSnafu { key, expected: "integer array" })
            })
            .collect()
    }

    /// First element of the integer array entry at `key`.
    pub fn get_u64(&self, key: &str) -> Result<u64> {
        self.get_array(key)?
            .get_i64(0)
            .map(|v| v as u64)
            .context(MetadataTypeSnafu { key, expected: "integer array" })
    }

    /// Serialize the bag to an opaque byte stream.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context(SerializationSnafu)
    }

    /// Reconstruct a bag from [`Metadata::to_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Metadata> {
        bincode::deserialize(bytes).context(SerializationSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ElementKind;
    use crate::errors::Error;

    #[test]
    fn insert_replaces_in_place() {
        let mut md = Metadata::new();
        md.insert("a", "one");
        md.insert("b", "two");
        md.insert("a", "three");
        assert_eq!(md.len(), 2);
        assert_eq!(md.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(md.get_str("a").unwrap(), "three");
    }

    #[test]
    fn typed_getters_check_shape() {
        let mut md = Metadata::new();
        md.insert("root", "/data");
        assert!(matches!(
            md.get_str("missing"),
            Err(Error::MetadataMissing { .. })
        ));
        assert!(matches!(
            md.get_array("root"),
            Err(Error::MetadataType { .. })
        ));
    }

    #[test]
    fn u64_extraction_widens_integer_arrays() {
        let mut md = Metadata::new();
        md.insert("whole_extent", VariantArray::U64(vec![0, 3, 0, 2, 0, 0]));
        md.insert("steps", VariantArray::I32(vec![7]));
        assert_eq!(md.get_u64s("whole_extent").unwrap(), [0, 3, 0, 2, 0, 0]);
        assert_eq!(md.get_u64("steps").unwrap(), 7);
    }

    #[test]
    fn byte_stream_round_trips() {
        let mut inner = Metadata::new();
        inner.insert("x", VariantArray::F64(vec![0.0, 1.0]));
        inner.insert("x_variable", "lon");

        let mut md = Metadata::new();
        md.insert("coordinates", inner);
        md.insert("files", vec!["a.nc".to_string(), "b.nc".to_string()]);
        md.insert("step_count", VariantArray::U64(vec![3, 2]));

        let bytes = md.to_bytes().unwrap();
        let back = Metadata::from_bytes(&bytes).unwrap();
        assert_eq!(md, back);
    }

    #[test]
    fn repeated_serialization_is_byte_identical() {
        let mut md = Metadata::new();
        md.insert("variables", vec!["tas".to_string()]);
        md.insert("t", VariantArray::new(ElementKind::F64, 4));
        assert_eq!(md.to_bytes().unwrap(), md.to_bytes().unwrap());
    }

    #[test]
    fn empty_bag_reports_empty() {
        let md = Metadata::new();
        assert!(md.is_empty());
        assert!(!md.contains("anything"));
    }
}
