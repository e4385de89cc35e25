use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A scalar metadata value, or an ordered list of scalars (e.g. `tags`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<MetadataScalar>),
}

/// The scalar subset of `MetadataValue`, used inside `List` and as the
/// comparison operand for leaf filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataScalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl MetadataValue {
    /// Scalar values iterate as a single element; list values iterate over
    /// their elements. Used by the facet engine, which contributes once per
    /// distinct element of a list-valued field.
    pub fn iter_scalars(&self) -> Box<dyn Iterator<Item = MetadataScalar> + '_> {
        match self {
            MetadataValue::String(s) => Box::new(std::iter::once(MetadataScalar::String(s.clone()))),
            MetadataValue::Integer(i) => Box::new(std::iter::once(MetadataScalar::Integer(*i))),
            MetadataValue::Float(f) => Box::new(std::iter::once(MetadataScalar::Float(*f))),
            MetadataValue::Bool(b) => Box::new(std::iter::once(MetadataScalar::Bool(*b))),
            MetadataValue::List(items) => Box::new(items.iter().cloned()),
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetadataScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataScalar::String(s) => write!(f, "{s}"),
            MetadataScalar::Integer(i) => write!(f, "{i}"),
            MetadataScalar::Float(v) => write!(f, "{v}"),
            MetadataScalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single indexable unit: an endpoint description, a schema fragment, a
/// request/response example. The core has no opinion on where `content`
/// came from; an external `DocumentProducer` parses OpenAPI/GraphQL/Postman
/// sources into these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), metadata: Metadata::new() }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Deterministic content-hash identifier used when a caller omits an
/// explicit `id`. Identical `(content, metadata)` tuples always hash to the
/// same id, which is what makes the orchestrator's duplicate-skip policy
/// work without an external id generator.
pub fn content_fingerprint(content: &str, metadata: &Metadata) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    for (key, value) in metadata {
        key.hash(&mut hasher);
        format!("{value:?}").hash(&mut hasher);
    }
    format!("doc_{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let meta: Metadata = [("method".to_string(), MetadataValue::String("GET".into()))].into();
        let a = content_fingerprint("hello", &meta);
        let b = content_fingerprint("hello", &meta);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_on_content() {
        let meta = Metadata::new();
        assert_ne!(content_fingerprint("a", &meta), content_fingerprint("b", &meta));
    }

    #[test]
    fn list_metadata_iterates_elements() {
        let value = MetadataValue::List(vec![
            MetadataScalar::String("a".into()),
            MetadataScalar::String("b".into()),
        ]);
        assert_eq!(value.iter_scalars().count(), 2);
    }

    /// `Document` is the wire format a `DocumentProducer` shell would
    /// serialize to submit a batch over HTTP; confirm it round-trips
    /// through the JSON encoding that implies, not just the derive.
    #[test]
    fn document_round_trips_through_json() {
        let mut metadata = Metadata::new();
        metadata.insert("method".to_string(), MetadataValue::String("GET".into()));
        metadata.insert("tags".to_string(), MetadataValue::List(vec![MetadataScalar::String("widgets".into())]));
        let doc = Document::new("doc_1", "list widgets").with_metadata(metadata);

        let json = serde_json::to_string(&doc).unwrap();
        let decoded: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, decoded);
    }
}
