//! Identifiers of schema elements.
//!
//! A type is identified by its graph (a UUID) plus a local code. Attributes are
//! identified by their domain type plus a local code. All ids are small value
//! objects with structural equality, so they can be used as map keys and
//! de-duplicated freely.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// `(graph, local id)` identity of an entity type.
///
/// Serialized as its display form, `<graph uuid>.<type id>`, so it can key
/// JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TypeId {
    pub graph: Uuid,
    pub id: String,
}

impl TypeId {
    pub fn new(graph: Uuid, id: impl Into<String>) -> Self {
        Self {
            graph,
            id: id.into(),
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.graph, self.id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeIdParseError {
    #[error("type id `{0}` must have the form `<graph uuid>.<type id>`")]
    Shape(String),
    #[error("invalid graph id in `{text}`: {message}")]
    Graph { text: String, message: String },
}

impl FromStr for TypeId {
    type Err = TypeIdParseError;

    /// Parses the `Display` form, `<graph uuid>.<type id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((graph, id)) = s.split_once('.') else {
            return Err(TypeIdParseError::Shape(s.to_string()));
        };
        if id.is_empty() || id.contains('.') {
            return Err(TypeIdParseError::Shape(s.to_string()));
        }
        let graph = Uuid::parse_str(graph).map_err(|e| TypeIdParseError::Graph {
            text: s.to_string(),
            message: e.to_string(),
        })?;
        Ok(TypeId::new(graph, id))
    }
}

impl From<TypeId> for String {
    fn from(id: TypeId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TypeId {
    type Error = TypeIdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// `(domain type, local id)` identity of a text attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextAttributeId {
    pub domain: TypeId,
    pub id: String,
}

impl TextAttributeId {
    pub fn new(domain: TypeId, id: impl Into<String>) -> Self {
        Self {
            domain,
            id: id.into(),
        }
    }
}

impl fmt::Display for TextAttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.id)
    }
}

/// `(type, local id)` identity of a reference attribute.
///
/// For qualified *referrer* selections the type component is the attribute's
/// range rather than its domain; see `termql-select`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceAttributeId {
    pub domain: TypeId,
    pub id: String,
}

impl ReferenceAttributeId {
    pub fn new(domain: TypeId, id: impl Into<String>) -> Self {
        Self {
            domain,
            id: id.into(),
        }
    }
}

impl fmt::Display for ReferenceAttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.id)
    }
}
