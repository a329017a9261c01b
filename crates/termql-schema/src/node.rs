//! Node model: the `(key, value)` pairs that leaf predicates are tested against.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ids::TypeId;

/// Key of a stored node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub id: Uuid,
    pub type_id: TypeId,
}

impl NodeId {
    pub fn new(id: Uuid, type_id: TypeId) -> Self {
        Self { id, type_id }
    }

    pub fn of(node: &Node) -> Self {
        Self::new(node.id, node.type_id.clone())
    }
}

/// A property value with an optional language tag (empty string = no language).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LangValue {
    #[serde(default)]
    pub lang: String,
    pub value: String,
}

impl LangValue {
    pub fn new(lang: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            value: value.into(),
        }
    }

    pub fn plain(value: impl Into<String>) -> Self {
        Self::new("", value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub type_id: TypeId,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub created_by: String,
    pub created_date: NaiveDateTime,
    #[serde(default)]
    pub last_modified_by: String,
    pub last_modified_date: NaiveDateTime,
    /// text attribute id -> values
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<LangValue>>,
    /// reference attribute id -> target node keys
    #[serde(default)]
    pub references: BTreeMap<String, Vec<NodeId>>,
}

impl Node {
    pub fn new(id: Uuid, type_id: TypeId, created: NaiveDateTime) -> Self {
        Self {
            id,
            type_id,
            code: None,
            uri: None,
            number: 0,
            created_by: String::new(),
            created_date: created,
            last_modified_by: String::new(),
            last_modified_date: created,
            properties: BTreeMap::new(),
            references: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> NodeId {
        NodeId::of(self)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_number(mut self, number: i64) -> Self {
        self.number = number;
        self
    }

    pub fn with_last_modified(mut self, date: NaiveDateTime) -> Self {
        self.last_modified_date = date;
        self
    }

    pub fn with_property(mut self, attr: impl Into<String>, value: LangValue) -> Self {
        self.properties.entry(attr.into()).or_default().push(value);
        self
    }

    pub fn with_reference(mut self, attr: impl Into<String>, target: NodeId) -> Self {
        self.references.entry(attr.into()).or_default().push(target);
        self
    }

    pub fn property_values<'a>(&'a self, attr: &str) -> impl Iterator<Item = &'a LangValue> + 'a {
        self.properties.get(attr).into_iter().flatten()
    }

    pub fn reference_values<'a>(&'a self, attr: &str) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.references.get(attr).into_iter().flatten()
    }
}
