//! Entity types and their attribute declarations.

use serde::{Deserialize, Serialize};

use crate::ids::{ReferenceAttributeId, TextAttributeId, TypeId};

/// A declared text attribute (a "property"). Text attributes have no outgoing
/// edges in the schema graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextAttribute {
    pub domain: TypeId,
    pub id: String,
}

impl TextAttribute {
    pub fn new(domain: TypeId, id: impl Into<String>) -> Self {
        Self {
            domain,
            id: id.into(),
        }
    }

    pub fn identifier(&self) -> TextAttributeId {
        TextAttributeId::new(self.domain.clone(), self.id.clone())
    }
}

/// A declared reference attribute: an edge `domain -id-> range` in the schema
/// graph. `range` may equal `domain` and may live in another graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceAttribute {
    pub domain: TypeId,
    pub id: String,
    pub range: TypeId,
}

impl ReferenceAttribute {
    pub fn new(domain: TypeId, id: impl Into<String>, range: TypeId) -> Self {
        Self {
            domain,
            id: id.into(),
            range,
        }
    }

    pub fn identifier(&self) -> ReferenceAttributeId {
        ReferenceAttributeId::new(self.domain.clone(), self.id.clone())
    }
}

/// An entity type with its ordered attribute declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub id: TypeId,
    #[serde(default)]
    pub text_attributes: Vec<TextAttribute>,
    #[serde(default)]
    pub reference_attributes: Vec<ReferenceAttribute>,
}

impl EntityType {
    pub fn builder(id: TypeId) -> EntityTypeBuilder {
        EntityTypeBuilder {
            ty: EntityType {
                id,
                text_attributes: Vec::new(),
                reference_attributes: Vec::new(),
            },
        }
    }

    pub fn text_attribute(&self, id: &str) -> Option<&TextAttribute> {
        self.text_attributes.iter().find(|a| a.id == id)
    }

    pub fn reference_attribute(&self, id: &str) -> Option<&ReferenceAttribute> {
        self.reference_attributes.iter().find(|a| a.id == id)
    }
}

/// Builder for [`EntityType`] that fills in attribute domains.
#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
    ty: EntityType,
}

impl EntityTypeBuilder {
    pub fn text_attribute(mut self, id: impl Into<String>) -> Self {
        let domain = self.ty.id.clone();
        self.ty.text_attributes.push(TextAttribute::new(domain, id));
        self
    }

    pub fn reference_attribute(mut self, id: impl Into<String>, range: TypeId) -> Self {
        let domain = self.ty.id.clone();
        self.ty
            .reference_attributes
            .push(ReferenceAttribute::new(domain, id, range));
        self
    }

    pub fn build(self) -> EntityType {
        self.ty
    }
}
