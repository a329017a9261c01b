//! Selects bound to concrete schema attributes.

use serde::{Deserialize, Serialize};
use std::fmt;

use termql_schema::{ReferenceAttributeId, TextAttributeId};

use crate::select::DEFAULT_DEPTH;

/// A [`crate::Select`] resolved against a type.
///
/// For `Referrer` the attribute id carries the attribute's *range* (the type
/// being referred to) rather than its domain, so that referrers with the same
/// local id from different domains collapse into one selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "select", rename_all = "snake_case")]
pub enum QualifiedSelect {
    All,
    Id,
    Type,
    Field {
        name: String,
    },
    Property {
        attribute: TextAttributeId,
    },
    Reference {
        attribute: ReferenceAttributeId,
        depth: u32,
    },
    Referrer {
        attribute: ReferenceAttributeId,
        depth: u32,
    },
}

impl QualifiedSelect {
    pub fn property(attribute: TextAttributeId) -> Self {
        QualifiedSelect::Property { attribute }
    }

    pub fn reference(attribute: ReferenceAttributeId, depth: u32) -> Self {
        QualifiedSelect::Reference { attribute, depth }
    }

    pub fn referrer(attribute: ReferenceAttributeId, depth: u32) -> Self {
        QualifiedSelect::Referrer { attribute, depth }
    }
}

impl fmt::Display for QualifiedSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = |d: u32| {
            if d == DEFAULT_DEPTH {
                String::new()
            } else {
                format!(":{d}")
            }
        };
        match self {
            QualifiedSelect::All => write!(f, "*"),
            QualifiedSelect::Id => write!(f, "id"),
            QualifiedSelect::Type => write!(f, "type"),
            QualifiedSelect::Field { name } => write!(f, "{name}"),
            QualifiedSelect::Property { attribute } => {
                write!(f, "{}.properties.{}", attribute.domain, attribute.id)
            }
            QualifiedSelect::Reference { attribute, depth } => write!(
                f,
                "{}.references.{}{}",
                attribute.domain,
                attribute.id,
                suffix(*depth)
            ),
            QualifiedSelect::Referrer { attribute, depth } => write!(
                f,
                "{}.referrers.{}{}",
                attribute.domain,
                attribute.id,
                suffix(*depth)
            ),
        }
    }
}
