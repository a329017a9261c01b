//! Unqualified projection tokens.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use termql_schema::TypeId;

/// Optional textual type scope of a token: `""`, `"Type."` or `"Graph.Type."`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    #[default]
    Any,
    Type(String),
    GraphType(Uuid, String),
}

impl Qualifier {
    /// One-part qualifiers compare local ids only and may match types in
    /// several graphs.
    pub fn matches(&self, ty: &TypeId) -> bool {
        match self {
            Qualifier::Any => true,
            Qualifier::Type(id) => ty.id == *id,
            Qualifier::GraphType(graph, id) => ty.graph == *graph && ty.id == *id,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Qualifier::Any)
    }
}

/// Prefix form including the trailing dot.
impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Any => Ok(()),
            Qualifier::Type(id) => write!(f, "{id}."),
            Qualifier::GraphType(graph, id) => write!(f, "{graph}.{id}."),
        }
    }
}

pub const DEFAULT_DEPTH: u32 = 1;

/// One requested field or traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "select", rename_all = "snake_case")]
pub enum Select {
    All,
    Id,
    Type,
    /// A plain node field such as `code` or `createdDate`.
    Field { name: String },
    AllProperties { qualifier: Qualifier },
    Property { qualifier: Qualifier, name: String },
    AllReferences { qualifier: Qualifier },
    Reference { qualifier: Qualifier, name: String, depth: u32 },
    AllReferrers { qualifier: Qualifier },
    Referrer { qualifier: Qualifier, name: String, depth: u32 },
}

impl Select {
    pub fn field(name: impl Into<String>) -> Self {
        Select::Field { name: name.into() }
    }

    pub fn property(name: impl Into<String>) -> Self {
        Select::Property {
            qualifier: Qualifier::Any,
            name: name.into(),
        }
    }

    pub fn reference(name: impl Into<String>, depth: u32) -> Self {
        Select::Reference {
            qualifier: Qualifier::Any,
            name: name.into(),
            depth,
        }
    }

    pub fn referrer(name: impl Into<String>, depth: u32) -> Self {
        Select::Referrer {
            qualifier: Qualifier::Any,
            name: name.into(),
            depth,
        }
    }

    /// Same token with `qualifier` in place of its current one. Tokens without
    /// a type scope are returned unchanged.
    pub fn qualified_by(self, qualifier: Qualifier) -> Self {
        match self {
            Select::AllProperties { .. } => Select::AllProperties { qualifier },
            Select::Property { name, .. } => Select::Property { qualifier, name },
            Select::AllReferences { .. } => Select::AllReferences { qualifier },
            Select::Reference { name, depth, .. } => Select::Reference {
                qualifier,
                name,
                depth,
            },
            Select::AllReferrers { .. } => Select::AllReferrers { qualifier },
            Select::Referrer { name, depth, .. } => Select::Referrer {
                qualifier,
                name,
                depth,
            },
            other => other,
        }
    }

    /// Tokens that need a type to be resolved against.
    pub fn is_type_scoped(&self) -> bool {
        !matches!(
            self,
            Select::All | Select::Id | Select::Type | Select::Field { .. }
        )
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = |d: &u32| {
            if *d == DEFAULT_DEPTH {
                String::new()
            } else {
                format!(":{d}")
            }
        };
        match self {
            Select::All => write!(f, "*"),
            Select::Id => write!(f, "id"),
            Select::Type => write!(f, "type"),
            Select::Field { name } => write!(f, "{name}"),
            Select::AllProperties { qualifier } => write!(f, "{qualifier}properties.*"),
            Select::Property { qualifier, name } => write!(f, "{qualifier}properties.{name}"),
            Select::AllReferences { qualifier } => write!(f, "{qualifier}references.*"),
            Select::Reference {
                qualifier,
                name,
                depth: d,
            } => write!(f, "{qualifier}references.{name}{}", depth(d)),
            Select::AllReferrers { qualifier } => write!(f, "{qualifier}referrers.*"),
            Select::Referrer {
                qualifier,
                name,
                depth: d,
            } => write!(f, "{qualifier}referrers.{name}{}", depth(d)),
        }
    }
}
