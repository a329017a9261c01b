//! The schema provider seam.
//!
//! The engine never owns schema storage: a provider lists every entity type
//! visible to the current caller, and the engine indexes that list as a
//! read-only snapshot for the duration of a call.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::EntityType;

pub trait SchemaProvider {
    fn list_types(&self) -> Result<Vec<EntityType>>;
}

/// A fixed list of types, e.g. loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticSchema {
    pub types: Vec<EntityType>,
}

impl StaticSchema {
    pub fn new(types: Vec<EntityType>) -> Self {
        Self { types }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl SchemaProvider for StaticSchema {
    fn list_types(&self) -> Result<Vec<EntityType>> {
        Ok(self.types.clone())
    }
}
