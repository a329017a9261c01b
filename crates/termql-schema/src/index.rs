//! Immutable per-snapshot index over the schema graph.
//!
//! Built once from a list of entity types and then shared read-only by every
//! qualification call over that snapshot:
//! - `types_by_id`: type id -> position in declaration order
//! - `references_by_range`: range type id -> reference attributes pointing at it
//!
//! Reference ranges that are not part of the snapshot are kept (the attribute
//! is still selectable) but never resolve to a type; callers see them as a
//! scope miss. [`SchemaIndex::validate_strict`] turns them into errors.

use ahash::AHashMap;
use thiserror::Error;

use crate::ids::TypeId;
use crate::provider::SchemaProvider;
use crate::types::{EntityType, ReferenceAttribute};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate entity type `{0}` in schema snapshot")]
    DuplicateType(TypeId),
    #[error("attribute `{attribute}` declared on `{declared_on}` names domain `{domain}`")]
    ForeignAttribute {
        declared_on: TypeId,
        attribute: String,
        domain: TypeId,
    },
    #[error("reference attribute `{attribute}` ranges over `{range}`, which is not in the snapshot")]
    DanglingRange { attribute: String, range: TypeId },
}

#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    types: Vec<EntityType>,
    types_by_id: AHashMap<TypeId, usize>,
    references_by_range: AHashMap<TypeId, Vec<ReferenceAttribute>>,
}

impl SchemaIndex {
    pub fn new(types: Vec<EntityType>) -> Result<Self, SchemaError> {
        let mut types_by_id = AHashMap::with_capacity(types.len());
        let mut references_by_range: AHashMap<TypeId, Vec<ReferenceAttribute>> = AHashMap::new();

        for (pos, ty) in types.iter().enumerate() {
            if types_by_id.insert(ty.id.clone(), pos).is_some() {
                return Err(SchemaError::DuplicateType(ty.id.clone()));
            }

            for a in &ty.text_attributes {
                if a.domain != ty.id {
                    return Err(SchemaError::ForeignAttribute {
                        declared_on: ty.id.clone(),
                        attribute: a.id.clone(),
                        domain: a.domain.clone(),
                    });
                }
            }

            for a in &ty.reference_attributes {
                if a.domain != ty.id {
                    return Err(SchemaError::ForeignAttribute {
                        declared_on: ty.id.clone(),
                        attribute: a.id.clone(),
                        domain: a.domain.clone(),
                    });
                }
                references_by_range
                    .entry(a.range.clone())
                    .or_default()
                    .push(a.clone());
            }
        }

        let index = Self {
            types,
            types_by_id,
            references_by_range,
        };

        for ty in &index.types {
            for a in &ty.reference_attributes {
                if !index.contains(&a.range) {
                    tracing::debug!(
                        attribute = %a.identifier(),
                        range = %a.range,
                        "reference range is not part of the schema snapshot"
                    );
                }
            }
        }

        Ok(index)
    }

    /// Fails on the first reference attribute whose range is not a known type.
    pub fn validate_strict(&self) -> Result<(), SchemaError> {
        let dangling = self
            .types
            .iter()
            .flat_map(|ty| &ty.reference_attributes)
            .find(|a| !self.contains(&a.range));
        match dangling {
            Some(a) => Err(SchemaError::DanglingRange {
                attribute: a.identifier().to_string(),
                range: a.range.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Snapshot the provider's current type list.
    pub fn from_provider(provider: &dyn SchemaProvider) -> anyhow::Result<Self> {
        let types = provider.list_types()?;
        Ok(Self::new(types)?)
    }

    pub fn get(&self, id: &TypeId) -> Option<&EntityType> {
        self.types_by_id.get(id).map(|&pos| &self.types[pos])
    }

    pub fn contains(&self, id: &TypeId) -> bool {
        self.types_by_id.contains_key(id)
    }

    /// All types in declaration order.
    pub fn types(&self) -> &[EntityType] {
        &self.types
    }

    /// Reference attributes (declared anywhere in the snapshot) whose range is `range`.
    pub fn referrers_of(&self, range: &TypeId) -> &[ReferenceAttribute] {
        self.references_by_range
            .get(range)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
