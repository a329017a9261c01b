//! Depth map handed to node loaders.
//!
//! A [`SelectionPlan`] answers "which attributes of this type are needed, and
//! how deep do we follow them" without walking the qualified token list
//! again. Maps are ordered so plans serialize deterministically.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use termql_schema::TypeId;

use crate::qualified::QualifiedSelect;
use crate::select::DEFAULT_DEPTH;

/// `type -> attribute id -> depth`
pub type DepthMap = BTreeMap<TypeId, BTreeMap<String, u32>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPlan {
    pub all: bool,
    pub id: bool,
    #[serde(rename = "type")]
    pub type_: bool,
    pub fields: BTreeSet<String>,
    pub properties: DepthMap,
    pub references: DepthMap,
    /// Keyed by the referenced (range) type.
    pub referrers: DepthMap,
}

impl SelectionPlan {
    pub fn from_qualified(selects: &[QualifiedSelect]) -> Self {
        let mut plan = Self::default();
        for s in selects {
            match s {
                QualifiedSelect::All => plan.all = true,
                QualifiedSelect::Id => plan.id = true,
                QualifiedSelect::Type => plan.type_ = true,
                QualifiedSelect::Field { name } => {
                    plan.fields.insert(name.clone());
                }
                QualifiedSelect::Property { attribute } => {
                    raise(&mut plan.properties, &attribute.domain, &attribute.id, DEFAULT_DEPTH)
                }
                QualifiedSelect::Reference { attribute, depth } => {
                    raise(&mut plan.references, &attribute.domain, &attribute.id, *depth)
                }
                QualifiedSelect::Referrer { attribute, depth } => {
                    raise(&mut plan.referrers, &attribute.domain, &attribute.id, *depth)
                }
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn property_depth(&self, ty: &TypeId, attr: &str) -> Option<u32> {
        lookup(&self.properties, ty, attr)
    }

    pub fn reference_depth(&self, ty: &TypeId, attr: &str) -> Option<u32> {
        lookup(&self.references, ty, attr)
    }

    pub fn referrer_depth(&self, range: &TypeId, attr: &str) -> Option<u32> {
        lookup(&self.referrers, range, attr)
    }

    /// Deepest traversal anywhere in the plan; 0 when nothing is traversed.
    pub fn max_depth(&self) -> u32 {
        self.references
            .values()
            .chain(self.referrers.values())
            .flat_map(|m| m.values().copied())
            .max()
            .unwrap_or(0)
    }
}

fn raise(map: &mut DepthMap, ty: &TypeId, attr: &str, depth: u32) {
    let slot = map
        .entry(ty.clone())
        .or_default()
        .entry(attr.to_string())
        .or_insert(depth);
    *slot = (*slot).max(depth);
}

fn lookup(map: &DepthMap, ty: &TypeId, attr: &str) -> Option<u32> {
    map.get(ty).and_then(|m| m.get(attr)).copied()
}
