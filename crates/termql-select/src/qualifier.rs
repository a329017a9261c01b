//! Select qualification: resolving unqualified selects against the schema.
//!
//! Given a domain scope (the types of the nodes being returned) and a list of
//! selects, the qualifier produces one [`QualifiedSelect`] per matching
//! `(type, attribute)` pair. Two modes are supported:
//!
//! - [`QualifierMode::Transitive`]: the scope is first closed under the named
//!   reference (forward, to ranges) and referrer (backward, to domains)
//!   selects, then every select is qualified against every type in the
//!   closed scope.
//! - [`QualifierMode::DepthBounded`]: qualification proceeds layer by layer.
//!   Layer 1 is the domain scope; the next layer holds the types reached by
//!   the selects matched on the current one. Named reference/referrer selects
//!   stay active while their depth allows, `references.*`/`referrers.*` only
//!   apply on layer 1, and property selects apply on every layer.
//!
//! Both modes terminate: the schema has finitely many types, the transitive
//! closure visits each type once, and in the layered mode only property
//! selects survive past the largest requested depth, which discover no types.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use termql_schema::{EntityType, ReferenceAttribute, ReferenceAttributeId, SchemaIndex, TypeId};

use crate::qualified::QualifiedSelect;
use crate::select::{Qualifier, Select, DEFAULT_DEPTH};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifierMode {
    #[default]
    Transitive,
    DepthBounded,
}

impl fmt::Display for QualifierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualifierMode::Transitive => write!(f, "transitive"),
            QualifierMode::DepthBounded => write!(f, "depth_bounded"),
        }
    }
}

impl FromStr for QualifierMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transitive" => Ok(QualifierMode::Transitive),
            "depth_bounded" | "depth-bounded" => Ok(QualifierMode::DepthBounded),
            other => Err(format!(
                "unknown qualifier mode `{other}` (expected `transitive` or `depth_bounded`)"
            )),
        }
    }
}

/// Resolves selects against one schema snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SelectQualifier<'s> {
    schema: &'s SchemaIndex,
    mode: QualifierMode,
}

impl<'s> SelectQualifier<'s> {
    pub fn new(schema: &'s SchemaIndex) -> Self {
        Self {
            schema,
            mode: QualifierMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: QualifierMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> QualifierMode {
        self.mode
    }

    /// Qualify `selects` for nodes of the `domain` types.
    ///
    /// `*` is expanded to all properties, references and referrers and also
    /// kept; `id`, `type` and plain fields pass through unqualified. The
    /// result is de-duplicated and lists qualified selects first, in
    /// discovery order.
    pub fn qualify(&self, domain: &[TypeId], selects: &[Select]) -> Vec<QualifiedSelect> {
        let mut scoped: Vec<Select> = Vec::new();
        let mut passthrough: Vec<QualifiedSelect> = Vec::new();
        for s in expand_all(selects) {
            match s {
                Select::All => passthrough.push(QualifiedSelect::All),
                Select::Id => passthrough.push(QualifiedSelect::Id),
                Select::Type => passthrough.push(QualifiedSelect::Type),
                Select::Field { name } => passthrough.push(QualifiedSelect::Field { name }),
                other => scoped.push(other),
            }
        }

        let roots = self.known_types(domain);
        let mut out = Dedup::default();
        match self.mode {
            QualifierMode::Transitive => {
                let scope = self.closure(&roots, &scoped);
                let mut hits = vec![0usize; scoped.len()];
                for (i, s) in scoped.iter().enumerate() {
                    hits[i] += self.qualify_on(&scope, s, &mut out);
                }
                self.log_misses(&scoped, &hits);
            }
            QualifierMode::DepthBounded => self.qualify_layered(roots, scoped, &mut out),
        }
        for p in passthrough {
            out.push(p);
        }
        out.items
    }

    /// The domain scope closed under the named reference and referrer
    /// selects, in discovery order (domain types first).
    pub fn reachable_types(&self, domain: &[TypeId], selects: &[Select]) -> Vec<TypeId> {
        self.closure(&self.known_types(domain), selects)
            .into_iter()
            .map(|t| t.id.clone())
            .collect()
    }

    fn known_types(&self, domain: &[TypeId]) -> Vec<&'s EntityType> {
        let mut seen = AHashSet::new();
        domain
            .iter()
            .filter_map(|id| {
                let ty = self.schema.get(id);
                if ty.is_none() {
                    tracing::debug!(type_id = %id, "domain type is not part of the schema snapshot");
                }
                ty
            })
            .filter(|&t| seen.insert(&t.id))
            .collect()
    }

    // =========================================================================
    // Transitive mode
    // =========================================================================

    /// Worklist fixpoint: each type is expanded once, and every expansion
    /// only adds types that are not yet in scope.
    fn closure(&self, roots: &[&'s EntityType], selects: &[Select]) -> Vec<&'s EntityType> {
        let mut scope: Vec<&'s EntityType> = Vec::new();
        let mut in_scope: AHashSet<&'s TypeId> = AHashSet::new();
        for &t in roots {
            if in_scope.insert(&t.id) {
                scope.push(t);
            }
        }

        let mut next = 0;
        while next < scope.len() {
            let ty = scope[next];
            next += 1;
            for s in selects {
                for target in self.step(ty, s, true) {
                    match self.schema.get(target) {
                        Some(t) => {
                            if in_scope.insert(&t.id) {
                                scope.push(t);
                            }
                        }
                        None => tracing::debug!(
                            type_id = %target,
                            select = %s,
                            "reached type is not part of the schema snapshot"
                        ),
                    }
                }
            }
        }
        scope
    }

    /// Types one edge away from `ty` along the attributes `select` names.
    /// With `named_only`, the `*` forms of references and referrers do not
    /// traverse.
    fn step(&self, ty: &'s EntityType, select: &Select, named_only: bool) -> Vec<&'s TypeId> {
        match select {
            Select::Reference {
                qualifier, name, ..
            } => outgoing(ty, qualifier, Some(name))
                .map(|a| &a.range)
                .collect(),
            Select::AllReferences { qualifier } if !named_only => outgoing(ty, qualifier, None)
                .map(|a| &a.range)
                .collect(),
            Select::Referrer {
                qualifier, name, ..
            } => incoming(self.schema, ty, qualifier, Some(name))
                .map(|a| &a.domain)
                .collect(),
            Select::AllReferrers { qualifier } if !named_only => {
                incoming(self.schema, ty, qualifier, None)
                    .map(|a| &a.domain)
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    // =========================================================================
    // Depth-bounded mode
    // =========================================================================

    fn qualify_layered(
        &self,
        mut types: Vec<&'s EntityType>,
        mut selects: Vec<Select>,
        out: &mut Dedup,
    ) {
        let mut hits: Vec<(Select, usize)> = selects.iter().map(|s| (s.clone(), 0)).collect();
        let mut depth = DEFAULT_DEPTH;

        while !types.is_empty() && !selects.is_empty() {
            for s in &selects {
                let n = self.qualify_on(&types, s, out);
                if let Some(pos) = hits.iter().position(|(h, _)| h == s) {
                    hits[pos].1 += n;
                }
            }

            let mut next_types: Vec<&'s EntityType> = Vec::new();
            let mut seen: AHashSet<&'s TypeId> = AHashSet::new();
            for &ty in &types {
                for s in &selects {
                    for target in self.step(ty, s, false) {
                        if let Some(t) = self.schema.get(target) {
                            if seen.insert(&t.id) {
                                next_types.push(t);
                            }
                        }
                    }
                }
            }

            selects.retain(|s| survives_layer(s, depth));
            types = next_types;
            depth += 1;
        }

        let (selects, counts): (Vec<Select>, Vec<usize>) = hits.into_iter().unzip();
        self.log_misses(&selects, &counts);
    }

    // =========================================================================
    // Shared
    // =========================================================================

    /// Emit `select` qualified against each of `types`; returns how many
    /// qualified selects it produced (before de-duplication).
    fn qualify_on(&self, types: &[&'s EntityType], select: &Select, out: &mut Dedup) -> usize {
        let mut produced = 0;
        let mut emit = |q: QualifiedSelect| {
            produced += 1;
            out.push(q);
        };
        for &ty in types {
            match select {
                Select::AllProperties { qualifier } | Select::Property { qualifier, .. }
                    if qualifier.matches(&ty.id) =>
                {
                    let name = match select {
                        Select::Property { name, .. } => Some(name),
                        _ => None,
                    };
                    for a in &ty.text_attributes {
                        if name.map_or(true, |n| *n == a.id) {
                            emit(QualifiedSelect::property(a.identifier()));
                        }
                    }
                }
                Select::AllReferences { qualifier } => {
                    for a in outgoing(ty, qualifier, None) {
                        emit(QualifiedSelect::reference(a.identifier(), DEFAULT_DEPTH));
                    }
                }
                Select::Reference {
                    qualifier,
                    name,
                    depth,
                } => {
                    for a in outgoing(ty, qualifier, Some(name)) {
                        emit(QualifiedSelect::reference(a.identifier(), *depth));
                    }
                }
                Select::AllReferrers { qualifier } => {
                    for a in incoming(self.schema, ty, qualifier, None) {
                        emit(QualifiedSelect::referrer(referrer_id(a), DEFAULT_DEPTH));
                    }
                }
                Select::Referrer {
                    qualifier,
                    name,
                    depth,
                } => {
                    for a in incoming(self.schema, ty, qualifier, Some(name)) {
                        emit(QualifiedSelect::referrer(referrer_id(a), *depth));
                    }
                }
                _ => {}
            }
        }
        produced
    }

    fn log_misses(&self, selects: &[Select], hits: &[usize]) {
        for (s, n) in selects.iter().zip(hits) {
            if *n == 0 {
                tracing::debug!(select = %s, mode = %self.mode, "select matched no attribute in scope");
            }
        }
    }
}

/// Reference attributes declared on `ty` matching the qualifier (against the
/// domain) and, if given, the local id.
fn outgoing<'a, 's: 'a>(
    ty: &'s EntityType,
    qualifier: &'a Qualifier,
    name: Option<&'a String>,
) -> impl Iterator<Item = &'s ReferenceAttribute> + 'a {
    ty.reference_attributes
        .iter()
        .filter(move |a| qualifier.matches(&a.domain) && name.map_or(true, |n| *n == a.id))
}

/// Reference attributes anywhere in the schema that point at `ty`. The
/// qualifier is matched against the range, i.e. `ty` itself.
fn incoming<'a, 's: 'a>(
    schema: &'s SchemaIndex,
    ty: &'s EntityType,
    qualifier: &'a Qualifier,
    name: Option<&'a String>,
) -> impl Iterator<Item = &'s ReferenceAttribute> + 'a {
    let rs: &'s [ReferenceAttribute] = if qualifier.matches(&ty.id) {
        schema.referrers_of(&ty.id)
    } else {
        &[]
    };
    rs.iter().filter(move |a| name.map_or(true, |n| *n == a.id))
}

fn referrer_id(a: &ReferenceAttribute) -> ReferenceAttributeId {
    ReferenceAttributeId::new(a.range.clone(), a.id.clone())
}

fn survives_layer(select: &Select, depth: u32) -> bool {
    match select {
        Select::AllProperties { .. } | Select::Property { .. } => true,
        Select::AllReferences { .. } | Select::AllReferrers { .. } => false,
        Select::Reference { depth: d, .. } | Select::Referrer { depth: d, .. } => *d > depth,
        Select::All | Select::Id | Select::Type | Select::Field { .. } => false,
    }
}

fn expand_all(selects: &[Select]) -> Vec<Select> {
    let mut out: Vec<Select> = Vec::with_capacity(selects.len() + 3);
    for s in selects {
        if !out.contains(s) {
            out.push(s.clone());
        }
    }
    if out.contains(&Select::All) {
        for s in [
            Select::AllProperties {
                qualifier: Qualifier::Any,
            },
            Select::AllReferences {
                qualifier: Qualifier::Any,
            },
            Select::AllReferrers {
                qualifier: Qualifier::Any,
            },
        ] {
            if !out.contains(&s) {
                out.push(s);
            }
        }
    }
    out
}

/// Insertion-ordered set.
#[derive(Default)]
struct Dedup {
    seen: AHashSet<QualifiedSelect>,
    items: Vec<QualifiedSelect>,
}

impl Dedup {
    fn push(&mut self, q: QualifiedSelect) {
        if self.seen.insert(q.clone()) {
            self.items.push(q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termql_schema::TextAttributeId;
    use uuid::Uuid;

    /// A -> B -> A cycle plus an unrelated C.
    fn cyclic() -> (SchemaIndex, TypeId, TypeId, TypeId) {
        let g = Uuid::new_v4();
        let a = TypeId::new(g, "A");
        let b = TypeId::new(g, "B");
        let c = TypeId::new(g, "C");
        let schema = SchemaIndex::new(vec![
            EntityType::builder(a.clone())
                .text_attribute("label")
                .reference_attribute("next", b.clone())
                .build(),
            EntityType::builder(b.clone())
                .text_attribute("label")
                .reference_attribute("next", a.clone())
                .build(),
            EntityType::builder(c.clone()).text_attribute("label").build(),
        ])
        .expect("schema");
        (schema, a, b, c)
    }

    #[test]
    fn closure_terminates_on_cycles() {
        let (schema, a, b, _) = cyclic();
        let q = SelectQualifier::new(&schema);
        let reached = q.reachable_types(&[a.clone()], &[Select::reference("next", 1)]);
        assert_eq!(reached, vec![a.clone(), b.clone()]);

        let out = q.qualify(&[a.clone()], &[Select::reference("next", 5), Select::property("label")]);
        assert_eq!(
            out,
            vec![
                QualifiedSelect::reference(ReferenceAttributeId::new(a.clone(), "next"), 5),
                QualifiedSelect::reference(ReferenceAttributeId::new(b.clone(), "next"), 5),
                QualifiedSelect::property(TextAttributeId::new(a, "label")),
                QualifiedSelect::property(TextAttributeId::new(b, "label")),
            ]
        );
    }

    #[test]
    fn layered_mode_terminates_on_cycles() {
        let (schema, a, b, _) = cyclic();
        let q = SelectQualifier::new(&schema).with_mode(QualifierMode::DepthBounded);
        let out = q.qualify(&[a.clone()], &[Select::reference("next", 3), Select::property("label")]);
        assert_eq!(out.len(), 4);
        assert!(out.contains(&QualifiedSelect::property(TextAttributeId::new(b, "label"))));
    }

    #[test]
    fn unknown_domain_types_yield_nothing() {
        let (schema, _, _, _) = cyclic();
        let q = SelectQualifier::new(&schema);
        let missing = TypeId::new(Uuid::new_v4(), "Missing");
        assert!(q.qualify(&[missing], &[Select::property("label")]).is_empty());
    }

    #[test]
    fn star_expands_and_passes_through() {
        let (schema, _, _, c) = cyclic();
        let q = SelectQualifier::new(&schema);
        let out = q.qualify(&[c.clone()], &[Select::All, Select::Id, Select::field("code")]);
        assert_eq!(
            out,
            vec![
                QualifiedSelect::property(TextAttributeId::new(c, "label")),
                QualifiedSelect::All,
                QualifiedSelect::Id,
                QualifiedSelect::Field {
                    name: "code".into()
                },
            ]
        );
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("transitive".parse(), Ok(QualifierMode::Transitive));
        assert_eq!("depth-bounded".parse(), Ok(QualifierMode::DepthBounded));
        assert!("bfs".parse::<QualifierMode>().is_err());
    }
}
