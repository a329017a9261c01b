//! Conjunctive and disjunctive normal forms.
//!
//! Both transforms push `Not` down to the leaves (De Morgan, double negation)
//! and then distribute. Distribution multiplies clause counts, so output size
//! and running time are exponential in the worst case. These transforms are
//! analysis and testing tools, not part of the query hot path. Use the
//! `*_bounded` variants for anything that comes from outside the process.
//!
//! Empty composites are rewritten to constants before distribution so that
//! `¬(∧)` stays a tautology and `(∨)` stays a contradiction.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::spec::Specification;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalFormError {
    #[error("normal form would need at least {estimate} clauses (limit {limit})")]
    TooManyClauses { estimate: usize, limit: usize },
}

/// A conjunction of disjunctive clauses of literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cnf<L> {
    clauses: Vec<Vec<Specification<L>>>,
}

/// A disjunction of conjunctive terms of literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dnf<L> {
    terms: Vec<Vec<Specification<L>>>,
}

impl<L> Cnf<L> {
    pub fn clauses(&self) -> &[Vec<Specification<L>>] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `And(Or(..), Or(..), ..)`; every composite in the result is non-empty.
    pub fn into_specification(self) -> Specification<L> {
        Specification::And(self.clauses.into_iter().map(Specification::Or).collect())
    }
}

impl<L> Dnf<L> {
    pub fn terms(&self) -> &[Vec<Specification<L>>] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// `Or(And(..), And(..), ..)`; every composite in the result is non-empty.
    pub fn into_specification(self) -> Specification<L> {
        Specification::Or(self.terms.into_iter().map(Specification::And).collect())
    }
}

impl<L: Clone + fmt::Display> fmt::Display for Cnf<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().into_specification())
    }
}

impl<L: Clone + fmt::Display> fmt::Display for Dnf<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().into_specification())
    }
}

pub fn to_cnf<L: Clone>(spec: &Specification<L>) -> Cnf<L> {
    // An unlimited budget never refuses.
    match to_cnf_bounded(spec, usize::MAX) {
        Ok(cnf) => cnf,
        Err(_) => unreachable!("unbounded normal form cannot exceed its budget"),
    }
}

pub fn to_dnf<L: Clone>(spec: &Specification<L>) -> Dnf<L> {
    match to_dnf_bounded(spec, usize::MAX) {
        Ok(dnf) => dnf,
        Err(_) => unreachable!("unbounded normal form cannot exceed its budget"),
    }
}

/// CNF, refusing before any distribution step whose output would exceed
/// `max_clauses` clauses.
pub fn to_cnf_bounded<L: Clone>(
    spec: &Specification<L>,
    max_clauses: usize,
) -> Result<Cnf<L>, NormalFormError> {
    let nnf = negation_normal_form(spec, false);
    let clauses = normalize(&nnf, Shape::Cnf, max_clauses).inspect_err(|err| {
        tracing::warn!(error = %err, "refusing CNF transform");
    })?;
    Ok(Cnf { clauses })
}

pub fn to_dnf_bounded<L: Clone>(
    spec: &Specification<L>,
    max_clauses: usize,
) -> Result<Dnf<L>, NormalFormError> {
    let nnf = negation_normal_form(spec, false);
    let terms = normalize(&nnf, Shape::Dnf, max_clauses).inspect_err(|err| {
        tracing::warn!(error = %err, "refusing DNF transform");
    })?;
    Ok(Dnf { terms })
}

// =============================================================================
// Negation normal form
// =============================================================================

/// Push negations to the leaves. Empty composites become constants and
/// negated constants flip, so the result only has `Not` directly above leaves.
fn negation_normal_form<L: Clone>(spec: &Specification<L>, negated: bool) -> Specification<L> {
    match spec {
        Specification::MatchAll if negated => Specification::MatchNone,
        Specification::MatchNone if negated => Specification::MatchAll,
        Specification::MatchAll => Specification::MatchAll,
        Specification::MatchNone => Specification::MatchNone,
        Specification::Leaf(l) if negated => Specification::not(Specification::Leaf(l.clone())),
        Specification::Leaf(l) => Specification::Leaf(l.clone()),
        Specification::Not(inner) => negation_normal_form(inner, !negated),
        Specification::And(xs) | Specification::Or(xs) if xs.is_empty() => {
            if negated {
                Specification::MatchAll
            } else {
                Specification::MatchNone
            }
        }
        Specification::And(xs) => {
            let children = xs.iter().map(|x| negation_normal_form(x, negated)).collect();
            if negated {
                Specification::Or(children)
            } else {
                Specification::And(children)
            }
        }
        Specification::Or(xs) => {
            let children = xs.iter().map(|x| negation_normal_form(x, negated)).collect();
            if negated {
                Specification::And(children)
            } else {
                Specification::Or(children)
            }
        }
    }
}

// =============================================================================
// Distribution
// =============================================================================

#[derive(Clone, Copy)]
enum Shape {
    Cnf,
    Dnf,
}

/// Normalize an NNF tree into groups of literals. For CNF the outer list is a
/// conjunction of disjunctive groups; for DNF the reverse.
fn normalize<L: Clone>(
    spec: &Specification<L>,
    shape: Shape,
    max_clauses: usize,
) -> Result<Vec<Vec<Specification<L>>>, NormalFormError> {
    match (spec, shape) {
        (Specification::And(xs), Shape::Cnf) | (Specification::Or(xs), Shape::Dnf) => {
            let mut out = Vec::new();
            for x in xs {
                out.extend(normalize(x, shape, max_clauses)?);
                if out.len() > max_clauses {
                    return Err(NormalFormError::TooManyClauses {
                        estimate: out.len(),
                        limit: max_clauses,
                    });
                }
            }
            Ok(out)
        }
        (Specification::Or(xs), Shape::Cnf) | (Specification::And(xs), Shape::Dnf) => {
            let parts = xs
                .iter()
                .map(|x| normalize(x, shape, max_clauses))
                .collect::<Result<Vec<_>, _>>()?;
            distribute(parts, max_clauses)
        }
        // literal: leaf, negated leaf or constant
        (literal, _) => Ok(vec![vec![literal.clone()]]),
    }
}

/// The cartesian product of the groups: one output group per way of picking
/// one group from each part, concatenated in part order.
fn distribute<L: Clone>(
    parts: Vec<Vec<Vec<Specification<L>>>>,
    max_clauses: usize,
) -> Result<Vec<Vec<Specification<L>>>, NormalFormError> {
    let estimate = parts
        .iter()
        .fold(1usize, |acc, p| acc.saturating_mul(p.len()));
    if estimate > max_clauses {
        return Err(NormalFormError::TooManyClauses {
            estimate,
            limit: max_clauses,
        });
    }

    let mut acc: Vec<Vec<Specification<L>>> = vec![Vec::new()];
    for part in parts {
        let mut next = Vec::with_capacity(acc.len() * part.len());
        for prefix in &acc {
            for group in &part {
                let mut combined = prefix.clone();
                combined.extend(group.iter().cloned());
                next.push(combined);
            }
        }
        acc = next;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::testing::*;

    #[test]
    fn dnf_distributes_and_over_or() {
        // (1 ∨ 2) ∧ (3 ∨ 4)
        let spec = Specification::and([
            Specification::or([gt(1), gt(2)]),
            Specification::or([gt(3), gt(4)]),
        ]);
        let dnf = to_dnf(&spec);
        assert_eq!(
            dnf.to_string(),
            "((v>1 ∧ v>3) ∨ (v>1 ∧ v>4) ∨ (v>2 ∧ v>3) ∨ (v>2 ∧ v>4))"
        );
        assert_eq!(to_cnf(&spec).len(), 2);
    }

    #[test]
    fn cnf_applies_de_morgan_and_double_negation() {
        // ¬(1 ∧ ¬¬2) = ¬1 ∨ ¬2
        let spec = Specification::not(Specification::and([
            gt(1),
            Specification::not(Specification::not(gt(2))),
        ]));
        assert_eq!(to_cnf(&spec).to_string(), "((¬v>1 ∨ ¬v>2))");
        assert_eq!(to_dnf(&spec).to_string(), "((¬v>1) ∨ (¬v>2))");
    }

    #[test]
    fn empty_composites_keep_their_meaning() {
        let negated_empty: Specification<IntLeaf> = Specification::not(Specification::and([]));
        let cnf = to_cnf(&negated_empty).into_specification();
        let dnf = to_dnf(&negated_empty).into_specification();
        assert!(cnf.test(&(), &0));
        assert!(dnf.test(&(), &0));

        let nested: Specification<IntLeaf> =
            Specification::or([Specification::and([]), Specification::or([])]);
        assert!(!to_cnf(&nested).into_specification().test(&(), &0));
        assert!(!to_dnf(&nested).into_specification().test(&(), &0));
    }

    #[test]
    fn bounded_transform_refuses_blowup() {
        // (a1 ∨ b1) ∧ ... ∧ (a6 ∨ b6) has 2^6 DNF terms
        let spec = Specification::and((0..6).map(|i| Specification::or([gt(i), odd()])));
        let err = to_dnf_bounded(&spec, 32).unwrap_err();
        assert_eq!(
            err,
            NormalFormError::TooManyClauses {
                estimate: 64,
                limit: 32
            }
        );
        assert_eq!(to_dnf_bounded(&spec, 64).expect("fits").len(), 64);
        assert_eq!(to_cnf_bounded(&spec, 6).expect("already cnf").len(), 6);
    }
}
