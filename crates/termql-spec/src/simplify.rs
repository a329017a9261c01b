//! Semantics-preserving simplification.

use crate::spec::Specification;

/// Simplify `spec` without changing what it matches.
///
/// Rewrites applied bottom-up:
/// - nested composites of the same kind are flattened,
/// - repeated clauses are dropped (first occurrence wins),
/// - `⊥` absorbs an `And` and `⊤` absorbs an `Or`, the neutral constant is dropped,
/// - empty composites become `⊥`, singletons collapse to their clause,
/// - `Not` is pushed through composites and double negation removed.
pub fn simplify<L: Clone + PartialEq>(spec: &Specification<L>) -> Specification<L> {
    match spec {
        Specification::MatchAll | Specification::MatchNone | Specification::Leaf(_) => spec.clone(),
        Specification::Not(inner) => negate(simplify(inner)),
        Specification::And(xs) => simplify_composite(xs, Kind::And),
        Specification::Or(xs) => simplify_composite(xs, Kind::Or),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    And,
    Or,
}

impl Kind {
    fn absorbing<L>(self) -> Specification<L> {
        match self {
            Kind::And => Specification::MatchNone,
            Kind::Or => Specification::MatchAll,
        }
    }

    fn neutral<L>(self) -> Specification<L> {
        match self {
            Kind::And => Specification::MatchAll,
            Kind::Or => Specification::MatchNone,
        }
    }

    fn build<L>(self, clauses: Vec<Specification<L>>) -> Specification<L> {
        match self {
            Kind::And => Specification::And(clauses),
            Kind::Or => Specification::Or(clauses),
        }
    }
}

fn simplify_composite<L: Clone + PartialEq>(xs: &[Specification<L>], kind: Kind) -> Specification<L> {
    if xs.is_empty() {
        return Specification::MatchNone;
    }

    let absorbing = kind.absorbing();
    let neutral = kind.neutral();
    let mut clauses: Vec<Specification<L>> = Vec::with_capacity(xs.len());
    let mut saw_neutral = false;

    for x in xs {
        let simplified = simplify(x);
        let flattened = match (kind, simplified) {
            (Kind::And, Specification::And(inner)) | (Kind::Or, Specification::Or(inner)) => inner,
            (_, other) => vec![other],
        };
        for c in flattened {
            if c == absorbing {
                return absorbing;
            }
            if c == neutral {
                saw_neutral = true;
                continue;
            }
            if !clauses.contains(&c) {
                clauses.push(c);
            }
        }
    }

    match clauses.len() {
        // Only neutral constants were present.
        0 if saw_neutral => neutral,
        0 => Specification::MatchNone,
        1 => clauses.pop().unwrap_or(Specification::MatchNone),
        _ => kind.build(clauses),
    }
}

/// Negate an already simplified tree.
fn negate<L: Clone + PartialEq>(spec: Specification<L>) -> Specification<L> {
    match spec {
        Specification::MatchAll => Specification::MatchNone,
        Specification::MatchNone => Specification::MatchAll,
        Specification::Not(inner) => *inner,
        Specification::And(xs) => simplify_composite(
            &xs.into_iter().map(negate).collect::<Vec<_>>(),
            Kind::Or,
        ),
        Specification::Or(xs) => simplify_composite(
            &xs.into_iter().map(negate).collect::<Vec<_>>(),
            Kind::And,
        ),
        leaf @ Specification::Leaf(_) => Specification::not(leaf),
    }
}
