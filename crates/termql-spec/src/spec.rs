//! The specification algebra.
//!
//! A [`Specification`] is an immutable boolean tree over leaf predicates. It
//! can always be evaluated in memory via [`Specification::test`], and it can be
//! compiled to a backend when every leaf in the tree supports that backend.
//!
//! Two policies here are easy to get wrong:
//! - an empty `And` matches nothing (it is *not* the neutral element),
//! - an empty `Or` matches nothing.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::index::IndexQuery;
use crate::sql::SqlQuery;

/// Compilation targets a leaf may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Relational,
    Index,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Relational => write!(f, "relational"),
            Backend::Index => write!(f, "index"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("predicate `{leaf}` cannot be compiled for the {backend} backend")]
    Unsupported { backend: Backend, leaf: String },
}

/// A leaf predicate over `(Key, Value)` pairs.
///
/// `to_sql` / `to_index_query` return `None` when the leaf has no form for that
/// backend. Whatever a leaf compiles to must select exactly the pairs for which
/// `test` returns true.
pub trait Leaf: fmt::Display {
    type Key;
    type Value;

    fn test(&self, key: &Self::Key, value: &Self::Value) -> bool;

    fn to_sql(&self) -> Option<SqlQuery> {
        None
    }

    fn to_index_query(&self) -> Option<IndexQuery> {
        None
    }

    fn supports(&self, backend: Backend) -> bool {
        match backend {
            Backend::Relational => self.to_sql().is_some(),
            Backend::Index => self.to_index_query().is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specification<L> {
    MatchAll,
    MatchNone,
    Leaf(L),
    Not(Box<Specification<L>>),
    And(Vec<Specification<L>>),
    Or(Vec<Specification<L>>),
}

impl<L> Specification<L> {
    pub fn leaf(leaf: L) -> Self {
        Specification::Leaf(leaf)
    }

    pub fn and(clauses: impl IntoIterator<Item = Specification<L>>) -> Self {
        Specification::And(clauses.into_iter().collect())
    }

    pub fn or(clauses: impl IntoIterator<Item = Specification<L>>) -> Self {
        Specification::Or(clauses.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(spec: Specification<L>) -> Self {
        Specification::Not(Box::new(spec))
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Specification::MatchAll | Specification::MatchNone | Specification::Leaf(_) => 1,
            Specification::Not(inner) => 1 + inner.size(),
            Specification::And(xs) | Specification::Or(xs) => {
                1 + xs.iter().map(Specification::size).sum::<usize>()
            }
        }
    }

    /// Leaves in left-to-right order.
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a L>) {
        match self {
            Specification::Leaf(l) => out.push(l),
            Specification::Not(inner) => inner.collect_leaves(out),
            Specification::And(xs) | Specification::Or(xs) => {
                for x in xs {
                    x.collect_leaves(out);
                }
            }
            Specification::MatchAll | Specification::MatchNone => {}
        }
    }
}

impl<L: Leaf> Specification<L> {
    pub fn test(&self, key: &L::Key, value: &L::Value) -> bool {
        match self {
            Specification::MatchAll => true,
            Specification::MatchNone => false,
            Specification::Leaf(l) => l.test(key, value),
            Specification::Not(inner) => !inner.test(key, value),
            // `all` over an empty list would be true; an empty And rejects.
            Specification::And(xs) => !xs.is_empty() && xs.iter().all(|x| x.test(key, value)),
            Specification::Or(xs) => xs.iter().any(|x| x.test(key, value)),
        }
    }

    /// A tree supports a backend only if every leaf in it does.
    pub fn supports(&self, backend: Backend) -> bool {
        self.first_unsupported(backend).is_none()
    }

    pub(crate) fn first_unsupported(&self, backend: Backend) -> Option<&L> {
        match self {
            Specification::MatchAll | Specification::MatchNone => None,
            Specification::Leaf(l) => (!l.supports(backend)).then_some(l),
            Specification::Not(inner) => inner.first_unsupported(backend),
            Specification::And(xs) | Specification::Or(xs) => {
                xs.iter().find_map(|x| x.first_unsupported(backend))
            }
        }
    }

    pub(crate) fn unsupported(leaf: &L, backend: Backend) -> CompileError {
        CompileError::Unsupported {
            backend,
            leaf: leaf.to_string(),
        }
    }
}

impl<L: fmt::Display> fmt::Display for Specification<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specification::MatchAll => write!(f, "⊤"),
            Specification::MatchNone => write!(f, "⊥"),
            Specification::Leaf(l) => write!(f, "{l}"),
            Specification::Not(inner) => write!(f, "¬{inner}"),
            Specification::And(xs) => write_joined(f, xs, " ∧ ", "(∧)"),
            Specification::Or(xs) => write_joined(f, xs, " ∨ ", "(∨)"),
        }
    }
}

fn write_joined<L: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    xs: &[Specification<L>],
    sep: &str,
    empty: &str,
) -> fmt::Result {
    if xs.is_empty() {
        return write!(f, "{empty}");
    }
    write!(f, "(")?;
    for (i, x) in xs.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{x}")?;
    }
    write!(f, ")")
}
