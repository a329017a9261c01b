//! Inverted-index compilation.
//!
//! The query model follows Lucene's boolean query:
//! - `And` becomes a boolean query with every child as a `Must` clause,
//! - `Or` becomes a boolean query with every child as a `Should` clause,
//! - `Not` becomes `Must(MatchAll) + MustNot(child)`,
//! - `MatchNone` becomes a boolean query with no clauses.
//!
//! An empty boolean query matches no documents; executors must honor that.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::spec::{Backend, CompileError, Leaf, Specification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BooleanClause {
    pub occur: Occur,
    pub query: IndexQuery,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexQuery {
    MatchAll,
    Term {
        field: String,
        value: String,
    },
    Prefix {
        field: String,
        prefix: String,
    },
    /// Inclusive range over the field's terms; a missing bound is open.
    Range {
        field: String,
        lower: Option<String>,
        upper: Option<String>,
    },
    /// Documents having any term in the field.
    Exists {
        field: String,
    },
    Boolean {
        clauses: Vec<BooleanClause>,
    },
}

impl IndexQuery {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        IndexQuery::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        IndexQuery::Prefix {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    pub fn range(field: impl Into<String>, lower: Option<String>, upper: Option<String>) -> Self {
        IndexQuery::Range {
            field: field.into(),
            lower,
            upper,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        IndexQuery::Exists {
            field: field.into(),
        }
    }

    pub fn boolean(clauses: Vec<BooleanClause>) -> Self {
        IndexQuery::Boolean { clauses }
    }

    /// The always-empty query.
    pub fn empty() -> Self {
        IndexQuery::Boolean {
            clauses: Vec::new(),
        }
    }

    pub fn all_of(queries: impl IntoIterator<Item = IndexQuery>) -> Self {
        Self::with_occur(Occur::Must, queries)
    }

    pub fn any_of(queries: impl IntoIterator<Item = IndexQuery>) -> Self {
        Self::with_occur(Occur::Should, queries)
    }

    pub fn negate(query: IndexQuery) -> Self {
        IndexQuery::boolean(vec![
            BooleanClause {
                occur: Occur::Must,
                query: IndexQuery::MatchAll,
            },
            BooleanClause {
                occur: Occur::MustNot,
                query,
            },
        ])
    }

    fn with_occur(occur: Occur, queries: impl IntoIterator<Item = IndexQuery>) -> Self {
        IndexQuery::boolean(
            queries
                .into_iter()
                .map(|query| BooleanClause { occur, query })
                .collect(),
        )
    }
}

/// Lucene query-parser syntax, for diagnostics.
impl fmt::Display for IndexQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexQuery::MatchAll => write!(f, "*:*"),
            IndexQuery::Term { field, value } => write!(f, "{field}:{}", quote(value)),
            IndexQuery::Prefix { field, prefix } => write!(f, "{field}:{}*", quote(prefix)),
            IndexQuery::Range {
                field,
                lower,
                upper,
            } => write!(
                f,
                "{field}:[{} TO {}]",
                lower.as_deref().map(quote).unwrap_or_else(|| "*".into()),
                upper.as_deref().map(quote).unwrap_or_else(|| "*".into())
            ),
            IndexQuery::Exists { field } => write!(f, "{field}:*"),
            IndexQuery::Boolean { clauses } => {
                write!(f, "(")?;
                for (i, c) in clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match c.occur {
                        Occur::Must => write!(f, "+{}", c.query)?,
                        Occur::Should => write!(f, "{}", c.query)?,
                        Occur::MustNot => write!(f, "-{}", c.query)?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}

fn quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        s.to_string()
    } else {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

impl<L: Leaf> Specification<L> {
    /// Compile to an inverted-index boolean query.
    pub fn to_index_query(&self) -> Result<IndexQuery, CompileError> {
        if let Some(leaf) = self.first_unsupported(Backend::Index) {
            return Err(Self::unsupported(leaf, Backend::Index));
        }
        self.build_index_query()
    }

    fn build_index_query(&self) -> Result<IndexQuery, CompileError> {
        Ok(match self {
            Specification::MatchAll => IndexQuery::MatchAll,
            Specification::MatchNone => IndexQuery::empty(),
            Specification::Leaf(l) => l
                .to_index_query()
                .ok_or_else(|| Self::unsupported(l, Backend::Index))?,
            Specification::Not(inner) => IndexQuery::negate(inner.build_index_query()?),
            Specification::And(xs) => IndexQuery::all_of(
                xs.iter()
                    .map(Specification::build_index_query)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Specification::Or(xs) => IndexQuery::any_of(
                xs.iter()
                    .map(Specification::build_index_query)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        })
    }
}
