//! Storage executor seams.
//!
//! The engine compiles specifications; running them is the job of whatever
//! store sits behind these traits. Both return node keys only.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use termql_schema::NodeId;
use termql_spec::{IndexQuery, SqlQuery};

/// Runs a compiled WHERE-clause against the node table.
///
/// Implementations must bind `query.params` to the `?` placeholders in
/// textual order.
pub trait RelationalExecutor {
    fn execute(&self, query: &SqlQuery) -> Result<Vec<NodeId>>;
}

/// Runs a compiled boolean query against an inverted index.
///
/// An empty boolean query must match nothing.
pub trait IndexExecutor {
    fn search(&self, query: &IndexQuery, options: &SearchOptions) -> Result<Vec<NodeId>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default)]
    pub sort: Option<SortField>,
    /// `None` returns every hit.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn sorted_by(mut self, sort: SortField) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limited_to(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
