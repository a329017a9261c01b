//! # termql-spec
//!
//! Boolean specifications over typed entities.
//!
//! A [`Specification`] is an immutable tree of `And`/`Or`/`Not`/constants over
//! [`Leaf`] predicates. The same tree can be
//! - tested in memory ([`Specification::test`]),
//! - compiled to a parameterized WHERE-clause ([`Specification::to_sql`]),
//! - compiled to an inverted-index boolean query ([`Specification::to_index_query`]),
//! - rewritten into CNF/DNF ([`normal_form`]) or simplified ([`simplify()`]).
//!
//! The [`node`] module provides the concrete leaves used for stored nodes and
//! [`parser`] a small textual language producing them.

pub mod index;
pub mod node;
pub mod normal_form;
pub mod parser;
pub mod simplify;
pub mod spec;
pub mod sql;

pub use index::{BooleanClause, IndexQuery, Occur};
pub use node::{
    index_document, relational_row, resolve_reference_paths, tokenize, NodeLeaf, NodeSpecification,
};
pub use normal_form::{to_cnf, to_cnf_bounded, to_dnf, to_dnf_bounded, Cnf, Dnf, NormalFormError};
pub use parser::{parse_node_query, QueryParseError};
pub use simplify::simplify;
pub use spec::{Backend, CompileError, Leaf, Specification};
pub use sql::{SqlQuery, SqlValue};
