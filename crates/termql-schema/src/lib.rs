//! termql schema graph
//!
//! This crate defines the read-only inputs of the query resolution engine:
//!
//! - the **schema graph**: entity types identified by `(graph, local id)`, each
//!   carrying ordered text attributes and reference attributes (reference
//!   attributes point at a `range` type, possibly in another graph),
//! - an immutable [`SchemaIndex`] built once per schema snapshot (types by id,
//!   reference attributes grouped by range),
//! - the [`SchemaProvider`] seam through which callers hand a snapshot in,
//! - the **node model** (`NodeId`, `Node`) that leaf predicates test against.
//!
//! Nothing in here mutates a schema after it has been indexed.

pub mod ids;
pub mod index;
pub mod node;
pub mod provider;
pub mod types;

pub use ids::{ReferenceAttributeId, TextAttributeId, TypeId, TypeIdParseError};
pub use index::{SchemaError, SchemaIndex};
pub use node::{LangValue, Node, NodeId};
pub use provider::{SchemaProvider, StaticSchema};
pub use types::{EntityType, EntityTypeBuilder, ReferenceAttribute, TextAttribute};
