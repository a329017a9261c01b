//! termql projections
//!
//! A projection is a comma-separated list of select tokens (`id`,
//! `props.prefLabel`, `Concept.refs.broader:2`, `referrers.*`, ...). This
//! crate parses projections into [`Select`] tokens and resolves them against a
//! schema snapshot into [`QualifiedSelect`]s bound to concrete
//! `(type, attribute)` pairs, following references forward and referrers
//! backward to extend the type scope. The result can be folded into a
//! [`SelectionPlan`] keyed by type.

pub mod parser;
pub mod plan;
pub mod qualified;
pub mod qualifier;
pub mod select;

pub use parser::{parse_selects, SelectParseError};
pub use plan::{DepthMap, SelectionPlan};
pub use qualified::QualifiedSelect;
pub use qualifier::{QualifierMode, SelectQualifier};
pub use select::{Qualifier, Select, DEFAULT_DEPTH};
