//! termql store seams and engine
//!
//! - [`RelationalExecutor`] / [`IndexExecutor`]: where compiled queries go.
//! - [`MemoryRelationalStore`] / [`MemoryIndex`]: reference executors over
//!   in-memory nodes, used to check compiled queries against `test`.
//! - [`QueryEngine`]: schema snapshot + [`EngineConfig`] + compile, qualify
//!   and find entry points.

pub mod config;
pub mod engine;
pub mod executor;
pub mod index;
pub mod relational;

pub use config::{EngineConfig, IndexConfig, NormalFormConfig, SchemaConfig, SelectConfig};
pub use engine::{QueryEngine, Selection};
pub use executor::{IndexExecutor, RelationalExecutor, SearchOptions, SortField};
pub use index::MemoryIndex;
pub use relational::MemoryRelationalStore;
