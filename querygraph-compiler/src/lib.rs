//! Compiles a visually edited query graph into parameterized Cypher.
//!
//! The graph is a tree of typed nodes hanging off a single root. Each entry
//! point of [`QueryCompiler`] prunes the graph to the links it needs, turns
//! them into MATCH/WHERE fragments and wraps those into one statement shape:
//!
//! - [`QueryCompiler::node_value_query`] lists the values a node can take,
//! - [`QueryCompiler::node_count_query`] counts them,
//! - [`QueryCompiler::node_relation_query`] discovers relations leaving a node,
//! - [`QueryCompiler::result_query`] fetches the root results,
//! - [`QueryCompiler::taxonomy_count_query`] counts all nodes of a label.
//!
//! Label metadata comes from a [`ProviderRegistry`].

pub mod assembler;
pub mod config;
pub mod constraint;
pub mod elements;
pub mod error;
pub mod graph_view;
pub mod ident;
pub mod params;
pub mod provider;
pub mod relevance;

pub use assembler::{QueryCompiler, RelationFilter, RelationRow, ResultMode};
pub use config::QueryConfig;
pub use constraint::{ConstraintElements, generate_value_constraints};
pub use error::{Error, Result};
pub use params::{CompiledQuery, Params};
pub use provider::{ConstraintGenerator, LabelProvider, ProviderRegistry, QueryFilter};
pub use querygraph_api as api;
