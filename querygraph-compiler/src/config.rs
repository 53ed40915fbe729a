//! Compiler-wide settings shared by every query shape.

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// `LIMIT` of result queries.
    pub result_limit: u32,
    /// `LIMIT` of node value queries.
    pub value_query_limit: u32,
    /// Encode relationship direction (`->`) in patterns; `-` otherwise.
    pub use_relation_direction: bool,
    /// Discover relations pointing into the node (from its parent side)
    /// instead of relations leaving it.
    pub use_parent_relation: bool,
    /// Collect the incoming relation ids of a node alongside its values.
    pub collect_relations_with_values: bool,
    /// Text prepended to every generated statement.
    pub prefix: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            result_limit: 100,
            value_query_limit: 100,
            use_relation_direction: true,
            use_parent_relation: false,
            collect_relations_with_values: false,
            prefix: String::new(),
        }
    }
}

impl QueryConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub(crate) fn arrow(&self) -> &'static str {
        if self.use_relation_direction { "->" } else { "-" }
    }
}
