//! Error and result types for the compiler crate.

use querygraph_api::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no label provider registered for label `{0}`")]
    UnknownLabel(String),

    #[error("no constraint attribute configured for label `{0}`")]
    MissingConstraintAttribute(String),

    #[error("value selected on node `{node}` has no `{attribute}` attribute")]
    MissingValueAttribute { node: String, attribute: String },

    #[error("invalid query graph: {0}")]
    InvalidGraph(String),

    #[error("node {0} is not part of the graph")]
    UnknownNode(NodeId),

    #[error("node `{0}` cannot be the target of this query")]
    InvalidTarget(String),

    #[error("parameter `{0}` bound twice with different values")]
    ParameterCollision(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
