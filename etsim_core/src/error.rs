//! Error types for ETSIM
//!
//! Configuration and validation problems, unreadable inputs and inconsistent
//! end-of-run state are reported through [`EtsimError`]. Programming-contract
//! violations (double release, completing an unknown token) are assertions
//! and never show up here.

use crate::backend::Tick;
use crate::core::NodeId;
use thiserror::Error;

/// Result alias used throughout the crate
pub type EtsimResult<T> = Result<T, EtsimError>;

#[derive(Debug, Error)]
pub enum EtsimError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Node {node} failed validation: {reason}")]
    Validation { node: NodeId, reason: String },

    #[error("Node {node} is missing required attribute '{attribute}'")]
    MissingAttribute {
        node: NodeId,
        attribute: &'static str,
    },

    #[error("Node {node} requests collective '{kind}' which has no simulated primitive")]
    UnsupportedCollective { node: NodeId, kind: String },

    #[error("Unsupported configuration: {0}")]
    Unsupported(String),

    #[error("Tensor '{tensor}' written again by node {node}; tensors may only be written once")]
    TensorRewritten { tensor: String, node: NodeId },

    #[error("Tensor '{tensor}' size changed from {recorded} to {observed} bytes")]
    TensorSizeMismatch {
        tensor: String,
        recorded: u64,
        observed: u64,
    },

    #[error("Node {node} has a malformed tensor list: {reason}")]
    MalformedTensorList { node: NodeId, reason: String },

    #[error("Node {node} did not finish, start_time={start}")]
    UnfinishedOperator { node: NodeId, start: Tick },

    #[error("Kernel ran out of events with {remaining} node(s) still in the graph")]
    Stalled { remaining: usize },

    #[error("Unknown node id {0}")]
    UnknownNode(NodeId),

    #[error("Failed to load trace: {0}")]
    TraceLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EtsimError {
    pub fn config(msg: impl Into<String>) -> Self {
        EtsimError::Config(msg.into())
    }

    pub fn validation(node: NodeId, reason: impl Into<String>) -> Self {
        EtsimError::Validation {
            node,
            reason: reason.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        EtsimError::Internal(msg.into())
    }

    /// Whether lenient mode may downgrade this error to "skip the node".
    ///
    /// Only per-node attribute problems qualify. Tensor rewrites stay fatal
    /// in every mode.
    pub fn is_node_local(&self) -> bool {
        matches!(
            self,
            EtsimError::Validation { .. }
                | EtsimError::MissingAttribute { .. }
                | EtsimError::UnsupportedCollective { .. }
                | EtsimError::Unsupported(_)
                | EtsimError::MalformedTensorList { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_node() {
        let err = EtsimError::validation(42, "zero tensor size");
        assert_eq!(
            err.to_string(),
            "Node 42 failed validation: zero tensor size"
        );

        let err = EtsimError::MissingAttribute {
            node: 7,
            attribute: "comm_size",
        };
        assert!(err.to_string().contains("comm_size"));
    }

    #[test]
    fn test_node_local_classification() {
        assert!(EtsimError::validation(1, "x").is_node_local());
        assert!(EtsimError::UnsupportedCollective {
            node: 1,
            kind: "barrier".into()
        }
        .is_node_local());
        assert!(!EtsimError::TensorRewritten {
            tensor: "t".into(),
            node: 1
        }
        .is_node_local());
        assert!(!EtsimError::config("bad").is_node_local());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EtsimError = io.into();
        assert!(matches!(err, EtsimError::Io(_)));
    }
}
