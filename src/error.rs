//! Error types for Reqflow.
//!
//! All errors in Reqflow are represented by the `ReqflowError` enum. Structural
//! errors are raised by graph mutations, resolution and execution errors by the
//! executor.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Reqflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ReqflowError {
    /// No node with this id exists in the graph.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// The graph contains (or would contain) a cycle.
    #[error("cyclic dependency detected")]
    CyclicGraph,

    #[error("source node not found: {0}")]
    SourceNodeNotFound(String),

    #[error("target node not found: {0}")]
    TargetNodeNotFound(String),

    #[error("source port not found: {node}.{port}")]
    SourcePortNotFound {
        node: String,
        port: String,
    },

    #[error("target port not found: {node}.{port}")]
    TargetPortNotFound {
        node: String,
        port: String,
    },

    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    /// A connection with this id is already in the graph.
    #[error("connection already exists: {0}")]
    DuplicateConnection(String),

    /// Unknown input port name on a node.
    #[error("input not found: {0}")]
    InputNotFound(String),

    /// Unknown output port name on a node.
    #[error("output not found: {0}")]
    OutputNotFound(String),

    /// A required input is wired to a node that has produced nothing in this pass.
    #[error("required input {port} not available from {source_node}")]
    InputUnavailable {
        port: String,
        source_node: String,
    },

    /// A required input is wired to a node whose last run in this pass failed.
    #[error("required input {port} not available from {source_node}: upstream node failed")]
    UpstreamFailed {
        port: String,
        source_node: String,
    },

    /// The upstream node ran but did not produce the wired output port.
    #[error("required output {port} not found in {source_node}")]
    MissingOutput {
        port: String,
        source_node: String,
    },

    /// A required input has neither a connection value nor a default.
    #[error("required input {input} not provided for node {node}")]
    InputNotProvided {
        input: String,
        node: String,
    },

    /// A node failed; wraps the failure with the node id.
    #[error("execution stopped at node {node}: {source}")]
    ExecutionStopped {
        node: String,
        source: Box<ReqflowError>,
    },

    /// The run was cancelled or its deadline passed.
    #[error("execution cancelled")]
    Cancelled,

    /// Node-specific execution errors.
    #[error("{0}")]
    Action(String),

    #[error("unknown node type: {0}")]
    InvalidNodeType(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML, etc.).
    #[error("{0}")]
    Convert(String),

    /// Project file errors.
    #[error("{0}")]
    Project(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl ReqflowError {
    /// Returns the id of the node a wrapped execution failure stopped at.
    pub fn failed_node(&self) -> Option<&str> {
        match self {
            ReqflowError::ExecutionStopped { node, .. } => Some(node),
            _ => None,
        }
    }
}

impl From<ReqflowError> for String {
    fn from(val: ReqflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for ReqflowError {
    fn from(error: std::io::Error) -> Self {
        ReqflowError::IoError(error.to_string())
    }
}

impl From<ReqflowError> for std::io::Error {
    fn from(val: ReqflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for ReqflowError {
    fn from(_: FromUtf8Error) -> Self {
        ReqflowError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for ReqflowError {
    fn from(error: serde_json::Error) -> Self {
        ReqflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for ReqflowError {
    fn from(error: toml::de::Error) -> Self {
        ReqflowError::Config(error.to_string())
    }
}
