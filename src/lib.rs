//! # Reqflow
//!
//! Reqflow is a graph-based API testing engine written in Rust.
//! Tests are built as a directed acyclic graph of typed nodes whose output
//! ports are wired into the input ports of downstream nodes.
//!
//! ## Core Features
//!
//! - **Acyclic by construction**: connections that would close a cycle are rejected without touching the graph
//! - **Deterministic ordering**: independent nodes always run in the same order (ascending id)
//! - **Fail-fast execution**: a run stops at the first failing node and reports the prefix of results
//! - **Pluggable nodes**: anything implementing [`Node`] can be wired into a graph
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use reqflow::{Connection, Context, Executor, Graph, NodeRegistry};
//!
//! let registry = NodeRegistry::default();
//! let graph = Arc::new(Graph::new());
//! graph.add_node(registry.create("env", "n1")?);
//! graph.add_node(registry.create("transform", "n2")?);
//! graph.set_input_value("n2", "operation", "to_string".into())?;
//! graph.add_connection(Connection::new("c1", "n1", "variables", "n2", "input"))?;
//!
//! let executor = Executor::new(graph);
//! let report = executor.execute_graph(&Context::new()).await?;
//! ```

mod common;
mod config;
mod error;
mod graph;
mod model;
mod nodes;
mod runtime;
mod utils;

pub use common::Vars;
pub use config::{Config, ExecutorConfig, LogConfig};
pub use error::ReqflowError;
pub use graph::{Connection, ConnectionId, Graph, Input, Node, NodeBase, NodeId, Output, PortType, Position};
pub use model::*;
pub use nodes::{ConditionalNode, EnvNode, NodeConstructor, NodeRegistry, NodeType, RequestNode, TransformNode, VariableNode};
pub use runtime::{Context, ExecutionReport, ExecutionResult, Executor};

/// Result type alias for Reqflow operations.
pub type Result<T> = std::result::Result<T, ReqflowError>;
