//! Port-to-port connections between nodes.

use serde::{Deserialize, Serialize};

use crate::{graph::node::NodeId, utils};

/// Unique identifier for a connection within a graph.
pub type ConnectionId = String;

/// Directed edge from an output port of one node to an input port of another.
///
/// The target port receives the value the source port produced the last time
/// the source node executed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Unique connection identifier.
    pub id: ConnectionId,
    /// ID of the node producing the value.
    pub source_node: NodeId,
    /// Output port on the source node.
    pub source_port: String,
    /// ID of the node receiving the value.
    pub target_node: NodeId,
    /// Input port on the target node.
    pub target_port: String,
}

impl Connection {
    pub fn new(
        id: &str,
        source_node: &str,
        source_port: &str,
        target_node: &str,
        target_port: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            source_node: source_node.to_string(),
            source_port: source_port.to_string(),
            target_node: target_node.to_string(),
            target_port: target_port.to_string(),
        }
    }

    /// Creates a connection with a generated id.
    pub fn link(
        source_node: &str,
        source_port: &str,
        target_node: &str,
        target_port: &str,
    ) -> Self {
        Self::new(&utils::longid(), source_node, source_port, target_node, target_port)
    }

    /// Whether either endpoint is the given node.
    pub fn touches(
        &self,
        nid: &str,
    ) -> bool {
        self.source_node == nid || self.target_node == nid
    }
}
