pub mod connection;
#[allow(clippy::module_inception)]
mod graph;
#[cfg(test)]
pub(crate) mod mock;
pub mod node;

pub use connection::{Connection, ConnectionId};
pub use graph::Graph;
pub use node::{Input, Node, NodeBase, NodeId, Output, PortType, Position};
