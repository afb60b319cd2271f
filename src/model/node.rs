use serde::{Deserialize, Serialize};

use crate::{
    common::Vars,
    graph::{Input, Node, Output, Position},
};

/// Persisted form of a node: its type tag plus the state a fresh node of that
/// type needs to be restored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeModel {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub config: Vars,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

impl From<&dyn Node> for NodeModel {
    fn from(node: &dyn Node) -> Self {
        let base = node.base();
        Self {
            id: base.id.clone(),
            node_type: node.node_type().to_string(),
            name: base.name.clone(),
            position: base.position,
            config: base.config.clone(),
            inputs: base.inputs.clone(),
            outputs: base.outputs.clone(),
        }
    }
}
