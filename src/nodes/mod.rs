//! Built-in node kinds and the registry that creates nodes by type tag.

pub mod conditional;
pub mod env;
pub mod request;
pub mod template;
pub mod transform;
pub mod variable;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::{
    ReqflowError, Result,
    graph::Node,
    model::NodeModel,
};

pub use conditional::ConditionalNode;
pub use env::EnvNode;
pub use request::RequestNode;
pub use transform::TransformNode;
pub use variable::VariableNode;

/// Type tags of the built-in nodes.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::IntoStaticStr, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeType {
    Env,
    Request,
    Transform,
    Conditional,
    Variable,
}

impl NodeType {
    pub fn constructor(self) -> NodeConstructor {
        match self {
            NodeType::Env => |id: &str| -> Box<dyn Node> { Box::new(EnvNode::new(id)) },
            NodeType::Request => |id: &str| -> Box<dyn Node> { Box::new(RequestNode::new(id)) },
            NodeType::Transform => |id: &str| -> Box<dyn Node> { Box::new(TransformNode::new(id)) },
            NodeType::Conditional => |id: &str| -> Box<dyn Node> { Box::new(ConditionalNode::new(id)) },
            NodeType::Variable => |id: &str| -> Box<dyn Node> { Box::new(VariableNode::new(id)) },
        }
    }
}

/// Builds a fresh node of one kind with the given id.
pub type NodeConstructor = fn(&str) -> Box<dyn Node>;

/// Maps type tags to node constructors.
///
/// The graph never consults the registry; it only matters when nodes are
/// created from a tag, e.g. while loading a project.
#[derive(Clone)]
pub struct NodeRegistry {
    constructors: HashMap<String, NodeConstructor>,
}

impl Default for NodeRegistry {
    /// A registry holding every built-in node kind.
    fn default() -> Self {
        let mut registry = Self::empty();
        for node_type in NodeType::iter() {
            registry.register(node_type.as_ref(), node_type.constructor());
        }
        registry
    }
}

impl NodeRegistry {
    /// A registry without any node kind.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register (or replace) the constructor for `tag`.
    pub fn register(
        &mut self,
        tag: &str,
        constructor: NodeConstructor,
    ) {
        debug!(tag, "registering node type");
        self.constructors.insert(tag.to_string(), constructor);
    }

    pub fn contains(
        &self,
        tag: &str,
    ) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Create a node of kind `tag`.
    pub fn create(
        &self,
        tag: &str,
        id: &str,
    ) -> Result<Box<dyn Node>> {
        let constructor = self.constructors.get(tag).ok_or_else(|| ReqflowError::InvalidNodeType(tag.to_string()))?;
        Ok(constructor(id))
    }

    /// Registered tags, sorted.
    pub fn available_types(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.constructors.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Create a node from its persisted record.
    ///
    /// Name, position, configuration and input values are restored. A stored
    /// value for an input the node kind does not declare is skipped.
    pub fn create_from_model(
        &self,
        model: &NodeModel,
    ) -> Result<Box<dyn Node>> {
        let mut node = self.create(&model.node_type, &model.id)?;

        if !model.name.is_empty() {
            node.set_name(&model.name);
        }
        node.base_mut().position = model.position;
        node.base_mut().config = model.config.clone();

        for input in &model.inputs {
            let Some(value) = &input.value else {
                continue;
            };
            if let Err(err) = node.set_input_value(&input.name, value.clone()) {
                warn!(node = %model.id, input = %input.name, error = %err, "skipping stored input value");
            }
        }

        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::graph::{Input, PortType, Position};

    #[test]
    fn test_builtins() {
        let registry = NodeRegistry::default();

        assert_eq!(registry.available_types(), vec!["conditional", "env", "request", "transform", "variable"]);
        for tag in registry.available_types() {
            let node = registry.create(&tag, "n1").unwrap();
            assert_eq!(node.node_type(), tag);
            assert_eq!(node.id(), "n1");
        }
    }

    #[test]
    fn test_unknown_type() {
        let err = NodeRegistry::default().create("graphql", "n1").unwrap_err();
        assert_eq!(err, ReqflowError::InvalidNodeType("graphql".to_string()));
        assert_eq!(err.to_string(), "unknown node type: graphql");
    }

    #[test]
    fn test_register_custom() {
        let mut registry = NodeRegistry::empty();
        assert!(registry.available_types().is_empty());

        registry.register("alias", NodeType::Env.constructor());
        assert!(registry.contains("alias"));
        assert_eq!(registry.create("alias", "e1").unwrap().node_type(), "env");
    }

    #[test]
    fn test_builtin_bytes() {
        let mut node = NodeRegistry::default().create("request", "r1").unwrap();
        node.set_input_value("url", json!("http://localhost/health")).unwrap();

        let restored = <dyn Node>::from_bytes(&node.to_bytes().unwrap()).unwrap();

        assert_eq!(restored.node_type(), "request");
        assert_eq!(restored.input("url").unwrap().value, Some(json!("http://localhost/health")));
        assert_eq!(restored.outputs().len(), 4);
    }

    #[test]
    fn test_create_from_model() {
        let model = NodeModel {
            id: "r1".to_string(),
            node_type: "request".to_string(),
            name: "Login".to_string(),
            position: Position { x: 10.0, y: 20.0 },
            config: crate::Vars::new().with("color", "red"),
            inputs: vec![
                Input::required("url", PortType::String, "").with_value("http://localhost/login"),
                Input::optional("bogus", PortType::Any, "").with_value(1),
                Input::optional("body", PortType::String, ""),
            ],
            outputs: vec![],
        };

        let node = NodeRegistry::default().create_from_model(&model).unwrap();

        assert_eq!(node.name(), "Login");
        assert_eq!(node.base().position, Position { x: 10.0, y: 20.0 });
        assert_eq!(node.base().config.str("color"), Some("red"));
        assert_eq!(node.input("url").unwrap().value, Some(json!("http://localhost/login")));
        // defaults survive when the record carries no value
        assert_eq!(node.input("method").unwrap().value, Some(json!("GET")));
        assert!(node.input("bogus").is_none());
    }
}
