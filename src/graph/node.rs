//! The node contract every executable unit implements.
//!
//! A node owns a [`NodeBase`] (identity, ports, configuration) and adds a single
//! effectful operation, [`Node::execute`]. The graph and the executor only ever
//! talk to `dyn Node`; concrete kinds live outside the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ReqflowError, Result, common::Vars, runtime::Context};

/// node id
pub type NodeId = String;

/// Declared type of a port. A hint for editors and humans, never enforced.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PortType {
    String,
    Int,
    Bool,
    Map,
    #[default]
    Any,
    Duration,
}

/// An input port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Input {
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: PortType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    /// Current value, used as the default when nothing is wired in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Input {
    pub fn required(
        name: &str,
        port_type: PortType,
        description: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            port_type,
            required: true,
            description: description.to_string(),
            value: None,
        }
    }

    pub fn optional(
        name: &str,
        port_type: PortType,
        description: &str,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, port_type, description)
        }
    }

    pub fn with_value<V: Into<Value>>(
        mut self,
        value: V,
    ) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// An output port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: PortType,
    #[serde(default)]
    pub description: String,
    /// Value produced by the last successful execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Output {
    pub fn new(
        name: &str,
        port_type: PortType,
        description: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            port_type,
            description: description.to_string(),
            value: None,
        }
    }
}

/// Canvas position of a node. Carried for the editor, ignored by execution.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// State shared by every node kind.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeBase {
    /// node id
    pub id: NodeId,
    /// display name
    pub name: String,
    /// ordered input ports
    pub inputs: Vec<Input>,
    /// ordered output ports
    pub outputs: Vec<Output>,
    /// opaque node configuration
    #[serde(default)]
    pub config: Vars,
    /// editor position
    #[serde(default)]
    pub position: Position,
}

impl NodeBase {
    pub fn new(
        id: &str,
        name: &str,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            inputs,
            outputs,
            config: Vars::new(),
            position: Position::default(),
        }
    }
}

#[async_trait]
#[typetag::serde(tag = "type")]
pub trait Node: Send + Sync {
    /// Shared node state.
    fn base(&self) -> &NodeBase;

    /// Mutable shared node state.
    fn base_mut(&mut self) -> &mut NodeBase;

    /// Type tag naming the behavior this node runs, e.g. `request`.
    fn node_type(&self) -> &'static str;

    /// Executes the node with fully resolved inputs.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The [`Context`] of the current run, carrying cancellation and deadline.
    /// * `inputs` - Input values keyed by port name: declared defaults overridden by upstream outputs.
    ///
    /// # Returns
    ///
    /// Returns the produced values keyed by output port name. The result must depend
    /// only on `inputs` and the node's own configuration.
    async fn execute(
        &self,
        ctx: &Context,
        inputs: Vars,
    ) -> Result<Vars>;

    /// Returns an independent copy with identical ports and configuration.
    fn clone_node(&self) -> Box<dyn Node>;

    fn id(&self) -> &str {
        &self.base().id
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn set_name(
        &mut self,
        name: &str,
    ) {
        self.base_mut().name = name.to_string();
    }

    fn inputs(&self) -> &[Input] {
        &self.base().inputs
    }

    fn outputs(&self) -> &[Output] {
        &self.base().outputs
    }

    fn input(
        &self,
        name: &str,
    ) -> Option<&Input> {
        self.inputs().iter().find(|i| i.name == name)
    }

    fn output(
        &self,
        name: &str,
    ) -> Option<&Output> {
        self.outputs().iter().find(|o| o.name == name)
    }

    fn set_input_value(
        &mut self,
        name: &str,
        value: Value,
    ) -> Result<()> {
        let input = self.base_mut().inputs.iter_mut().find(|i| i.name == name).ok_or_else(|| ReqflowError::InputNotFound(name.to_string()))?;
        input.value = Some(value);
        Ok(())
    }

    fn output_value(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.output(name).and_then(|o| o.value.as_ref())
    }

    fn set_output_value(
        &mut self,
        name: &str,
        value: Value,
    ) -> Result<()> {
        let output = self.base_mut().outputs.iter_mut().find(|o| o.name == name).ok_or_else(|| ReqflowError::OutputNotFound(name.to_string()))?;
        output.value = Some(value);
        Ok(())
    }
}

impl Clone for Box<dyn Node> {
    fn clone(&self) -> Self {
        self.clone_node()
    }
}

impl std::fmt::Debug for dyn Node {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Node").field("type", &self.node_type()).field("base", self.base()).finish()
    }
}

impl dyn Node {
    /// Serializes the node into self-describing JSON bytes tagged with its type.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restores a node previously written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(data: &[u8]) -> Result<Box<dyn Node>> {
        Ok(serde_json::from_slice(data)?)
    }
}
