//! Configurable node used by the unit tests of the graph and the executor.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ReqflowError, Result,
    common::Vars,
    graph::node::{Input, Node, NodeBase, Output, PortType},
    runtime::Context,
};

/// Copies input `in` to output `out` and echoes every resolved input under `seen`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MockNode {
    #[serde(flatten)]
    pub base: NodeBase,
    /// fail with this message instead of producing outputs
    #[serde(default)]
    pub fail: Option<String>,
    /// sleep this many milliseconds before answering, waking early on cancellation
    #[serde(default)]
    pub delay: u64,
}

impl MockNode {
    pub fn new(id: &str) -> Self {
        Self {
            base: NodeBase::new(
                id,
                "Mock",
                vec![Input::optional("in", PortType::Any, "passed through to out")],
                vec![Output::new("out", PortType::Any, "copy of in"), Output::new("seen", PortType::Map, "resolved inputs")],
            ),
            fail: None,
            delay: 0,
        }
    }

    pub fn with_input(
        mut self,
        input: Input,
    ) -> Self {
        self.base.inputs.push(input);
        self
    }

    pub fn with_output(
        mut self,
        name: &str,
    ) -> Self {
        self.base.outputs.push(Output::new(name, PortType::Any, ""));
        self
    }

    pub fn failing(
        mut self,
        message: &str,
    ) -> Self {
        self.fail = Some(message.to_string());
        self
    }

    pub fn delayed(
        mut self,
        millis: u64,
    ) -> Self {
        self.delay = millis;
        self
    }

    pub fn boxed(self) -> Box<dyn Node> {
        Box::new(self)
    }
}

#[async_trait]
#[typetag::serde(name = "mock")]
impl Node for MockNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &'static str {
        "mock"
    }

    async fn execute(
        &self,
        ctx: &Context,
        inputs: Vars,
    ) -> Result<Vars> {
        if self.delay > 0 {
            tokio::select! {
                _ = ctx.cancelled() => return Err(ReqflowError::Cancelled),
                _ = tokio::time::sleep(Duration::from_millis(self.delay)) => {}
            }
        }

        if let Some(message) = &self.fail {
            return Err(ReqflowError::Action(message.clone()));
        }

        let out = inputs.value("in").cloned().unwrap_or(Value::Null);
        Ok(Vars::new().with("out", out).with("seen", inputs))
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }
}
