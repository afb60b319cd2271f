use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ReqflowError, Result,
    common::Vars,
    graph::{Input, Node, NodeBase, Output, PortType},
    nodes::{NodeType, template},
    runtime::Context,
};

const SOURCE_KEY: &str = "source";
const TARGET_TYPE_KEY: &str = "target_type";
const TARGET_KEY_KEY: &str = "target_key";
const FORMAT_KEY: &str = "format";
const ASSIGNMENT_KEY: &str = "assignment";

/// Where an assignment lands in a request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::VariantNames)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetType {
    Header,
    Query,
    Path,
    Body,
}

/// Packages a value as an assignment (`type`, `key`, `value`) for a request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VariableNode {
    #[serde(flatten)]
    base: NodeBase,
}

impl VariableNode {
    pub fn new(id: &str) -> Self {
        Self {
            base: NodeBase::new(
                id,
                "Variable Assignment",
                vec![
                    Input::required(SOURCE_KEY, PortType::Any, "Source value"),
                    Input::required(TARGET_TYPE_KEY, PortType::String, "Target type (header, query, path, body)"),
                    Input::required(TARGET_KEY_KEY, PortType::String, "Target key or parameter name"),
                    Input::optional(FORMAT_KEY, PortType::String, "Format template"),
                ],
                vec![Output::new(ASSIGNMENT_KEY, PortType::Map, "Variable assignment for request")],
            ),
        }
    }
}

#[async_trait]
#[typetag::serde(name = "variable")]
impl Node for VariableNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &'static str {
        NodeType::Variable.into()
    }

    async fn execute(
        &self,
        _ctx: &Context,
        inputs: Vars,
    ) -> Result<Vars> {
        let source = inputs.value(SOURCE_KEY).cloned().unwrap_or(Value::Null);
        let target_type = inputs.str(TARGET_TYPE_KEY).filter(|t| !t.is_empty()).ok_or_else(|| ReqflowError::Action("target_type is required".to_string()))?;
        let target_key = inputs.str(TARGET_KEY_KEY).filter(|k| !k.is_empty()).ok_or_else(|| ReqflowError::Action("target_key is required".to_string()))?;

        let target_type: TargetType = target_type.parse().map_err(|_| {
            ReqflowError::Action(format!(
                "invalid target_type: {}. Must be one of: {}",
                target_type,
                <TargetType as strum::VariantNames>::VARIANTS.join(", ")
            ))
        })?;

        let value = match inputs.str(FORMAT_KEY).filter(|f| !f.is_empty()) {
            Some(format) => Value::from(template::render(format, &source, "value").map_err(|err| ReqflowError::Action(format!("formatting failed: {}", err)))?),
            None => source,
        };

        let assignment = Vars::new().with("type", target_type.as_ref()).with("key", target_key).with("value", value);
        Ok(Vars::new().with(ASSIGNMENT_KEY, assignment))
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }
}
