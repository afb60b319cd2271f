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

const INPUT_KEY: &str = "input";
const OPERATION_KEY: &str = "operation";
const EXPRESSION_KEY: &str = "expression";
const OUTPUT_KEY: &str = "output";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransformOperation {
    /// walk dot-separated keys and array indices
    JsonPath,
    ToString,
    ToInt,
    /// substitute `{key}` placeholders
    Format,
}

/// Reshapes a single value.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TransformNode {
    #[serde(flatten)]
    base: NodeBase,
}

impl TransformNode {
    pub fn new(id: &str) -> Self {
        Self {
            base: NodeBase::new(
                id,
                "Data Transform",
                vec![
                    Input::required(INPUT_KEY, PortType::Any, "Input data to transform"),
                    Input::required(OPERATION_KEY, PortType::String, "Transform operation (json_path, to_string, to_int, format)"),
                    Input::optional(EXPRESSION_KEY, PortType::String, "Expression for the operation"),
                ],
                vec![Output::new(OUTPUT_KEY, PortType::Any, "Transformed data")],
            ),
        }
    }
}

fn json_path(
    input: &Value,
    path: &str,
) -> Result<Value> {
    if path.is_empty() {
        return Ok(input.clone());
    }

    let mut current = input;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part).ok_or_else(|| ReqflowError::Action(format!("path not found: {}", part)))?,
            Value::Array(items) => part
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx))
                .ok_or_else(|| ReqflowError::Action(format!("invalid array index: {}", part)))?,
            other => return Err(ReqflowError::Action(format!("cannot traverse path on {}", template::kind(other)))),
        };
    }
    Ok(current.clone())
}

fn to_int(input: &Value) -> Result<i64> {
    match input {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(|| ReqflowError::Action(format!("cannot convert {} to int", n))),
        Value::String(s) => s.trim().parse::<i64>().map_err(|err| ReqflowError::Action(format!("cannot convert \"{}\" to int: {}", s, err))),
        other => Err(ReqflowError::Action(format!("cannot convert {} to int", template::kind(other)))),
    }
}

fn format(
    input: &Value,
    expression: &str,
) -> Result<String> {
    if expression.is_empty() {
        return Ok(template::display(input));
    }
    template::render(expression, input, INPUT_KEY)
}

#[async_trait]
#[typetag::serde(name = "transform")]
impl Node for TransformNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &'static str {
        NodeType::Transform.into()
    }

    async fn execute(
        &self,
        _ctx: &Context,
        inputs: Vars,
    ) -> Result<Vars> {
        let input = inputs.value(INPUT_KEY).ok_or_else(|| ReqflowError::Action("input is required".to_string()))?;
        let operation = inputs.str(OPERATION_KEY).filter(|op| !op.is_empty()).ok_or_else(|| ReqflowError::Action("operation is required".to_string()))?;
        let operation: TransformOperation = operation.parse().map_err(|_| ReqflowError::Action(format!("unknown operation: {}", operation)))?;
        let expression = inputs.str(EXPRESSION_KEY).unwrap_or_default();

        let output = match operation {
            TransformOperation::JsonPath => json_path(input, expression),
            TransformOperation::ToString => Ok(Value::from(template::display(input))),
            TransformOperation::ToInt => to_int(input).map(Value::from),
            TransformOperation::Format => format(input, expression).map(Value::from),
        }
        .map_err(|err| ReqflowError::Action(format!("transform failed: {}", err)))?;

        Ok(Vars::new().with(OUTPUT_KEY, output))
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn run(
        input: Value,
        operation: &str,
        expression: &str,
    ) -> Result<Value> {
        let inputs = Vars::new().with(INPUT_KEY, input).with(OPERATION_KEY, operation).with(EXPRESSION_KEY, expression);
        let mut outputs = TransformNode::new("t1").execute(&Context::new(), inputs).await?;
        Ok(outputs.remove(OUTPUT_KEY).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_json_path() {
        let body = json!({ "data": { "items": [{ "id": 1 }, { "id": 2 }] } });

        assert_eq!(run(body.clone(), "json_path", "data.items.1.id").await.unwrap(), json!(2));
        assert_eq!(run(body.clone(), "json_path", "").await.unwrap(), body);
        assert_eq!(
            run(body.clone(), "json_path", "data.missing").await.unwrap_err().to_string(),
            "transform failed: path not found: missing"
        );
        assert_eq!(
            run(body, "json_path", "data.items.9").await.unwrap_err().to_string(),
            "transform failed: invalid array index: 9"
        );
        assert!(run(json!(3), "json_path", "a").await.unwrap_err().to_string().contains("cannot traverse path on number"));
    }

    #[tokio::test]
    async fn test_to_string() {
        assert_eq!(run(json!({}), "to_string", "").await.unwrap(), json!("{}"));
        assert_eq!(run(json!(1.5), "to_string", "").await.unwrap(), json!("1.5"));
        assert_eq!(run(json!(false), "to_string", "").await.unwrap(), json!("false"));
        assert_eq!(run(json!("as-is"), "to_string", "").await.unwrap(), json!("as-is"));
    }

    #[tokio::test]
    async fn test_to_int() {
        assert_eq!(run(json!(7.9), "to_int", "").await.unwrap(), json!(7));
        assert_eq!(run(json!("42"), "to_int", "").await.unwrap(), json!(42));
        assert!(run(json!("4.2"), "to_int", "").await.is_err());
        assert!(run(json!(true), "to_int", "").await.unwrap_err().to_string().contains("cannot convert bool to int"));
    }

    #[tokio::test]
    async fn test_format() {
        assert_eq!(run(json!({ "id": 5, "name": "ada" }), "format", "{name}#{id}").await.unwrap(), json!("ada#5"));
        assert_eq!(run(json!(5), "format", "id={input}").await.unwrap(), json!("id=5"));
        assert_eq!(run(json!([1]), "format", "").await.unwrap(), json!("[1]"));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        assert_eq!(run(json!(1), "explode", "").await.unwrap_err(), ReqflowError::Action("unknown operation: explode".to_string()));
    }
}
