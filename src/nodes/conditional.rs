use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ReqflowError, Result,
    common::Vars,
    graph::{Input, Node, NodeBase, Output, PortType},
    nodes::NodeType,
    runtime::Context,
};

const VALUE_KEY: &str = "value";
const CONDITION_KEY: &str = "condition";
const COMPARE_VALUE_KEY: &str = "compare_value";
const TRUE_OUTPUT_KEY: &str = "true_output";
const FALSE_OUTPUT_KEY: &str = "false_output";
const RESULT_KEY: &str = "result";
const OUTPUT_KEY: &str = "output";

/// Comparison operator
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Condition {
    Eq,
    Ne,
    Gt,
    Lt,
    // string in string
    Contains,
    // non-null
    Exists,
}

/// Evaluates a condition and picks one of two outputs.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConditionalNode {
    #[serde(flatten)]
    base: NodeBase,
}

impl ConditionalNode {
    pub fn new(id: &str) -> Self {
        Self {
            base: NodeBase::new(
                id,
                "Conditional",
                vec![
                    Input::required(VALUE_KEY, PortType::Any, "Value to evaluate"),
                    Input::required(CONDITION_KEY, PortType::String, "Condition (eq, ne, gt, lt, contains, exists)"),
                    Input::optional(COMPARE_VALUE_KEY, PortType::Any, "Value to compare against"),
                    Input::optional(TRUE_OUTPUT_KEY, PortType::Any, "Output when condition is true"),
                    Input::optional(FALSE_OUTPUT_KEY, PortType::Any, "Output when condition is false"),
                ],
                vec![
                    Output::new(RESULT_KEY, PortType::Bool, "Condition result"),
                    Output::new(OUTPUT_KEY, PortType::Any, "Selected output based on condition"),
                ],
            ),
        }
    }
}

/// Deep equality, except that two numbers compare by value (`1 == 1.0`).
fn equals(
    a: &Value,
    b: &Value,
) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare(
    a: &Value,
    b: &Value,
) -> Result<(f64, f64)> {
    match (to_number(a), to_number(b)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ReqflowError::Action("cannot compare non-numeric values".to_string())),
    }
}

fn evaluate(
    condition: Condition,
    value: &Value,
    compare_value: &Value,
) -> Result<bool> {
    match condition {
        Condition::Exists => Ok(!value.is_null()),
        Condition::Eq => Ok(equals(value, compare_value)),
        Condition::Ne => Ok(!equals(value, compare_value)),
        Condition::Gt => compare(value, compare_value).map(|(x, y)| x > y),
        Condition::Lt => compare(value, compare_value).map(|(x, y)| x < y),
        Condition::Contains => {
            let haystack = value.as_str().ok_or_else(|| ReqflowError::Action("contains operation requires string haystack".to_string()))?;
            let needle = compare_value.as_str().ok_or_else(|| ReqflowError::Action("contains operation requires string needle".to_string()))?;
            Ok(haystack.contains(needle))
        }
    }
}

#[async_trait]
#[typetag::serde(name = "conditional")]
impl Node for ConditionalNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &'static str {
        NodeType::Conditional.into()
    }

    async fn execute(
        &self,
        _ctx: &Context,
        inputs: Vars,
    ) -> Result<Vars> {
        let condition = inputs.str(CONDITION_KEY).filter(|c| !c.is_empty()).ok_or_else(|| ReqflowError::Action("condition is required".to_string()))?;
        let condition: Condition = condition.parse().map_err(|_| ReqflowError::Action(format!("unknown condition: {}", condition)))?;

        let value = inputs.value(VALUE_KEY).unwrap_or(&Value::Null);
        let compare_value = inputs.value(COMPARE_VALUE_KEY).unwrap_or(&Value::Null);

        let result = evaluate(condition, value, compare_value).map_err(|err| ReqflowError::Action(format!("condition evaluation failed: {}", err)))?;

        let selected = if result { TRUE_OUTPUT_KEY } else { FALSE_OUTPUT_KEY };
        let output = inputs.value(selected).cloned().unwrap_or(Value::Null);

        Ok(Vars::new().with(RESULT_KEY, result).with(OUTPUT_KEY, output))
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
        value: Value,
        condition: &str,
        compare_value: Value,
    ) -> Result<Vars> {
        let inputs = Vars::new()
            .with(VALUE_KEY, value)
            .with(CONDITION_KEY, condition)
            .with(COMPARE_VALUE_KEY, compare_value)
            .with(TRUE_OUTPUT_KEY, "yes")
            .with(FALSE_OUTPUT_KEY, "no");
        ConditionalNode::new("c1").execute(&Context::new(), inputs).await
    }

    #[tokio::test]
    async fn test_selects_output() {
        let outputs = run(json!(5), "gt", json!(3)).await.unwrap();
        assert_eq!(outputs.value(RESULT_KEY), Some(&json!(true)));
        assert_eq!(outputs.str(OUTPUT_KEY), Some("yes"));

        let outputs = run(json!("2"), "gt", json!(3)).await.unwrap();
        assert_eq!(outputs.value(RESULT_KEY), Some(&json!(false)));
        assert_eq!(outputs.str(OUTPUT_KEY), Some("no"));
    }

    #[tokio::test]
    async fn test_missing_branch_output_is_null() {
        let inputs = Vars::new().with(VALUE_KEY, 1).with(CONDITION_KEY, "exists");
        let outputs = ConditionalNode::new("c1").execute(&Context::new(), inputs).await.unwrap();

        assert_eq!(outputs.value(RESULT_KEY), Some(&json!(true)));
        assert_eq!(outputs.value(OUTPUT_KEY), Some(&Value::Null));
    }

    #[test]
    fn test_evaluate() {
        assert!(evaluate(Condition::Eq, &json!(1), &json!(1.0)).unwrap());
        assert!(evaluate(Condition::Eq, &json!({ "a": [1] }), &json!({ "a": [1] })).unwrap());
        assert!(evaluate(Condition::Ne, &json!("1"), &json!(1)).unwrap());
        assert!(evaluate(Condition::Lt, &json!("1.5"), &json!(2)).unwrap());
        assert!(evaluate(Condition::Contains, &json!("hello world"), &json!("lo w")).unwrap());
        assert!(!evaluate(Condition::Exists, &Value::Null, &Value::Null).unwrap());
    }

    #[tokio::test]
    async fn test_errors() {
        assert_eq!(
            run(json!("abc"), "gt", json!(1)).await.unwrap_err().to_string(),
            "condition evaluation failed: cannot compare non-numeric values"
        );
        assert!(run(json!(3), "contains", json!("3")).await.is_err());
        assert_eq!(run(json!(1), "between", json!(2)).await.unwrap_err().to_string(), "unknown condition: between");
    }
}
