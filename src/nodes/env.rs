use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    ReqflowError, Result,
    common::Vars,
    graph::{Input, Node, NodeBase, Output, PortType},
    nodes::NodeType,
    runtime::Context,
};

const LOAD_OS_KEY: &str = "load_os";
const ENV_FILE_KEY: &str = "env_file";
const VARIABLES_KEY: &str = "variables";

/// Collects environment variables from the process and an optional dotenv file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EnvNode {
    #[serde(flatten)]
    base: NodeBase,
}

impl EnvNode {
    pub fn new(id: &str) -> Self {
        Self {
            base: NodeBase::new(
                id,
                "Environment Variables",
                vec![
                    Input::optional(LOAD_OS_KEY, PortType::Bool, "Load OS environment variables").with_value(true),
                    Input::optional(ENV_FILE_KEY, PortType::String, "Path to .env file"),
                ],
                vec![Output::new(VARIABLES_KEY, PortType::Map, "Environment variables")],
            ),
        }
    }
}

/// Parse `KEY=VALUE` lines into `variables`, overriding existing keys.
///
/// Blank lines and `#` comments are skipped, lines without `=` ignored, and
/// one pair of matching single or double quotes stripped from the value.
fn parse_env_file(
    content: &str,
    variables: &mut Vars,
) {
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        variables.set(key.trim(), unquote(value.trim()));
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[async_trait]
#[typetag::serde(name = "env")]
impl Node for EnvNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &'static str {
        NodeType::Env.into()
    }

    async fn execute(
        &self,
        _ctx: &Context,
        inputs: Vars,
    ) -> Result<Vars> {
        let mut variables = Vars::new();

        if inputs.value(LOAD_OS_KEY).and_then(Value::as_bool).unwrap_or(false) {
            for (key, value) in std::env::vars_os() {
                if let (Ok(key), Ok(value)) = (key.into_string(), value.into_string()) {
                    variables.set(&key, value);
                }
            }
        }

        if let Some(path) = inputs.str(ENV_FILE_KEY).filter(|p| !p.is_empty()) {
            let content = tokio::fs::read_to_string(path).await.map_err(|err| ReqflowError::Action(format!("failed to read env file {}: {}", path, err)))?;
            parse_env_file(&content, &mut variables);
            debug!(node = self.id(), path, "loaded env file");
        }

        Ok(Vars::new().with(VARIABLES_KEY, variables))
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }
}
