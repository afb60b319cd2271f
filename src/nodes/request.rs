use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, header::HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    ReqflowError, Result,
    common::Vars,
    graph::{Input, Node, NodeBase, Output, PortType},
    nodes::NodeType,
    runtime::Context,
    utils,
};

const URL_KEY: &str = "url";
const METHOD_KEY: &str = "method";
const HEADERS_KEY: &str = "headers";
const BODY_KEY: &str = "body";
const TIMEOUT_KEY: &str = "timeout";
const STATUS_CODE_KEY: &str = "status_code";
const DURATION_KEY: &str = "duration";

const DEFAULT_METHOD: &str = "GET";
// seconds
const DEFAULT_TIMEOUT: u64 = 30;

/// Performs one HTTP request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RequestNode {
    #[serde(flatten)]
    base: NodeBase,
}

impl RequestNode {
    pub fn new(id: &str) -> Self {
        Self {
            base: NodeBase::new(
                id,
                "HTTP Request",
                vec![
                    Input::required(URL_KEY, PortType::String, "Request URL"),
                    Input::optional(METHOD_KEY, PortType::String, "HTTP method").with_value(DEFAULT_METHOD),
                    Input::optional(HEADERS_KEY, PortType::Map, "Request headers"),
                    Input::optional(BODY_KEY, PortType::String, "Request body"),
                    Input::optional(TIMEOUT_KEY, PortType::Int, "Timeout in seconds").with_value(DEFAULT_TIMEOUT),
                ],
                vec![
                    Output::new(STATUS_CODE_KEY, PortType::Int, "HTTP status code"),
                    Output::new(HEADERS_KEY, PortType::Map, "Response headers"),
                    Output::new(BODY_KEY, PortType::String, "Response body"),
                    Output::new(DURATION_KEY, PortType::Duration, "Request duration in milliseconds"),
                ],
            ),
        }
    }

    /// Effective timeout: the configured one, never past the run deadline.
    fn timeout(
        ctx: &Context,
        inputs: &Vars,
    ) -> Duration {
        let secs = inputs.value(TIMEOUT_KEY).and_then(Value::as_u64).filter(|t| *t > 0).unwrap_or(DEFAULT_TIMEOUT);
        let timeout = Duration::from_secs(secs);
        match ctx.remaining() {
            Some(remaining) => timeout.min(remaining),
            None => timeout,
        }
    }

    fn build_request(
        ctx: &Context,
        inputs: &Vars,
    ) -> Result<reqwest::RequestBuilder> {
        let url = inputs.str(URL_KEY).filter(|u| !u.is_empty()).ok_or_else(|| ReqflowError::Action("url is required".to_string()))?;

        let method = inputs.str(METHOD_KEY).filter(|m| !m.is_empty()).unwrap_or(DEFAULT_METHOD).to_uppercase();
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| ReqflowError::Action(format!("invalid method '{}'", method)))?;

        let mut request = reqwest::Client::new().request(method, url).timeout(Self::timeout(ctx, inputs));

        // non-string header values are dropped
        if let Some(Value::Object(headers)) = inputs.value(HEADERS_KEY) {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key.as_str(), value);
                }
            }
        }

        if let Some(body) = inputs.str(BODY_KEY).filter(|b| !b.is_empty()) {
            request = request.body(body.to_string());
        }

        Ok(request)
    }
}

/// Response headers as a map: one value becomes a string, several become an array.
fn headers_to_map(headers: &HeaderMap) -> Map<String, Value> {
    let mut map = Map::new();
    for name in headers.keys() {
        let mut values: Vec<Value> = headers.get_all(name).iter().map(|v| Value::from(String::from_utf8_lossy(v.as_bytes()).into_owned())).collect();
        let value = if values.len() == 1 {
            values.swap_remove(0)
        } else {
            Value::Array(values)
        };
        map.insert(name.to_string(), value);
    }
    map
}

#[async_trait]
#[typetag::serde(name = "request")]
impl Node for RequestNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &'static str {
        NodeType::Request.into()
    }

    async fn execute(
        &self,
        ctx: &Context,
        inputs: Vars,
    ) -> Result<Vars> {
        let request = Self::build_request(ctx, &inputs)?;

        let started = Instant::now();
        let exchange = async {
            let res = request.send().await?;
            let duration = started.elapsed();
            let status = res.status().as_u16();
            let headers = headers_to_map(res.headers());
            let body = res.text().await?;
            Ok::<_, reqwest::Error>((status, headers, body, duration))
        };

        let (status, headers, body, duration) = tokio::select! {
            _ = ctx.cancelled() => return Err(ReqflowError::Cancelled),
            res = exchange => res.map_err(|err| ReqflowError::Action(format!("request failed: {}", err)))?,
        };

        debug!(node = self.id(), status, ?duration, "request finished");

        Ok(Vars::new()
            .with(STATUS_CODE_KEY, status)
            .with(HEADERS_KEY, headers)
            .with(BODY_KEY, body)
            .with(DURATION_KEY, utils::time::millis(duration)))
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }
}
