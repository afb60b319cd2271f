//! Graph executor.
//!
//! The executor walks a [`Graph`] in topological order, one node at a time:
//! - resolving each node's inputs from declared defaults and upstream outputs
//! - running the node with the caller's [`Context`]
//! - stopping the pass at the first failure

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    ReqflowError, Result,
    common::Vars,
    graph::{Graph, Node, NodeId},
    runtime::Context,
};

/// Outcome of one node execution. Built once per node per pass, never mutated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// node id
    pub node_id: NodeId,
    /// whether the node produced outputs
    pub success: bool,
    /// error message, present iff the node failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// produced outputs, present iff the node succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vars>,
    /// wall-clock time spent resolving inputs and executing
    pub duration: Duration,
    /// start time
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    fn succeeded(
        node_id: &str,
        outputs: Vars,
        duration: Duration,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            node_id: node_id.to_string(),
            success: true,
            error: None,
            outputs: Some(outputs),
            duration,
            timestamp,
        }
    }

    fn failed(
        node_id: &str,
        error: &ReqflowError,
        duration: Duration,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            node_id: node_id.to_string(),
            success: false,
            error: Some(error.to_string()),
            outputs: None,
            duration,
            timestamp,
        }
    }
}

/// Results of one execution pass, in execution order.
///
/// When `error` is set the pass stopped early and `results` is the prefix up
/// to and including the failing node.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub results: Vec<ExecutionResult>,
    pub error: Option<ReqflowError>,
}

impl ExecutionReport {
    fn completed(results: Vec<ExecutionResult>) -> Self {
        Self {
            results,
            error: None,
        }
    }

    fn stopped(
        results: Vec<ExecutionResult>,
        error: ReqflowError,
    ) -> Self {
        Self {
            results,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn result(
        &self,
        nid: &str,
    ) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.node_id == nid)
    }

    /// Id of the node the pass stopped at.
    pub fn failed_node(&self) -> Option<&str> {
        self.error.as_ref().and_then(ReqflowError::failed_node)
    }

    /// Number of nodes that ran successfully.
    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn into_result(self) -> Result<Vec<ExecutionResult>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.results),
        }
    }
}

/// Run-scoped state, guarded by the executor's lock for a whole pass.
#[derive(Default)]
struct RunState {
    /// outputs of nodes that succeeded in this pass
    outputs: HashMap<NodeId, Vars>,
    /// nodes whose last run in this pass failed
    failed: HashSet<NodeId>,
}

/// Runs a shared [`Graph`] in dependency order.
///
/// Full-graph and targeted runs share one output cache and serialize on one
/// lock: a second run waits until the first has finished.
pub struct Executor {
    graph: Arc<Graph>,
    state: Mutex<RunState>,
}

impl Executor {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self {
            graph,
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn graph(&self) -> Arc<Graph> {
        self.graph.clone()
    }

    /// Execute every node in topological order.
    ///
    /// Returns `Err` only when nothing could run (the order could not be
    /// computed or a node vanished mid-pass). Node failures and cancellation
    /// are reported through [`ExecutionReport::error`].
    pub async fn execute_graph(
        &self,
        ctx: &Context,
    ) -> Result<ExecutionReport> {
        let mut state = self.state.lock().await;
        *state = RunState::default();

        let order = self.graph.get_topological_order()?;
        info!(run = ctx.run_id(), nodes = order.len(), "executing graph");

        let mut results = Vec::with_capacity(order.len());
        for nid in order {
            if ctx.is_cancelled() {
                warn!(run = ctx.run_id(), node = %nid, "run cancelled before node started");
                return Ok(ExecutionReport::stopped(results, ReqflowError::Cancelled));
            }

            let Some(node) = self.graph.get_node(&nid) else {
                warn!(run = ctx.run_id(), node = %nid, "node removed from the graph during execution");
                return Err(ReqflowError::NodeNotFound(nid));
            };

            let (result, outcome) = self.run_node(ctx, &mut state, node.as_ref()).await;
            results.push(result);

            if let Err(err) = outcome {
                warn!(run = ctx.run_id(), node = %nid, error = %err, "execution stopped");
                return Ok(ExecutionReport::stopped(
                    results,
                    ReqflowError::ExecutionStopped {
                        node: nid,
                        source: Box::new(err),
                    },
                ));
            }
        }

        info!(run = ctx.run_id(), "graph executed");
        Ok(ExecutionReport::completed(results))
    }

    /// Execute a single node against the outputs cached so far.
    ///
    /// Dependencies are not run; a required input wired to a node without a
    /// cached output fails resolution.
    pub async fn execute_node(
        &self,
        ctx: &Context,
        nid: &str,
    ) -> Result<ExecutionReport> {
        let mut state = self.state.lock().await;

        let node = self.graph.get_node(nid).ok_or_else(|| ReqflowError::NodeNotFound(nid.to_string()))?;

        if ctx.is_cancelled() {
            return Ok(ExecutionReport::stopped(Vec::new(), ReqflowError::Cancelled));
        }

        let (result, outcome) = self.run_node(ctx, &mut state, node.as_ref()).await;
        Ok(match outcome {
            Ok(()) => ExecutionReport::completed(vec![result]),
            Err(err) => ExecutionReport::stopped(
                vec![result],
                ReqflowError::ExecutionStopped {
                    node: nid.to_string(),
                    source: Box::new(err),
                },
            ),
        })
    }

    /// Cached outputs of a node from the current pass.
    pub async fn node_result(
        &self,
        nid: &str,
    ) -> Option<Vars> {
        self.state.lock().await.outputs.get(nid).cloned()
    }

    /// Drop every cached output.
    pub async fn clear_results(&self) {
        *self.state.lock().await = RunState::default();
    }

    async fn run_node(
        &self,
        ctx: &Context,
        state: &mut RunState,
        node: &dyn Node,
    ) -> (ExecutionResult, Result<()>) {
        let nid = node.id().to_string();
        let timestamp = Utc::now();
        let started = Instant::now();

        debug!(run = ctx.run_id(), node = %nid, kind = node.node_type(), "running node");

        let outcome = match self.prepare_inputs(state, node) {
            Ok(inputs) => node.execute(ctx, inputs).await,
            Err(err) => Err(err),
        };
        let duration = started.elapsed();

        match outcome {
            Ok(outputs) => {
                if let Err(err) = self.graph.record_outputs(&nid, &outputs) {
                    warn!(node = %nid, error = %err, "could not record outputs on node");
                }
                state.failed.remove(&nid);
                state.outputs.insert(nid.clone(), outputs.clone());
                debug!(node = %nid, ?duration, "node succeeded");
                (ExecutionResult::succeeded(&nid, outputs, duration, timestamp), Ok(()))
            }
            Err(err) => {
                state.outputs.remove(&nid);
                state.failed.insert(nid.clone());
                debug!(node = %nid, error = %err, "node failed");
                (ExecutionResult::failed(&nid, &err, duration, timestamp), Err(err))
            }
        }
    }

    /// Resolve a node's effective inputs.
    ///
    /// Declared non-null values seed the map, connection values override them,
    /// and every required input must be present at the end.
    fn prepare_inputs(
        &self,
        state: &RunState,
        node: &dyn Node,
    ) -> Result<Vars> {
        let mut inputs = Vars::new();

        for input in node.inputs() {
            if let Some(value) = input.value.as_ref().filter(|v| !v.is_null()) {
                inputs.insert(input.name.clone(), value.clone());
            }
        }

        for conn in self.graph.get_connections().into_iter().filter(|c| c.target_node == node.id()) {
            let required = node.input(&conn.target_port).is_some_and(|i| i.required);

            let Some(source_outputs) = state.outputs.get(&conn.source_node) else {
                if !required {
                    continue;
                }
                if state.failed.contains(&conn.source_node) {
                    return Err(ReqflowError::UpstreamFailed {
                        port: conn.target_port,
                        source_node: conn.source_node,
                    });
                }
                return Err(ReqflowError::InputUnavailable {
                    port: conn.target_port,
                    source_node: conn.source_node,
                });
            };

            let Some(value) = source_outputs.value(&conn.source_port) else {
                if !required {
                    continue;
                }
                return Err(ReqflowError::MissingOutput {
                    port: conn.source_port,
                    source_node: conn.source_node,
                });
            };

            inputs.insert(conn.target_port, value.clone());
        }

        if let Some(missing) = node.inputs().iter().find(|i| i.required && !inputs.contains_key(&i.name)) {
            return Err(ReqflowError::InputNotProvided {
                input: missing.name.clone(),
                node: node.id().to_string(),
            });
        }

        Ok(inputs)
    }
}
