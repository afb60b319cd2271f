//! The node/connection store and its ordering queries.
//!
//! The graph is guarded by a single reader/writer lock: mutations take the
//! write lock, every query (topological order included) takes the read lock.
//! A rejected mutation never leaves a partial change behind.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use petgraph::{algo::is_cyclic_directed, graphmap::DiGraphMap};
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    ReqflowError, Result,
    common::Vars,
    graph::{
        connection::Connection,
        node::{Node, NodeId},
    },
};

#[derive(Default, Debug)]
struct GraphInner {
    /// Nodes keyed by id. Ordered so that every walk over them is reproducible.
    nodes: BTreeMap<NodeId, Box<dyn Node>>,
    /// Connections in insertion order.
    connections: Vec<Connection>,
}

impl GraphInner {
    fn validate_connection(
        &self,
        conn: &Connection,
    ) -> Result<()> {
        let source = self.nodes.get(&conn.source_node).ok_or_else(|| ReqflowError::SourceNodeNotFound(conn.source_node.clone()))?;
        let target = self.nodes.get(&conn.target_node).ok_or_else(|| ReqflowError::TargetNodeNotFound(conn.target_node.clone()))?;

        if source.output(&conn.source_port).is_none() {
            return Err(ReqflowError::SourcePortNotFound {
                node: conn.source_node.clone(),
                port: conn.source_port.clone(),
            });
        }

        if target.input(&conn.target_port).is_none() {
            return Err(ReqflowError::TargetPortNotFound {
                node: conn.target_node.clone(),
                port: conn.target_port.clone(),
            });
        }

        Ok(())
    }

    /// Depth-first cycle search over the whole graph with `new_conn` added.
    ///
    /// Every node is a search root, since earlier components may be disconnected
    /// from the new edge.
    fn would_create_cycle(
        &self,
        new_conn: &Connection,
    ) -> bool {
        let mut adjacency: DiGraphMap<&str, ()> = DiGraphMap::with_capacity(self.nodes.len(), self.connections.len() + 1);
        for nid in self.nodes.keys() {
            adjacency.add_node(nid.as_str());
        }
        for conn in self.connections.iter().chain(std::iter::once(new_conn)) {
            adjacency.add_edge(conn.source_node.as_str(), conn.target_node.as_str(), ());
        }

        is_cyclic_directed(&adjacency)
    }
}

/// Directed acyclic graph of nodes wired port to port.
#[derive(Default, Debug)]
pub struct Graph {
    inner: RwLock<GraphInner>,
}

impl Graph {
    /// create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Output a human-readable representation of the graph
    pub fn schema(&self) -> String {
        let inner = self.read();
        let mut lines = Vec::new();

        lines.push("=== Graph ===".to_string());
        lines.push(format!("Nodes: {}, Connections: {}", inner.nodes.len(), inner.connections.len()));
        lines.push(String::new());

        lines.push("--- Nodes ---".to_string());
        for node in inner.nodes.values() {
            lines.push(format!("[{}] {} (type: {})", node.id(), node.name(), node.node_type()));
        }
        lines.push(String::new());

        lines.push("--- Connections ---".to_string());
        for conn in inner.connections.iter() {
            lines.push(format!(
                "{}.{} --> {}.{} (id: {})",
                conn.source_node, conn.source_port, conn.target_node, conn.target_port, conn.id
            ));
        }
        lines.push(String::new());

        lines.push("--- Graph Structure ---".to_string());
        for nid in inner.nodes.keys() {
            let outgoing: Vec<String> = inner
                .connections
                .iter()
                .filter(|c| &c.source_node == nid)
                .map(|c| format!("{}({})", c.target_node, c.target_port))
                .collect();

            if outgoing.is_empty() {
                lines.push(format!("{} -> (end)", nid));
            } else {
                lines.push(format!("{} -> {}", nid, outgoing.join(", ")));
            }
        }

        lines.join("\n")
    }

    /// Insert a node, replacing any node with the same id.
    pub fn add_node(
        &self,
        node: Box<dyn Node>,
    ) {
        let mut inner = self.write();
        let nid = node.id().to_string();
        if inner.nodes.insert(nid.clone(), node).is_some() {
            debug!(node = %nid, "replaced node");
        } else {
            trace!(node = %nid, "added node");
        }
    }

    /// Remove a node together with every connection that touches it.
    pub fn remove_node(
        &self,
        nid: &str,
    ) -> Result<()> {
        let mut inner = self.write();
        if inner.nodes.remove(nid).is_none() {
            return Err(ReqflowError::NodeNotFound(nid.to_string()));
        }

        let before = inner.connections.len();
        inner.connections.retain(|c| !c.touches(nid));
        debug!(node = %nid, dropped = before - inner.connections.len(), "removed node");

        Ok(())
    }

    /// get node by id
    ///
    /// The returned node is an independent copy; use [`Graph::set_input_value`]
    /// to change a stored node.
    pub fn get_node(
        &self,
        nid: &str,
    ) -> Option<Box<dyn Node>> {
        self.read().nodes.get(nid).map(|n| n.clone_node())
    }

    /// Snapshot of every node, keyed by id.
    pub fn get_all_nodes(&self) -> BTreeMap<NodeId, Box<dyn Node>> {
        self.read().nodes.iter().map(|(nid, n)| (nid.clone(), n.clone_node())).collect()
    }

    pub fn contains_node(
        &self,
        nid: &str,
    ) -> bool {
        self.read().nodes.contains_key(nid)
    }

    pub fn node_count(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    /// Set the value of an input port on a stored node.
    pub fn set_input_value(
        &self,
        nid: &str,
        name: &str,
        value: Value,
    ) -> Result<()> {
        let mut inner = self.write();
        let node = inner.nodes.get_mut(nid).ok_or_else(|| ReqflowError::NodeNotFound(nid.to_string()))?;
        node.set_input_value(name, value)
    }

    /// Write produced values back onto the node's declared output ports.
    ///
    /// Values for undeclared ports are ignored. The ports only mirror the last
    /// result for display and persistence; input resolution reads the
    /// executor's cache, so callers may log a failure here and carry on.
    pub(crate) fn record_outputs(
        &self,
        nid: &str,
        outputs: &Vars,
    ) -> Result<()> {
        let mut inner = self.write();
        let node = inner.nodes.get_mut(nid).ok_or_else(|| ReqflowError::NodeNotFound(nid.to_string()))?;

        let names: Vec<String> = node.outputs().iter().map(|o| o.name.clone()).collect();
        for name in names {
            if let Some(value) = outputs.value(&name) {
                node.set_output_value(&name, value.clone())?;
            }
        }

        Ok(())
    }

    /// Add a connection after checking its id, both endpoints and acyclicity.
    pub fn add_connection(
        &self,
        conn: Connection,
    ) -> Result<()> {
        let mut inner = self.write();

        if inner.connections.iter().any(|c| c.id == conn.id) {
            return Err(ReqflowError::DuplicateConnection(conn.id));
        }
        inner.validate_connection(&conn)?;

        if inner.would_create_cycle(&conn) {
            debug!(connection = %conn.id, source = %conn.source_node, target = %conn.target_node, "rejected cyclic connection");
            return Err(ReqflowError::CyclicGraph);
        }

        trace!(connection = %conn.id, "added connection");
        inner.connections.push(conn);
        Ok(())
    }

    /// Remove exactly the connection with this id.
    pub fn remove_connection(
        &self,
        cid: &str,
    ) -> Result<()> {
        let mut inner = self.write();
        let idx = inner.connections.iter().position(|c| c.id == cid).ok_or_else(|| ReqflowError::ConnectionNotFound(cid.to_string()))?;
        inner.connections.remove(idx);
        Ok(())
    }

    /// Snapshot of every connection in insertion order.
    pub fn get_connections(&self) -> Vec<Connection> {
        self.read().connections.clone()
    }

    /// Source node of every connection targeting `nid`. Not deduplicated.
    pub fn get_dependencies(
        &self,
        nid: &str,
    ) -> Vec<NodeId> {
        self.read().connections.iter().filter(|c| c.target_node == nid).map(|c| c.source_node.clone()).collect()
    }

    /// Target node of every connection sourced from `nid`. Not deduplicated.
    pub fn get_dependents(
        &self,
        nid: &str,
    ) -> Vec<NodeId> {
        self.read().connections.iter().filter(|c| c.source_node == nid).map(|c| c.target_node.clone()).collect()
    }

    /// Compute an execution order with Kahn's algorithm.
    ///
    /// Zero in-degree nodes are queued in ascending id order, both at seeding
    /// time and for each batch released by a single pop, so the order is the
    /// same on every call. Cycles are re-checked here rather than trusted to
    /// the insertion-time check.
    pub fn get_topological_order(&self) -> Result<Vec<NodeId>> {
        let inner = self.read();

        let mut in_degree: BTreeMap<&str, usize> = inner.nodes.keys().map(|nid| (nid.as_str(), 0)).collect();
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();

        for conn in inner.connections.iter() {
            successors.entry(conn.source_node.as_str()).or_default().push(conn.target_node.as_str());
            if let Some(degree) = in_degree.get_mut(conn.target_node.as_str()) {
                *degree += 1;
            }
        }

        let mut queue: VecDeque<&str> = in_degree.iter().filter(|(_, degree)| **degree == 0).map(|(nid, _)| *nid).collect();
        let mut order = Vec::with_capacity(inner.nodes.len());

        while let Some(current) = queue.pop_front() {
            order.push(current.to_string());

            let mut released = Vec::new();
            for next in successors.get(current).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(*next) {
                    *degree -= 1;
                    if *degree == 0 {
                        released.push(*next);
                    }
                }
            }
            released.sort_unstable();
            queue.extend(released);
        }

        if order.len() != inner.nodes.len() {
            return Err(ReqflowError::CyclicGraph);
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::graph::mock::MockNode;

    fn graph_with(ids: &[&str]) -> Graph {
        let graph = Graph::new();
        for id in ids {
            graph.add_node(MockNode::new(id).boxed());
        }
        graph
    }

    fn link(
        id: &str,
        source: &str,
        target: &str,
    ) -> Connection {
        Connection::new(id, source, "out", target, "in")
    }

    fn position(
        order: &[NodeId],
        nid: &str,
    ) -> usize {
        order.iter().position(|n| n == nid).unwrap()
    }

    #[test]
    fn test_add_node_replaces_by_id() {
        let graph = graph_with(&["a"]);
        let mut replacement = MockNode::new("a");
        replacement.base.name = "second".to_string();
        graph.add_node(replacement.boxed());

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.get_node("a").unwrap().name(), "second");
    }

    #[test]
    fn test_remove_node_cascades_connections() {
        let graph = graph_with(&["a", "b", "c"]);
        graph.add_connection(link("c1", "a", "b")).unwrap();
        graph.add_connection(link("c2", "b", "c")).unwrap();
        graph.add_connection(link("c3", "a", "c")).unwrap();

        graph.remove_node("b").unwrap();

        let connections = graph.get_connections();
        assert_eq!(connections.len(), 1);
        assert!(connections.iter().all(|c| !c.touches("b")));
        assert_eq!(graph.remove_node("b"), Err(ReqflowError::NodeNotFound("b".to_string())));
    }

    #[test]
    fn test_add_connection_validates_references() {
        let graph = graph_with(&["a", "b"]);

        assert_eq!(graph.add_connection(link("c1", "x", "b")), Err(ReqflowError::SourceNodeNotFound("x".to_string())));
        assert_eq!(graph.add_connection(link("c1", "a", "y")), Err(ReqflowError::TargetNodeNotFound("y".to_string())));
        assert_eq!(
            graph.add_connection(Connection::new("c1", "a", "nope", "b", "in")),
            Err(ReqflowError::SourcePortNotFound {
                node: "a".to_string(),
                port: "nope".to_string(),
            })
        );
        assert_eq!(
            graph.add_connection(Connection::new("c1", "a", "out", "b", "nope")),
            Err(ReqflowError::TargetPortNotFound {
                node: "b".to_string(),
                port: "nope".to_string(),
            })
        );
        // an input port name is not a valid source
        assert!(graph.add_connection(Connection::new("c1", "a", "in", "b", "in")).is_err());
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_cycle_rejected_without_mutation() {
        let graph = graph_with(&["a", "b", "c"]);
        graph.add_connection(link("c1", "a", "b")).unwrap();
        graph.add_connection(link("c2", "b", "c")).unwrap();
        let before = graph.get_connections();
        let nodes_before: Vec<NodeId> = graph.get_all_nodes().into_keys().collect();

        assert_eq!(graph.add_connection(link("c3", "c", "a")), Err(ReqflowError::CyclicGraph));
        assert_eq!(graph.add_connection(link("c4", "b", "b")), Err(ReqflowError::CyclicGraph));

        assert_eq!(graph.get_connections(), before);
        assert_eq!(graph.get_all_nodes().into_keys().collect::<Vec<_>>(), nodes_before);
        assert_eq!(graph.get_topological_order().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_rejected_in_disconnected_component() {
        let graph = graph_with(&["a", "b", "x", "y"]);
        graph.add_connection(link("c1", "x", "y")).unwrap();
        graph.add_connection(link("c2", "a", "b")).unwrap();

        assert_eq!(graph.add_connection(link("c3", "y", "x")), Err(ReqflowError::CyclicGraph));
    }

    #[test]
    fn test_remove_connection() {
        let graph = graph_with(&["a", "b"]);
        graph.add_connection(link("c1", "a", "b")).unwrap();
        graph.add_connection(link("c2", "a", "b")).unwrap();

        graph.remove_connection("c1").unwrap();
        assert_eq!(graph.get_connections().len(), 1);
        assert_eq!(graph.get_connections()[0].id, "c2");
        assert_eq!(graph.remove_connection("c1"), Err(ReqflowError::ConnectionNotFound("c1".to_string())));
    }

    #[test]
    fn test_duplicate_connection_id_rejected() {
        let graph = graph_with(&["a", "b", "c"]);
        graph.add_connection(link("c1", "a", "b")).unwrap();

        let err = graph.add_connection(link("c1", "b", "c")).unwrap_err();

        assert_eq!(err, ReqflowError::DuplicateConnection("c1".to_string()));
        assert_eq!(err.to_string(), "connection already exists: c1");
        assert_eq!(graph.connection_count(), 1);

        graph.remove_connection("c1").unwrap();
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_dependencies_are_not_deduplicated() {
        let graph = graph_with(&["a", "b", "c"]);
        graph.add_connection(link("c1", "a", "b")).unwrap();
        graph.add_connection(link("c2", "a", "b")).unwrap();
        graph.add_connection(link("c3", "b", "c")).unwrap();

        assert_eq!(graph.get_dependencies("b"), vec!["a", "a"]);
        assert_eq!(graph.get_dependents("a"), vec!["b", "b"]);
        assert_eq!(graph.get_dependents("c"), Vec::<NodeId>::new());
    }

    #[test]
    fn test_topological_order_respects_every_connection() {
        let graph = graph_with(&["e", "d", "c", "b", "a"]);
        graph.add_connection(link("c1", "e", "a")).unwrap();
        graph.add_connection(link("c2", "d", "a")).unwrap();
        graph.add_connection(link("c3", "a", "b")).unwrap();
        graph.add_connection(link("c4", "c", "b")).unwrap();

        let order = graph.get_topological_order().unwrap();
        assert_eq!(order.len(), 5);
        for conn in graph.get_connections() {
            assert!(position(&order, &conn.source_node) < position(&order, &conn.target_node));
        }
    }

    #[test]
    fn test_topological_order_is_deterministic() {
        let graph = graph_with(&["z", "m", "a", "q"]);
        graph.add_connection(link("c1", "z", "q")).unwrap();

        let first = graph.get_topological_order().unwrap();
        assert_eq!(first, vec!["a", "m", "z", "q"]);
        for _ in 0..10 {
            assert_eq!(graph.get_topological_order().unwrap(), first);
        }
    }

    #[test]
    fn test_released_batch_sorted_by_id() {
        let graph = graph_with(&["root", "c", "b", "a"]);
        graph.add_connection(link("c1", "root", "c")).unwrap();
        graph.add_connection(link("c2", "root", "a")).unwrap();
        graph.add_connection(link("c3", "root", "b")).unwrap();

        assert_eq!(graph.get_topological_order().unwrap(), vec!["root", "a", "b", "c"]);
    }

    #[test]
    fn test_set_input_value() {
        let graph = graph_with(&["a"]);
        graph.set_input_value("a", "in", json!(7)).unwrap();

        assert_eq!(graph.get_node("a").unwrap().input("in").unwrap().value, Some(json!(7)));
        assert_eq!(graph.set_input_value("a", "zzz", json!(1)), Err(ReqflowError::InputNotFound("zzz".to_string())));
        assert_eq!(graph.set_input_value("b", "in", json!(1)), Err(ReqflowError::NodeNotFound("b".to_string())));
    }

    #[test]
    fn test_get_node_returns_independent_copy() {
        let graph = graph_with(&["a"]);
        let mut copy = graph.get_node("a").unwrap();
        copy.set_input_value("in", json!("changed")).unwrap();

        assert_eq!(graph.get_node("a").unwrap().input("in").unwrap().value, None);
    }

    #[test]
    fn test_schema_lists_structure() {
        let graph = graph_with(&["a", "b"]);
        graph.add_connection(link("c1", "a", "b")).unwrap();

        let schema = graph.schema();
        assert!(schema.contains("Nodes: 2, Connections: 1"));
        assert!(schema.contains("a.out --> b.in (id: c1)"));
        assert!(schema.contains("b -> (end)"));
    }
}
