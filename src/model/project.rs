use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    ReqflowError, Result,
    common::Vars,
    graph::{Connection, Graph},
    model::NodeModel,
    nodes::NodeRegistry,
};

const DEFAULT_VERSION: &str = "1.0.0";

/// A saved test project: nodes, their connections and free-form variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectModel {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub nodes: Vec<NodeModel>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub variables: Vars,
}

impl ProjectModel {
    /// An empty project stamped with the current time.
    pub fn new(
        name: &str,
        description: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            version: DEFAULT_VERSION.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
            nodes: Vec::new(),
            connections: Vec::new(),
            variables: Vars::new(),
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<ProjectModel>(s).map_err(|err| ReqflowError::Project(format!("failed to parse project: {}", err)))
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| ReqflowError::Project(format!("failed to read project file {}: {}", path.display(), err)))?;
        let project = Self::from_json(&content)?;
        debug!(path = %path.display(), nodes = project.nodes.len(), "loaded project");
        Ok(project)
    }

    /// Write the project to `path`, creating missing parent directories.
    ///
    /// `updated_at` is bumped before writing.
    pub async fn save<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|err| ReqflowError::Project(format!("failed to create directory {}: {}", dir.display(), err)))?;
        }

        self.updated_at = Utc::now();
        let data = self.to_json()?;
        tokio::fs::write(path, data)
            .await
            .map_err(|err| ReqflowError::Project(format!("failed to write project file {}: {}", path.display(), err)))?;

        info!(path = %path.display(), "saved project");
        Ok(())
    }

    /// Build a graph: every node through `registry`, then every connection.
    ///
    /// Errors name the node or connection that could not be added.
    pub fn to_graph(
        &self,
        registry: &NodeRegistry,
    ) -> Result<Graph> {
        let graph = Graph::new();

        for model in &self.nodes {
            let node = registry.create_from_model(model).map_err(|err| ReqflowError::Project(format!("failed to create node {}: {}", model.id, err)))?;
            graph.add_node(node);
        }

        for conn in &self.connections {
            graph
                .add_connection(conn.clone())
                .map_err(|err| ReqflowError::Project(format!("failed to add connection {}: {}", conn.id, err)))?;
        }

        Ok(graph)
    }

    /// Snapshot a graph into a new project, nodes ordered by id.
    pub fn from_graph(
        graph: &Graph,
        name: &str,
        description: &str,
    ) -> Self {
        let mut project = Self::new(name, description);
        project.nodes = graph.get_all_nodes().values().map(|node| NodeModel::from(&**node)).collect();
        project.connections = graph.get_connections();
        project
    }
}
