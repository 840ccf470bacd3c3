//! Cluster definitions and the cluster-info collaborator.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

pub const OPTION_ADDR: &str = "addr";
pub const OPTION_KUBECONFIG: &str = "kubeconfig";
pub const OPTION_CONTEXT: &str = "context";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    Kubernetes,
    Dcos,
    Flink,
    #[serde(other)]
    Unknown,
}

/// One cluster as declared in the cluster file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub cluster_type: ClusterType,
    /// Backend connection options: `addr`, `kubeconfig`, `context`.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Key/value facts injected into task env and host path templates.
    #[serde(default)]
    pub info: BTreeMap<String, String>,
}

impl ClusterConfig {
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ClusterFile {
    #[serde(default)]
    clusters: Vec<ClusterConfig>,
}

/// Parse a cluster file body.
pub fn parse_clusters(content: &str) -> Result<Vec<ClusterConfig>> {
    let file: ClusterFile = serde_yaml::from_str(content)?;
    for cluster in &file.clusters {
        if cluster.name.is_empty() {
            return Err(AppError::ConfigurationError(
                "cluster entry without a name".to_string(),
            ));
        }
    }
    Ok(file.clusters)
}

pub async fn load_clusters(path: impl AsRef<Path>) -> Result<Vec<ClusterConfig>> {
    let path = path.as_ref();
    info!("📄 Loading cluster definitions from {}", path.display());
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::ConfigurationError(format!(
            "failed to read cluster file {}: {}",
            path.display(),
            e
        ))
    })?;
    let clusters = parse_clusters(&content)?;
    debug!("📋 Loaded {} cluster definitions", clusters.len());
    Ok(clusters)
}

/// Supplies the cluster-info map consulted before each job build
#[async_trait]
pub trait ClusterInfoSource: Send + Sync {
    async fn cluster_info(&self, cluster: &str) -> Result<BTreeMap<String, String>>;
}

/// Serves the info maps declared in the cluster file.
#[derive(Debug, Clone, Default)]
pub struct StaticClusterInfo {
    clusters: HashMap<String, BTreeMap<String, String>>,
}

impl StaticClusterInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_clusters(clusters: &[ClusterConfig]) -> Self {
        Self {
            clusters: clusters
                .iter()
                .map(|c| (c.name.clone(), c.info.clone()))
                .collect(),
        }
    }

    pub fn with_cluster(mut self, name: &str, info: BTreeMap<String, String>) -> Self {
        self.clusters.insert(name.to_string(), info);
        self
    }
}

#[async_trait]
impl ClusterInfoSource for StaticClusterInfo {
    async fn cluster_info(&self, cluster: &str) -> Result<BTreeMap<String, String>> {
        self.clusters
            .get(cluster)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("cluster info for {}", cluster)))
    }
}
