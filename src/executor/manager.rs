//! Executor manager.
//!
//! Holds every executor built from the cluster file, keyed by name. The map
//! is written once by [`ExecutorManager::initialize`] and read by every
//! lookup afterwards.

use super::factory::ExecutorRegistry;
use super::traits::{ExecutorName, Kind, TaskExecutor};
use crate::cluster_info::{ClusterConfig, ClusterType};
use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Kinds of executor a cluster of the given type runs.
pub fn kinds_for(cluster_type: ClusterType) -> Vec<Kind> {
    match cluster_type {
        ClusterType::Kubernetes => vec![Kind::K8sJob],
        ClusterType::Dcos => vec![Kind::Chronos],
        ClusterType::Flink => vec![Kind::Flink],
        ClusterType::Unknown => Vec::new(),
    }
}

pub struct ExecutorManager {
    registry: ExecutorRegistry,
    executors: RwLock<HashMap<ExecutorName, Arc<dyn TaskExecutor>>>,
}

impl ExecutorManager {
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self {
            registry,
            executors: RwLock::new(HashMap::new()),
        }
    }

    /// Build one executor per (cluster, kind). Any failure aborts the whole
    /// initialization and leaves the manager unchanged.
    pub async fn initialize(&self, clusters: &[ClusterConfig]) -> Result<()> {
        let mut executors = self.executors.write().await;
        let mut built = HashMap::new();

        for cluster in clusters {
            let kinds = kinds_for(cluster.cluster_type);
            if kinds.is_empty() {
                debug!(
                    "⏭️ Skipping cluster {} of unsupported type {:?}",
                    cluster.name, cluster.cluster_type
                );
                continue;
            }

            for kind in kinds {
                let factory = self.registry.get(&kind).ok_or_else(|| {
                    AppError::ConfigurationError(format!(
                        "no executor factory registered for kind {}",
                        kind
                    ))
                })?;
                let name = ExecutorName::for_cluster(&cluster.name, &kind);
                if executors.contains_key(&name) || built.contains_key(&name) {
                    return Err(AppError::ConfigurationError(format!(
                        "duplicate executor name {}",
                        name
                    )));
                }

                let executor = factory
                    .create_executor(name.clone(), cluster)
                    .await
                    .map_err(|e| {
                        error!("❌ Failed to create executor {}: {}", name, e);
                        e
                    })?;
                info!("✅ Registered executor {} ({})", name, kind);
                built.insert(name, executor);
            }
        }

        executors.extend(built);
        info!("🎯 ExecutorManager initialized with {} executors", executors.len());
        Ok(())
    }

    /// Register an already-built executor under its own name.
    pub async fn insert(&self, executor: Arc<dyn TaskExecutor>) -> Result<()> {
        let mut executors = self.executors.write().await;
        let name = executor.name().clone();
        if executors.contains_key(&name) {
            return Err(AppError::ConfigurationError(format!(
                "duplicate executor name {}",
                name
            )));
        }
        executors.insert(name, executor);
        Ok(())
    }

    pub async fn get(&self, name: &ExecutorName) -> Result<Arc<dyn TaskExecutor>> {
        if name.is_empty() {
            return Err(AppError::NotFound("executor name is empty".to_string()));
        }
        self.executors
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("executor {}", name)))
    }

    /// Registered executor names, sorted.
    pub async fn names(&self) -> Vec<ExecutorName> {
        let mut names: Vec<_> = self.executors.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
