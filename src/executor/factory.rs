//! Executor factories and the registry that maps a kind to its factory.
//!
//! The registry is assembled explicitly by [`ExecutorRegistry::builtin`];
//! additional backends register their own factory before the manager is
//! initialized.

use super::kubernetes::{K8sJobExecutor, KubeClusterApi};
use super::rest::{ChronosExecutor, FlinkExecutor};
use super::traits::{ExecutorName, Kind, TaskExecutor};
use crate::cluster_info::{ClusterConfig, ClusterInfoSource, OPTION_ADDR};
use crate::config::ExecutorSettings;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Factory trait for creating executors
#[async_trait]
pub trait ExecutorFactory: Send + Sync {
    /// The kind of executor this factory builds
    fn kind(&self) -> Kind;

    /// Build the executor `name` for `cluster`
    async fn create_executor(
        &self,
        name: ExecutorName,
        cluster: &ClusterConfig,
    ) -> Result<Arc<dyn TaskExecutor>>;
}

fn required_addr<'a>(cluster: &'a ClusterConfig, kind: &Kind) -> Result<&'a str> {
    cluster.option(OPTION_ADDR).ok_or_else(|| {
        AppError::ConfigurationError(format!(
            "missing {} option for {} executor of cluster {}",
            OPTION_ADDR, kind, cluster.name
        ))
    })
}

pub struct K8sJobFactory {
    settings: ExecutorSettings,
    cluster_info: Arc<dyn ClusterInfoSource>,
}

impl K8sJobFactory {
    pub fn new(settings: ExecutorSettings, cluster_info: Arc<dyn ClusterInfoSource>) -> Self {
        Self {
            settings,
            cluster_info,
        }
    }
}

#[async_trait]
impl ExecutorFactory for K8sJobFactory {
    fn kind(&self) -> Kind {
        Kind::K8sJob
    }

    async fn create_executor(
        &self,
        name: ExecutorName,
        cluster: &ClusterConfig,
    ) -> Result<Arc<dyn TaskExecutor>> {
        let api = KubeClusterApi::connect(cluster, &self.settings).await?;
        Ok(Arc::new(K8sJobExecutor::new(
            name,
            &cluster.name,
            Arc::new(api),
            Arc::clone(&self.cluster_info),
            self.settings.clone(),
        )?))
    }
}

pub struct ChronosFactory {
    settings: ExecutorSettings,
    cluster_info: Arc<dyn ClusterInfoSource>,
}

impl ChronosFactory {
    pub fn new(settings: ExecutorSettings, cluster_info: Arc<dyn ClusterInfoSource>) -> Self {
        Self {
            settings,
            cluster_info,
        }
    }
}

#[async_trait]
impl ExecutorFactory for ChronosFactory {
    fn kind(&self) -> Kind {
        Kind::Chronos
    }

    async fn create_executor(
        &self,
        name: ExecutorName,
        cluster: &ClusterConfig,
    ) -> Result<Arc<dyn TaskExecutor>> {
        let addr = required_addr(cluster, &self.kind())?;
        Ok(Arc::new(ChronosExecutor::new(
            name,
            &cluster.name,
            addr,
            Arc::clone(&self.cluster_info),
            &self.settings,
        )?))
    }
}

pub struct FlinkFactory {
    settings: ExecutorSettings,
}

impl FlinkFactory {
    pub fn new(settings: ExecutorSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ExecutorFactory for FlinkFactory {
    fn kind(&self) -> Kind {
        Kind::Flink
    }

    async fn create_executor(
        &self,
        name: ExecutorName,
        cluster: &ClusterConfig,
    ) -> Result<Arc<dyn TaskExecutor>> {
        let addr = required_addr(cluster, &self.kind())?;
        Ok(Arc::new(FlinkExecutor::new(name, addr, &self.settings)?))
    }
}

/// Kind → factory
#[derive(Default)]
pub struct ExecutorRegistry {
    factories: HashMap<Kind, Arc<dyn ExecutorFactory>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the k8sjob, chronos and flink factories.
    pub fn builtin(
        settings: ExecutorSettings,
        cluster_info: Arc<dyn ClusterInfoSource>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(K8sJobFactory::new(
            settings.clone(),
            Arc::clone(&cluster_info),
        )))?;
        registry.register(Arc::new(ChronosFactory::new(settings.clone(), cluster_info)))?;
        registry.register(Arc::new(FlinkFactory::new(settings)))?;
        info!("🏭 Registered built-in executor factories");
        Ok(registry)
    }

    pub fn register(&mut self, factory: Arc<dyn ExecutorFactory>) -> Result<()> {
        let kind = factory.kind();
        if self.factories.contains_key(&kind) {
            return Err(AppError::ConfigurationError(format!(
                "executor factory for kind {} is already registered",
                kind
            )));
        }
        debug!("🏭 Registering executor factory: {}", kind);
        self.factories.insert(kind, factory);
        Ok(())
    }

    pub fn get(&self, kind: &Kind) -> Option<Arc<dyn ExecutorFactory>> {
        self.factories.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<Kind> {
        self.factories.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster_info::{ClusterType, StaticClusterInfo};
    use std::collections::BTreeMap;

    fn registry() -> ExecutorRegistry {
        ExecutorRegistry::builtin(ExecutorSettings::default(), Arc::new(StaticClusterInfo::new()))
            .unwrap()
    }

    #[test]
    fn test_builtin_registers_every_kind() {
        let registry = registry();
        for kind in [Kind::K8sJob, Kind::Chronos, Kind::Flink] {
            assert!(registry.get(&kind).is_some(), "missing {}", kind);
        }
        assert!(registry.get(&Kind::Custom("spark".to_string())).is_none());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = registry();
        let result = registry.register(Arc::new(FlinkFactory::new(ExecutorSettings::default())));
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_rest_factories_need_an_address() {
        let cluster = ClusterConfig {
            name: "legacy".to_string(),
            cluster_type: ClusterType::Dcos,
            options: BTreeMap::new(),
            info: BTreeMap::new(),
        };
        let factory = ChronosFactory::new(
            ExecutorSettings::default(),
            Arc::new(StaticClusterInfo::new()),
        );
        let result = factory
            .create_executor(ExecutorName::for_cluster("legacy", &Kind::Chronos), &cluster)
            .await;
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }
}
