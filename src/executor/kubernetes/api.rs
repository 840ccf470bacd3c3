//! The slice of the Kubernetes API the job executor uses.
//!
//! Executors talk to [`ClusterApi`] rather than to `kube` directly so that
//! lifecycle and status logic can run against an in-memory cluster in tests.

use crate::cluster_info::{ClusterConfig, OPTION_CONTEXT, OPTION_KUBECONFIG};
use crate::config::ExecutorSettings;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Namespace, PersistentVolumeClaim, Pod, Secret};
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::{debug, info};

/// Kubernetes API failure, classified by what the executor needs to tolerate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Attach the object being operated on and lift into [`AppError`].
    pub fn context(self, action: &str, object: &str) -> AppError {
        AppError::KubernetesError(format!("failed to {} {}: {}", action, object, self))
    }
}

impl From<kube::Error> for ApiError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 404 => ApiError::NotFound,
            kube::Error::Api(resp) if resp.code == 409 => ApiError::AlreadyExists,
            _ => ApiError::Other(err.to_string()),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_job(&self, namespace: &str, name: &str) -> ApiResult<Job>;
    async fn create_job(&self, namespace: &str, job: &Job) -> ApiResult<Job>;
    /// Deletes with background propagation so the job's pods go with it.
    async fn delete_job(&self, namespace: &str, name: &str) -> ApiResult<()>;
    async fn list_jobs(&self, namespace: &str) -> ApiResult<Vec<Job>>;

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> ApiResult<Vec<Pod>>;
    async fn list_events(&self, namespace: &str) -> ApiResult<Vec<Event>>;

    async fn get_namespace(&self, name: &str) -> ApiResult<Namespace>;
    async fn create_namespace(&self, namespace: &Namespace) -> ApiResult<Namespace>;
    async fn delete_namespace(&self, name: &str) -> ApiResult<()>;

    async fn get_pvc(&self, namespace: &str, name: &str) -> ApiResult<PersistentVolumeClaim>;
    async fn create_pvc(
        &self,
        namespace: &str,
        pvc: &PersistentVolumeClaim,
    ) -> ApiResult<PersistentVolumeClaim>;
    async fn delete_pvc(&self, namespace: &str, name: &str) -> ApiResult<()>;

    async fn get_secret(&self, namespace: &str, name: &str) -> ApiResult<Secret>;
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> ApiResult<Secret>;
}

/// [`ClusterApi`] backed by a live `kube` client
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the cluster's `kubeconfig`/`context` options, or
    /// from the ambient configuration when no kubeconfig is given.
    pub async fn connect(cluster: &ClusterConfig, settings: &ExecutorSettings) -> Result<Self> {
        let mut config = match cluster.option(OPTION_KUBECONFIG) {
            Some(path) => {
                info!("☸️ Loading kubeconfig {} for cluster {}", path, cluster.name);
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    AppError::ConfigurationError(format!(
                        "failed to read kubeconfig {} for cluster {}: {}",
                        path, cluster.name, e
                    ))
                })?;
                let options = KubeConfigOptions {
                    context: cluster.option(OPTION_CONTEXT).map(str::to_string),
                    ..Default::default()
                };
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| {
                        AppError::ConfigurationError(format!(
                            "invalid kubeconfig for cluster {}: {}",
                            cluster.name, e
                        ))
                    })?
            }
            None => {
                debug!("☸️ Inferring Kubernetes config for cluster {}", cluster.name);
                Config::infer().await.map_err(|e| {
                    AppError::ConfigurationError(format!(
                        "failed to infer Kubernetes config for cluster {}: {}",
                        cluster.name, e
                    ))
                })?
            }
        };
        config.connect_timeout = Some(settings.k8s_connect_timeout);
        config.read_timeout = Some(settings.k8s_read_timeout);

        let client = Client::try_from(config).map_err(|e| {
            AppError::KubernetesError(format!(
                "Failed to create Kubernetes client for cluster {}: {}",
                cluster.name, e
            ))
        })?;
        Ok(Self::new(client))
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pvcs(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_job(&self, namespace: &str, name: &str) -> ApiResult<Job> {
        Ok(self.jobs(namespace).get(name).await?)
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> ApiResult<Job> {
        Ok(self.jobs(namespace).create(&PostParams::default(), job).await?)
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> ApiResult<()> {
        self.jobs(namespace)
            .delete(name, &DeleteParams::background())
            .await?;
        Ok(())
    }

    async fn list_jobs(&self, namespace: &str) -> ApiResult<Vec<Job>> {
        Ok(self.jobs(namespace).list(&ListParams::default()).await?.items)
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> ApiResult<Vec<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods
            .list(&ListParams::default().labels(label_selector))
            .await?
            .items)
    }

    async fn list_events(&self, namespace: &str) -> ApiResult<Vec<Event>> {
        let events: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        Ok(events.list(&ListParams::default()).await?.items)
    }

    async fn get_namespace(&self, name: &str) -> ApiResult<Namespace> {
        Ok(self.namespaces().get(name).await?)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> ApiResult<Namespace> {
        Ok(self
            .namespaces()
            .create(&PostParams::default(), namespace)
            .await?)
    }

    async fn delete_namespace(&self, name: &str) -> ApiResult<()> {
        self.namespaces()
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn get_pvc(&self, namespace: &str, name: &str) -> ApiResult<PersistentVolumeClaim> {
        Ok(self.pvcs(namespace).get(name).await?)
    }

    async fn create_pvc(
        &self,
        namespace: &str,
        pvc: &PersistentVolumeClaim,
    ) -> ApiResult<PersistentVolumeClaim> {
        Ok(self.pvcs(namespace).create(&PostParams::default(), pvc).await?)
    }

    async fn delete_pvc(&self, namespace: &str, name: &str) -> ApiResult<()> {
        self.pvcs(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> ApiResult<Secret> {
        Ok(self.secrets(namespace).get(name).await?)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> ApiResult<Secret> {
        Ok(self
            .secrets(namespace)
            .create(&PostParams::default(), secret)
            .await?)
    }
}
