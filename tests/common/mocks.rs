use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::batch::v1::{Job, JobStatus};
use k8s_openapi::api::core::v1::{Event, Namespace, PersistentVolumeClaim, Pod, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use task_executor::executor::kubernetes::{ApiError, ApiResult, ClusterApi};
use tokio::sync::RwLock;

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// In-memory Kubernetes cluster
#[derive(Default)]
pub struct MockCluster {
    jobs: Arc<RwLock<HashMap<Key, Job>>>,
    namespaces: Arc<RwLock<HashMap<String, Namespace>>>,
    pvcs: Arc<RwLock<HashMap<Key, PersistentVolumeClaim>>>,
    pods: Arc<RwLock<HashMap<String, Vec<Pod>>>>,
    events: Arc<RwLock<HashMap<String, Vec<Event>>>>,
    secrets: Arc<RwLock<HashMap<Key, Secret>>>,
    call_count: Arc<RwLock<HashMap<String, usize>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    missing: Arc<RwLock<HashSet<String>>>,
    create_race: Arc<RwLock<bool>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record(&self, call: &str) -> ApiResult<()> {
        {
            let mut counts = self.call_count.write().await;
            *counts.entry(call.to_string()).or_insert(0) += 1;
        }
        if self.failing.read().await.contains(call) {
            return Err(ApiError::Other(format!("{} failed", call)));
        }
        if self.missing.read().await.contains(call) {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }

    pub async fn get_call_count(&self, call: &str) -> usize {
        self.call_count.read().await.get(call).copied().unwrap_or(0)
    }

    /// Make every subsequent `call` fail with a server error.
    pub async fn set_failing(&self, call: &str) {
        self.failing.write().await.insert(call.to_string());
    }

    /// Make every subsequent `call` answer not-found, as if the object was
    /// deleted by someone else just before.
    pub async fn set_missing(&self, call: &str) {
        self.missing.write().await.insert(call.to_string());
    }

    /// The next job create stores the job but replies already-exists, as if
    /// a concurrent caller won.
    pub async fn simulate_create_race(&self) {
        *self.create_race.write().await = true;
    }

    pub async fn add_job(&self, job: Job) {
        let namespace = job.metadata.namespace.clone().unwrap_or_default();
        let name = job.metadata.name.clone().unwrap_or_default();
        self.jobs.write().await.insert(key(&namespace, &name), job);
    }

    pub async fn job(&self, namespace: &str, name: &str) -> Option<Job> {
        self.jobs.read().await.get(&key(namespace, name)).cloned()
    }

    pub async fn set_job_status(&self, namespace: &str, name: &str, status: JobStatus) {
        if let Some(job) = self.jobs.write().await.get_mut(&key(namespace, name)) {
            job.status = Some(status);
        }
    }

    pub async fn mark_job_deleting(&self, namespace: &str, name: &str) {
        if let Some(job) = self.jobs.write().await.get_mut(&key(namespace, name)) {
            job.metadata.deletion_timestamp = Some(Time(Utc::now()));
        }
    }

    pub async fn add_namespace(&self, name: &str) {
        let mut ns = Namespace::default();
        ns.metadata.name = Some(name.to_string());
        self.namespaces.write().await.insert(name.to_string(), ns);
    }

    pub async fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.read().await.contains_key(name)
    }

    pub async fn pvc(&self, namespace: &str, name: &str) -> Option<PersistentVolumeClaim> {
        self.pvcs.read().await.get(&key(namespace, name)).cloned()
    }

    pub async fn pvc_names(&self, namespace: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .pvcs
            .read()
            .await
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub async fn add_pod(&self, namespace: &str, pod: Pod) {
        self.pods
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .push(pod);
    }

    pub async fn add_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let mut secret = Secret::default();
        secret.metadata.name = Some(name.to_string());
        secret.metadata.namespace = Some(namespace.to_string());
        secret.type_ = Some("kubernetes.io/dockerconfigjson".to_string());
        secret.string_data = Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self.secrets.write().await.insert(key(namespace, name), secret);
    }

    pub async fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets.read().await.get(&key(namespace, name)).cloned()
    }

    pub async fn add_event(&self, namespace: &str, event: Event) {
        self.events
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .push(event);
    }
}

fn matches_selector(labels: Option<&BTreeMap<String, String>>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.and_then(|l| l.get(k)).map(String::as_str) == Some(v),
            None => false,
        })
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn get_job(&self, namespace: &str, name: &str) -> ApiResult<Job> {
        self.record("get_job").await?;
        self.job(namespace, name).await.ok_or(ApiError::NotFound)
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> ApiResult<Job> {
        self.record("create_job").await?;
        let name = job.metadata.name.clone().unwrap_or_default();
        let mut jobs = self.jobs.write().await;
        let mut race = self.create_race.write().await;
        if *race {
            *race = false;
            jobs.insert(key(namespace, &name), job.clone());
            return Err(ApiError::AlreadyExists);
        }
        if jobs.contains_key(&key(namespace, &name)) {
            return Err(ApiError::AlreadyExists);
        }
        jobs.insert(key(namespace, &name), job.clone());
        Ok(job.clone())
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> ApiResult<()> {
        self.record("delete_job").await?;
        self.jobs
            .write()
            .await
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }

    async fn list_jobs(&self, namespace: &str) -> ApiResult<Vec<Job>> {
        self.record("list_jobs").await?;
        Ok(self
            .jobs
            .read()
            .await
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, job)| job.clone())
            .collect())
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> ApiResult<Vec<Pod>> {
        self.record("list_pods").await?;
        Ok(self
            .pods
            .read()
            .await
            .get(namespace)
            .map(|pods| {
                pods.iter()
                    .filter(|p| matches_selector(p.metadata.labels.as_ref(), label_selector))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_events(&self, namespace: &str) -> ApiResult<Vec<Event>> {
        self.record("list_events").await?;
        Ok(self
            .events
            .read()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_namespace(&self, name: &str) -> ApiResult<Namespace> {
        self.record("get_namespace").await?;
        self.namespaces
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> ApiResult<Namespace> {
        self.record("create_namespace").await?;
        let name = namespace.metadata.name.clone().unwrap_or_default();
        let mut namespaces = self.namespaces.write().await;
        if namespaces.contains_key(&name) {
            return Err(ApiError::AlreadyExists);
        }
        namespaces.insert(name, namespace.clone());
        Ok(namespace.clone())
    }

    async fn delete_namespace(&self, name: &str) -> ApiResult<()> {
        self.record("delete_namespace").await?;
        self.namespaces
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }

    async fn get_pvc(&self, namespace: &str, name: &str) -> ApiResult<PersistentVolumeClaim> {
        self.record("get_pvc").await?;
        self.pvc(namespace, name).await.ok_or(ApiError::NotFound)
    }

    async fn create_pvc(
        &self,
        namespace: &str,
        pvc: &PersistentVolumeClaim,
    ) -> ApiResult<PersistentVolumeClaim> {
        self.record("create_pvc").await?;
        let name = pvc.metadata.name.clone().unwrap_or_default();
        let mut pvcs = self.pvcs.write().await;
        if pvcs.contains_key(&key(namespace, &name)) {
            return Err(ApiError::AlreadyExists);
        }
        pvcs.insert(key(namespace, &name), pvc.clone());
        Ok(pvc.clone())
    }

    async fn delete_pvc(&self, namespace: &str, name: &str) -> ApiResult<()> {
        self.record("delete_pvc").await?;
        self.pvcs
            .write()
            .await
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> ApiResult<Secret> {
        self.record("get_secret").await?;
        self.secret(namespace, name).await.ok_or(ApiError::NotFound)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> ApiResult<Secret> {
        self.record("create_secret").await?;
        let name = secret.metadata.name.clone().unwrap_or_default();
        let mut secrets = self.secrets.write().await;
        if secrets.contains_key(&key(namespace, &name)) {
            return Err(ApiError::AlreadyExists);
        }
        secrets.insert(key(namespace, &name), secret.clone());
        Ok(secret.clone())
    }
}
