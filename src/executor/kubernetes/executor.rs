use super::api::{ApiError, ClusterApi};
use super::events::{EventCommentTable, EventDiagnoser};
use super::job_builder::JobTranslator;
use super::lifecycle::{retain_namespace, Lifecycle};
use super::status::{derive_status, pod_selector};
use super::volumes::owned_claims;
use crate::cluster_info::ClusterInfoSource;
use crate::config::ExecutorSettings;
use crate::error::{AppError, Result};
use crate::executor::request::{job_name, task_volumes, validate_task, JobRequest};
use crate::executor::task::{JobVolume, TaskSpec};
use crate::executor::traits::{
    ExecutorName, Kind, NativeJob, StatusDesc, TaskExecutor, TaskInspect, TaskStatus,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ContainerState, Event, Pod};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs tasks as `batch/v1` Jobs in one Kubernetes cluster
pub struct K8sJobExecutor {
    name: ExecutorName,
    cluster_name: String,
    api: Arc<dyn ClusterApi>,
    cluster_info: Arc<dyn ClusterInfoSource>,
    translator: JobTranslator,
    diagnoser: EventDiagnoser,
    lifecycle: Lifecycle,
}

impl K8sJobExecutor {
    pub fn new(
        name: ExecutorName,
        cluster_name: &str,
        api: Arc<dyn ClusterApi>,
        cluster_info: Arc<dyn ClusterInfoSource>,
        settings: ExecutorSettings,
    ) -> Result<Self> {
        Self::with_comment_table(
            name,
            cluster_name,
            api,
            cluster_info,
            settings,
            EventCommentTable::default(),
        )
    }

    pub fn with_comment_table(
        name: ExecutorName,
        cluster_name: &str,
        api: Arc<dyn ClusterApi>,
        cluster_info: Arc<dyn ClusterInfoSource>,
        settings: ExecutorSettings,
        comments: EventCommentTable,
    ) -> Result<Self> {
        info!("☸️ Creating k8sjob executor {} for cluster {}", name, cluster_name);
        Ok(Self {
            name,
            cluster_name: cluster_name.to_string(),
            translator: JobTranslator::new(settings.image_pull_policy)?,
            diagnoser: EventDiagnoser::new(comments)?,
            lifecycle: Lifecycle::new(Arc::clone(&api), settings),
            api,
            cluster_info,
        })
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }
}

#[async_trait]
impl TaskExecutor for K8sJobExecutor {
    fn kind(&self) -> Kind {
        Kind::K8sJob
    }

    fn name(&self) -> &ExecutorName {
        &self.name
    }

    async fn create(&self, task: &TaskSpec) -> Result<NativeJob> {
        let request = JobRequest::from_task(task)?;
        let job_name = request.job_name();
        let namespace = request.namespace.as_str();

        match self.api.get_job(namespace, &job_name).await {
            Ok(existing) if existing.metadata.deletion_timestamp.is_some() => {
                warn!("⚠️ Job {} is still being deleted, cannot create it yet", job_name);
                return Err(AppError::KubernetesError(format!(
                    "job {} is being deleted, retry the create once it is gone",
                    job_name
                )));
            }
            Ok(existing) => {
                warn!("⚠️ Job {} already exists, skipping create", job_name);
                return Ok(NativeJob::Kubernetes(Box::new(existing)));
            }
            Err(ApiError::NotFound) => {}
            Err(e) => return Err(e.context("get job", &job_name)),
        }

        self.lifecycle.ensure_namespace(namespace).await?;
        let image_pull_secret = self.lifecycle.ensure_image_secret(namespace).await?;
        let claims = self.lifecycle.provision_volumes(&request).await?;
        // Facts of the cluster this executor drives, whatever the task claims.
        let cluster_info = self.cluster_info.cluster_info(&self.cluster_name).await?;
        let job = self.translator.translate(
            &request,
            &claims,
            &cluster_info,
            image_pull_secret.as_deref(),
        )?;

        info!("☸️ Creating job {} in namespace {}", job_name, namespace);
        match self.api.create_job(namespace, &job).await {
            Ok(created) => Ok(NativeJob::Kubernetes(Box::new(created))),
            Err(ApiError::AlreadyExists) => {
                warn!("⚠️ Job {} was created concurrently, reusing it", job_name);
                let existing = self
                    .api
                    .get_job(namespace, &job_name)
                    .await
                    .map_err(|e| e.context("get job", &job_name))?;
                Ok(NativeJob::Kubernetes(Box::new(existing)))
            }
            Err(e) => Err(e.context("create job", &job_name)),
        }
    }

    async fn remove(&self, task: &TaskSpec) -> Result<Option<String>> {
        self.destroy(task).await?;
        self.lifecycle
            .retire_namespace_if_idle(&task.namespace, retain_namespace(&task.env))
            .await?;
        Ok(Some(task.uuid.clone()))
    }

    async fn destroy(&self, task: &TaskSpec) -> Result<()> {
        validate_task(task)?;
        let job_name = job_name(&task.namespace, &task.uuid);
        let volumes = task_volumes(task)?;
        let claims = owned_claims(&task.namespace, &task.uuid, &volumes);

        info!("🧹 Releasing job {} and {} volume claims", job_name, claims.len());
        self.lifecycle
            .release_job(&task.namespace, &job_name, &claims)
            .await
    }

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc> {
        validate_task(task)?;
        let job_name = job_name(&task.namespace, &task.uuid);
        let namespace = task.namespace.as_str();

        let job = match self.api.get_job(namespace, &job_name).await {
            Ok(job) => job,
            Err(ApiError::NotFound) => {
                debug!("🔍 Job {} not found in cluster", job_name);
                return Ok(StatusDesc::new(TaskStatus::NotFoundInCluster));
            }
            Err(e) => return Err(e.context("get job", &job_name)),
        };

        let pods = self
            .api
            .list_pods(namespace, &pod_selector(&job))
            .await
            .map_err(|e| e.context("list pods of job", &job_name))?;
        let events = self
            .api
            .list_events(namespace)
            .await
            .map_err(|e| e.context("list events in namespace", namespace))?;

        let last_message = self.diagnoser.last_message(&job_name, &events);
        let desc = derive_status(&job, &pods, last_message);
        debug!("📊 Job {} is {} {:?}", job_name, desc.status, desc.last_message);
        Ok(desc)
    }

    async fn inspect(&self, task: &TaskSpec) -> Result<TaskInspect> {
        validate_task(task)?;
        let job_name = job_name(&task.namespace, &task.uuid);
        let pods = self
            .api
            .list_pods(&task.namespace, &format!("job-name={}", job_name))
            .await
            .map_err(|e| e.context("list pods of job", &job_name))?;
        let Some(pod) = pods.last() else {
            return Err(AppError::NotFound(format!("no pods found for job {}", job_name)));
        };

        let events = self
            .api
            .list_events(&task.namespace)
            .await
            .map_err(|e| e.context("list events in namespace", &task.namespace))?;
        Ok(TaskInspect {
            description: describe_pod(pod, &events),
        })
    }

    async fn create_job_volume(&self, volume: &JobVolume) -> Result<String> {
        self.lifecycle.create_job_volume(volume).await
    }
}

fn describe_pod(pod: &Pod, events: &[Event]) -> String {
    let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
    let spec = pod.spec.clone().unwrap_or_default();
    let status = pod.status.clone().unwrap_or_default();
    let or_none = |v: Option<&str>| v.unwrap_or("<none>").to_string();

    let mut out = String::new();
    let _ = writeln!(out, "Name:       {}", pod_name);
    let _ = writeln!(out, "Namespace:  {}", or_none(pod.metadata.namespace.as_deref()));
    let _ = writeln!(out, "Node:       {}", or_none(spec.node_name.as_deref()));
    let _ = writeln!(out, "Status:     {}", or_none(status.phase.as_deref()));
    let _ = writeln!(out, "Host IP:    {}", or_none(status.host_ip.as_deref()));
    let _ = writeln!(out, "Pod IP:     {}", or_none(status.pod_ip.as_deref()));

    let _ = writeln!(out, "Conditions:");
    for condition in status.conditions.iter().flatten() {
        let _ = writeln!(out, "  {}: {}", condition.type_, condition.status);
    }

    let _ = writeln!(out, "Containers:");
    let statuses = status
        .init_container_statuses
        .iter()
        .flatten()
        .chain(status.container_statuses.iter().flatten());
    for container in statuses {
        let _ = writeln!(
            out,
            "  {}: {} (restarts: {})",
            container.name,
            describe_state(container.state.as_ref()),
            container.restart_count
        );
    }

    let _ = writeln!(out, "Events:");
    let mut pod_events: Vec<&Event> = events
        .iter()
        .filter(|e| e.involved_object.name.as_deref() == Some(pod_name))
        .collect();
    pod_events.sort_by_key(|e| e.last_timestamp.as_ref().map(|t| t.0));
    if pod_events.is_empty() {
        let _ = writeln!(out, "  <none>");
    }
    for event in pod_events {
        let _ = writeln!(
            out,
            "  {} {}: {}",
            or_none(event.type_.as_deref()),
            or_none(event.reason.as_deref()),
            event.message.as_deref().unwrap_or_default()
        );
    }
    out
}

fn describe_state(state: Option<&ContainerState>) -> String {
    let Some(state) = state else {
        return "Unknown".to_string();
    };
    if let Some(waiting) = &state.waiting {
        return format!("Waiting ({})", waiting.reason.as_deref().unwrap_or_default());
    }
    if let Some(terminated) = &state.terminated {
        return format!(
            "Terminated ({}, exit code {})",
            terminated.reason.as_deref().unwrap_or_default(),
            terminated.exit_code
        );
    }
    if state.running.is_some() {
        return "Running".to_string();
    }
    "Unknown".to_string()
}
