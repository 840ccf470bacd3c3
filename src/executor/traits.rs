use super::rest::chronos::ChronosJob;
use super::task::{JobVolume, TaskSpec};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Enum representing the backend an executor drives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Kind {
    K8sJob,
    Chronos,
    Flink,
    Custom(String),
}

impl From<String> for Kind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "k8sjob" => Kind::K8sJob,
            "chronos" => Kind::Chronos,
            "flink" => Kind::Flink,
            _ => Kind::Custom(value),
        }
    }
}

impl From<Kind> for String {
    fn from(value: Kind) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::K8sJob => write!(f, "k8sjob"),
            Kind::Chronos => write!(f, "chronos"),
            Kind::Flink => write!(f, "flink"),
            Kind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Unique executor name, `{cluster}for{kind}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutorName(String);

impl ExecutorName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn for_cluster(cluster: &str, kind: &Kind) -> Self {
        Self(format!("{}for{}", cluster, kind))
    }

    /// Recover the cluster name, if this name was built for `kind`.
    pub fn cluster_name(&self, kind: &Kind) -> Option<&str> {
        self.0
            .strip_suffix(&kind.to_string())
            .and_then(|rest| rest.strip_suffix("for"))
            .filter(|cluster| !cluster.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ExecutorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExecutorName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Normalized task status reported to the pipeline engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Accepted but not yet placed, or queued.
    Unschedulable,
    Running,
    StoppedOnOK,
    StoppedOnFailed,
    StoppedByKilled,
    NotFoundInCluster,
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::StoppedOnOK | TaskStatus::StoppedOnFailed | TaskStatus::StoppedByKilled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Unschedulable => "Unschedulable",
            TaskStatus::Running => "Running",
            TaskStatus::StoppedOnOK => "StoppedOnOK",
            TaskStatus::StoppedOnFailed => "StoppedOnFailed",
            TaskStatus::StoppedByKilled => "StoppedByKilled",
            TaskStatus::NotFoundInCluster => "NotFoundInCluster",
            TaskStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDesc {
    pub status: TaskStatus,
    /// Latest diagnostic explaining the status; empty when there is none.
    #[serde(default)]
    pub last_message: String,
}

impl StatusDesc {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            last_message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.last_message = message.into();
        self
    }
}

/// Backend-native identity of a created job
#[derive(Debug, Clone)]
pub enum NativeJob {
    Kubernetes(Box<Job>),
    Chronos(ChronosJob),
    Flink { job_id: String },
}

impl NativeJob {
    pub fn id(&self) -> &str {
        match self {
            NativeJob::Kubernetes(job) => job.metadata.name.as_deref().unwrap_or_default(),
            NativeJob::Chronos(job) => &job.name,
            NativeJob::Flink { job_id } => job_id,
        }
    }
}

/// Operator-facing description of a task's latest native state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInspect {
    pub description: String,
}

/// Capability contract every backend executor implements
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn kind(&self) -> Kind;

    fn name(&self) -> &ExecutorName;

    /// Create the native job; an existing job for the task is success.
    async fn create(&self, task: &TaskSpec) -> Result<NativeJob>;

    /// Tear down the task and any shared resources it was the last user of.
    async fn remove(&self, task: &TaskSpec) -> Result<Option<String>>;

    /// Stop the job and release per-task resources only.
    async fn destroy(&self, task: &TaskSpec) -> Result<()>;

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc>;

    async fn batch_delete(&self, tasks: &[TaskSpec]) -> Result<()> {
        info!("🗑️ Batch deleting {} tasks via {}", tasks.len(), self.name());
        for task in tasks {
            if task.uuid.is_empty() {
                debug!("⏭️ Skipping task {:?} without uuid", task.name);
                continue;
            }
            self.remove(task).await?;
        }
        Ok(())
    }

    async fn inspect(&self, _task: &TaskSpec) -> Result<TaskInspect> {
        Err(AppError::Unimplemented(format!(
            "inspect is not supported by {} executors",
            self.kind()
        )))
    }

    async fn create_job_volume(&self, _volume: &JobVolume) -> Result<String> {
        Err(AppError::Unimplemented(format!(
            "job volumes are not supported by {} executors",
            self.kind()
        )))
    }
}
