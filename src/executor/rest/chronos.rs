//! Chronos (DC/OS) executor.

use super::{expect_found, expect_success, RestClient};
use crate::cluster_info::ClusterInfoSource;
use crate::config::ExecutorSettings;
use crate::error::{AppError, Result};
use crate::executor::kubernetes::volumes::claim_names;
use crate::executor::request::{job_name, validate_task, JobRequest};
use crate::executor::task::TaskSpec;
use crate::executor::template::HostPathTemplate;
use crate::executor::traits::{
    ExecutorName, Kind, NativeJob, StatusDesc, TaskExecutor, TaskStatus,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run once, one minute after submission.
pub const DEFAULT_SCHEDULE: &str = "R1//PT1M";
const STORAGE_MOUNTPOINT_KEY: &str = "DICE_STORAGE_MOUNTPOINT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChronosJob {
    pub name: String,
    pub command: String,
    pub shell: bool,
    pub schedule: String,
    pub owner: String,
    pub container: ChronosContainer,
    pub cpus: f64,
    pub mem: f64,
    pub environment_variables: Vec<ChronosEnv>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChronosContainer {
    #[serde(rename = "type")]
    pub kind: String,
    pub image: String,
    pub force_pull_image: bool,
    pub network: String,
    pub volumes: Vec<ChronosVolume>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChronosVolume {
    pub container_path: String,
    pub host_path: String,
    /// `RW` or `RO`.
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChronosEnv {
    pub name: String,
    pub value: String,
}

/// One entry of `/v1/scheduler/jobs/summary`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobSummary {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub schedule: String,
}

#[derive(Debug, Default, Deserialize)]
struct Summary {
    #[serde(default)]
    jobs: Vec<JobSummary>,
}

pub fn summary_status(summary: Option<&JobSummary>) -> StatusDesc {
    let Some(job) = summary else {
        return StatusDesc::new(TaskStatus::NotFoundInCluster);
    };

    let status = if job.state.contains("running") {
        TaskStatus::Running
    } else if job.state == "queued" {
        TaskStatus::Unschedulable
    } else if job.status == "success" {
        TaskStatus::StoppedOnOK
    } else if job.status == "failure" {
        TaskStatus::StoppedOnFailed
    } else if job.status == "fresh" && job.state == "idle" {
        // Never ran: still waiting for its slot, or the schedule was changed to stop it.
        if job.schedule == DEFAULT_SCHEDULE {
            TaskStatus::Unschedulable
        } else {
            TaskStatus::StoppedByKilled
        }
    } else {
        return StatusDesc::new(TaskStatus::Unknown).with_message(format!(
            "unrecognised chronos job, status: {:?}, state: {:?}, schedule: {:?}",
            job.status, job.state, job.schedule
        ));
    };
    StatusDesc::new(status)
}

pub struct ChronosExecutor {
    name: ExecutorName,
    cluster_name: String,
    client: RestClient,
    cluster_info: Arc<dyn ClusterInfoSource>,
    template: HostPathTemplate,
}

impl ChronosExecutor {
    pub fn new(
        name: ExecutorName,
        cluster_name: &str,
        addr: &str,
        cluster_info: Arc<dyn ClusterInfoSource>,
        settings: &ExecutorSettings,
    ) -> Result<Self> {
        info!("🕰️ Creating chronos executor {} at {}", name, addr);
        Ok(Self {
            name,
            cluster_name: cluster_name.to_string(),
            client: RestClient::new(addr, settings.rest_timeout)?,
            cluster_info,
            template: HostPathTemplate::new()?,
        })
    }

    pub fn build_job(
        &self,
        request: &JobRequest,
        cluster_info: &BTreeMap<String, String>,
    ) -> Result<ChronosJob> {
        let mut volumes = Vec::new();
        for bind in &request.binds {
            if bind.host_path.is_empty() || bind.container_path.is_empty() {
                warn!("⚠️ Skipping invalid bind for job {}", request.job_name());
                continue;
            }
            volumes.push(ChronosVolume {
                container_path: bind.container_path.clone(),
                host_path: self.template.render(&bind.host_path, cluster_info)?,
                mode: if bind.read_only { "RO" } else { "RW" }.to_string(),
            });
        }

        if !request.volumes.is_empty() {
            let mountpoint = cluster_info.get(STORAGE_MOUNTPOINT_KEY).ok_or_else(|| {
                AppError::TranslationError(format!(
                    "cluster {} has no {}, cannot place volumes",
                    self.cluster_name, STORAGE_MOUNTPOINT_KEY
                ))
            })?;
            // Same per-attempt naming as claims, so retries land on the same directory.
            let ids = claim_names(&request.namespace, &request.name, &request.volumes);
            for (volume, id) in request.volumes.iter().zip(ids) {
                volumes.push(ChronosVolume {
                    container_path: volume.path.clone(),
                    host_path: format!("{}/devops/ci/pipelines/{}", mountpoint, id),
                    mode: "RW".to_string(),
                });
            }
        }

        if let Some(pre_fetcher) = &request.pre_fetcher {
            if !pre_fetcher.file_from_host.is_empty() {
                volumes.push(ChronosVolume {
                    container_path: pre_fetcher.container_path.clone(),
                    host_path: pre_fetcher.file_from_host.clone(),
                    mode: "RO".to_string(),
                });
            }
        }

        let mut seen = HashSet::new();
        let environment_variables = request
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(request.resource_env())
            .chain(std::iter::once(("IS_K8S".to_string(), "false".to_string())))
            .chain(cluster_info.iter().map(|(k, v)| (k.clone(), v.clone())))
            .filter(|(name, _)| seen.insert(name.clone()))
            .map(|(name, value)| ChronosEnv { name, value })
            .collect();

        Ok(ChronosJob {
            name: request.job_name(),
            command: request.cmd.clone(),
            shell: true,
            schedule: DEFAULT_SCHEDULE.to_string(),
            owner: String::new(),
            container: ChronosContainer {
                kind: "DOCKER".to_string(),
                image: request.image.clone(),
                force_pull_image: true,
                network: "BRIDGE".to_string(),
                volumes,
            },
            cpus: request.cpu,
            mem: request.memory,
            environment_variables,
        })
    }

    async fn summary(&self, job_name: &str) -> Result<Option<JobSummary>> {
        let url = self.client.url(&["v1", "scheduler", "jobs", "summary"])?;
        let response = expect_success(self.client.get(url).await?, "list chronos jobs").await?;
        let summary: Summary = response.json().await?;
        Ok(summary.jobs.into_iter().find(|job| job.name == job_name))
    }
}

#[async_trait]
impl TaskExecutor for ChronosExecutor {
    fn kind(&self) -> Kind {
        Kind::Chronos
    }

    fn name(&self) -> &ExecutorName {
        &self.name
    }

    async fn create(&self, task: &TaskSpec) -> Result<NativeJob> {
        let request = JobRequest::from_task(task)?;
        let cluster_info = self.cluster_info.cluster_info(&self.cluster_name).await?;
        let job = self.build_job(&request, &cluster_info)?;

        if self.summary(&job.name).await?.is_some() {
            warn!("⚠️ Chronos job {} already exists, skipping create", job.name);
            return Ok(NativeJob::Chronos(job));
        }

        info!("🕰️ Submitting chronos job {}", job.name);
        let url = self.client.url(&["v1", "scheduler", "iso8601"])?;
        expect_success(
            self.client.post_json(url, &job).await?,
            &format!("create chronos job {}", job.name),
        )
        .await?;
        Ok(NativeJob::Chronos(job))
    }

    async fn remove(&self, task: &TaskSpec) -> Result<Option<String>> {
        self.destroy(task).await?;
        Ok(Some(task.uuid.clone()))
    }

    async fn destroy(&self, task: &TaskSpec) -> Result<()> {
        validate_task(task)?;
        let job_name = job_name(&task.namespace, &task.uuid);

        let kill = self.client.url(&["v1", "scheduler", "task", "kill", &job_name])?;
        if expect_found(self.client.delete(kill).await?, "kill chronos tasks")
            .await?
            .is_none()
        {
            debug!("🔍 Chronos job {} has no tasks to kill", job_name);
        }

        let delete = self.client.url(&["v1", "scheduler", "job", &job_name])?;
        match expect_found(self.client.delete(delete).await?, "delete chronos job").await? {
            Some(_) => info!("🗑️ Deleted chronos job {}", job_name),
            None => debug!("🔍 Chronos job {} is already gone", job_name),
        }
        Ok(())
    }

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc> {
        validate_task(task)?;
        let job_name = job_name(&task.namespace, &task.uuid);
        let summary = self.summary(&job_name).await?;
        Ok(summary_status(summary.as_ref()))
    }
}
