//! Flink executor, driving the JobManager REST API.
//!
//! Flink assigns job ids on submission, so tasks are addressed by the id the
//! engine stored in `TaskSpec::backend_job_id` after `create`.

use super::{expect_found, expect_success, RestClient};
use crate::config::ExecutorSettings;
use crate::error::{AppError, Result};
use crate::executor::request::{job_name, validate_task};
use crate::executor::task::TaskSpec;
use crate::executor::traits::{
    ExecutorName, Kind, NativeJob, StatusDesc, TaskExecutor, TaskInspect, TaskStatus,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunJarRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    entry_class: &'a str,
    program_args_list: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RunJarResponse {
    jobid: String,
}

#[derive(Debug, Deserialize)]
struct JobDetails {
    #[serde(default)]
    state: String,
}

pub fn state_status(state: &str) -> StatusDesc {
    let status = match state {
        "CREATED" | "INITIALIZING" | "RECONCILING" => TaskStatus::Unschedulable,
        "RUNNING" | "RESTARTING" | "FAILING" | "CANCELLING" => TaskStatus::Running,
        "FINISHED" => TaskStatus::StoppedOnOK,
        "FAILED" => TaskStatus::StoppedOnFailed,
        "CANCELED" | "SUSPENDED" => TaskStatus::StoppedByKilled,
        other => {
            return StatusDesc::new(TaskStatus::Unknown)
                .with_message(format!("unrecognised flink job state {:?}", other))
        }
    };
    StatusDesc::new(status)
}

fn backend_id(task: &TaskSpec) -> Option<&str> {
    task.backend_job_id.as_deref().filter(|id| !id.is_empty())
}

pub struct FlinkExecutor {
    name: ExecutorName,
    client: RestClient,
}

impl FlinkExecutor {
    pub fn new(name: ExecutorName, addr: &str, settings: &ExecutorSettings) -> Result<Self> {
        info!("🌊 Creating flink executor {} at {}", name, addr);
        Ok(Self {
            name,
            client: RestClient::new(addr, settings.rest_timeout)?,
        })
    }

    async fn job_details(&self, job_id: &str) -> Result<Option<serde_json::Value>> {
        let url = self.client.url(&["jobs", job_id])?;
        match expect_found(self.client.get(url).await?, "get flink job").await? {
            Some(response) => Ok(Some(response.json().await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TaskExecutor for FlinkExecutor {
    fn kind(&self) -> Kind {
        Kind::Flink
    }

    fn name(&self) -> &ExecutorName {
        &self.name
    }

    async fn create(&self, task: &TaskSpec) -> Result<NativeJob> {
        validate_task(task)?;
        let job_name = job_name(&task.namespace, &task.uuid);
        let Some(flink) = task.flink.as_ref().filter(|f| !f.jar_resource.is_empty()) else {
            return Err(AppError::ValidationError(format!(
                "flink task {} has no jar resource",
                job_name
            )));
        };

        if let Some(job_id) = backend_id(task) {
            if self.job_details(job_id).await?.is_some() {
                warn!("⚠️ Flink job {} already exists, skipping create", job_id);
                return Ok(NativeJob::Flink {
                    job_id: job_id.to_string(),
                });
            }
        }

        let url = self.client.url(&["jars", &flink.jar_resource, "run"])?;
        let body = RunJarRequest {
            entry_class: &flink.main_class,
            program_args_list: &flink.main_args,
        };
        let response = expect_success(
            self.client.post_json(url, &body).await?,
            &format!("run flink jar {}", flink.jar_resource),
        )
        .await?;
        let run: RunJarResponse = response.json().await?;

        info!("🌊 Submitted flink job {} for task {}", run.jobid, job_name);
        Ok(NativeJob::Flink { job_id: run.jobid })
    }

    async fn remove(&self, task: &TaskSpec) -> Result<Option<String>> {
        self.destroy(task).await?;
        Ok(Some(task.uuid.clone()))
    }

    async fn destroy(&self, task: &TaskSpec) -> Result<()> {
        let Some(job_id) = backend_id(task) else {
            debug!("⏭️ Task {:?} has no flink job id, nothing to cancel", task.name);
            return Ok(());
        };

        let url = self.client.url(&["jobs", job_id, "yarn-cancel"])?;
        match expect_found(self.client.get(url).await?, "cancel flink job").await? {
            Some(_) => info!("🛑 Cancelled flink job {}", job_id),
            None => debug!("🔍 Flink job {} is already gone", job_id),
        }
        Ok(())
    }

    async fn status(&self, task: &TaskSpec) -> Result<StatusDesc> {
        let Some(job_id) = backend_id(task) else {
            return Ok(StatusDesc::new(TaskStatus::NotFoundInCluster));
        };
        match self.job_details(job_id).await? {
            Some(details) => {
                let details: JobDetails = serde_json::from_value(details)?;
                Ok(state_status(&details.state))
            }
            None => Ok(StatusDesc::new(TaskStatus::NotFoundInCluster)),
        }
    }

    async fn inspect(&self, task: &TaskSpec) -> Result<TaskInspect> {
        let job_id = backend_id(task).ok_or_else(|| {
            AppError::NotFound(format!("task {:?} has no flink job id", task.name))
        })?;
        let details = self
            .job_details(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("flink job {}", job_id)))?;
        Ok(TaskInspect {
            description: serde_json::to_string_pretty(&details)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mapping() {
        assert_eq!(state_status("INITIALIZING").status, TaskStatus::Unschedulable);
        assert_eq!(state_status("RESTARTING").status, TaskStatus::Running);
        assert_eq!(state_status("FINISHED").status, TaskStatus::StoppedOnOK);
        assert_eq!(state_status("FAILED").status, TaskStatus::StoppedOnFailed);
        assert_eq!(state_status("CANCELED").status, TaskStatus::StoppedByKilled);

        let unknown = state_status("WEIRD");
        assert_eq!(unknown.status, TaskStatus::Unknown);
        assert!(unknown.last_message.contains("WEIRD"));
    }

    #[test]
    fn test_run_request_omits_empty_entry_class() {
        let args = vec!["--input".to_string(), "s3://bucket".to_string()];
        let body = serde_json::to_value(RunJarRequest {
            entry_class: "",
            program_args_list: &args,
        })
        .unwrap();
        assert!(body.get("entryClass").is_none());
        assert_eq!(body["programArgsList"][1], "s3://bucket");
    }

    #[test]
    fn test_blank_backend_id_is_absent() {
        let mut task = TaskSpec::default();
        assert_eq!(backend_id(&task), None);
        task.backend_job_id = Some(String::new());
        assert_eq!(backend_id(&task), None);
        task.backend_job_id = Some("a1b2".to_string());
        assert_eq!(backend_id(&task), Some("a1b2"));
    }
}
