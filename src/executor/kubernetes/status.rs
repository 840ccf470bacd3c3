//! Job status derivation.
//!
//! `derive_status` is a pure function of the Job, its pods and the event
//! diagnostic, so every branch can be tested without a cluster.

use super::events::failure_reason;
use crate::executor::traits::{StatusDesc, TaskStatus};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;

/// Label selector matching the pods of `job`.
pub fn pod_selector(job: &Job) -> String {
    let match_labels = job
        .spec
        .as_ref()
        .and_then(|spec| spec.selector.as_ref())
        .and_then(|selector| selector.match_labels.as_ref())
        .filter(|labels| !labels.is_empty());

    match match_labels {
        Some(labels) => labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(","),
        None => format!(
            "job-name={}",
            job.metadata.name.as_deref().unwrap_or_default()
        ),
    }
}

pub fn derive_status(job: &Job, pods: &[Pod], last_message: String) -> StatusDesc {
    let job_status = job.status.clone().unwrap_or_default();
    // Not started yet: pods and events of a previous attempt say nothing.
    if job_status.start_time.is_none() {
        return StatusDesc::new(TaskStatus::Unschedulable);
    }

    let mut last_message = last_message;
    let mut pods_pending = false;
    for pod in pods {
        let Some(status) = pod.status.as_ref() else {
            continue;
        };
        if status.phase.as_deref() == Some("Pending") {
            pods_pending = true;
        }
        // A container that died for a known reason explains more than any event.
        for container in status.container_statuses.iter().flatten() {
            let terminated = container
                .state
                .as_ref()
                .and_then(|state| state.terminated.as_ref());
            if let Some(terminated) = terminated.filter(|t| t.exit_code != 0) {
                if let Some(comment) = terminated.reason.as_deref().and_then(failure_reason) {
                    last_message = comment.to_string();
                }
            }
        }
    }

    let completions = job
        .spec
        .as_ref()
        .and_then(|spec| spec.completions)
        .unwrap_or(1);

    let status = if job_status.failed.unwrap_or(0) > 0 {
        TaskStatus::StoppedOnFailed
    } else if job_status.completion_time.is_none() {
        if job_status.active.unwrap_or(0) > 0 && !pods_pending {
            TaskStatus::Running
        } else {
            TaskStatus::Unschedulable
        }
    } else if job_status.succeeded.unwrap_or(0) >= completions {
        TaskStatus::StoppedOnOK
    } else {
        TaskStatus::StoppedOnFailed
    };

    StatusDesc::new(status).with_message(last_message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use k8s_openapi::api::batch::v1::{JobSpec, JobStatus};
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateTerminated, ContainerStatus, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, Time};

    fn job(status: JobStatus) -> Job {
        Job {
            metadata: ObjectMeta {
                name: Some("ns1.abc".to_string()),
                ..Default::default()
            },
            spec: Some(JobSpec {
                completions: Some(1),
                ..Default::default()
            }),
            status: Some(status),
        }
    }

    fn now() -> Option<Time> {
        Some(Time(Utc::now()))
    }

    fn pod(phase: &str) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_not_started_is_unschedulable() {
        let desc = derive_status(&job(JobStatus::default()), &[], "waiting".to_string());
        assert_eq!(desc.status, TaskStatus::Unschedulable);
        assert_eq!(desc.last_message, "");
    }

    #[test]
    fn test_failed_pod_before_completion_is_failure() {
        let status = JobStatus {
            start_time: now(),
            failed: Some(1),
            ..Default::default()
        };
        let desc = derive_status(&job(status), &[], String::new());
        assert_eq!(desc.status, TaskStatus::StoppedOnFailed);
    }

    #[test]
    fn test_active_job_is_running_unless_pod_pending() {
        let status = JobStatus {
            start_time: now(),
            active: Some(1),
            ..Default::default()
        };
        let running = derive_status(&job(status.clone()), &[pod("Running")], String::new());
        assert_eq!(running.status, TaskStatus::Running);

        let pending = derive_status(&job(status), &[pod("Pending")], String::new());
        assert_eq!(pending.status, TaskStatus::Unschedulable);
    }

    #[test]
    fn test_completed_job() {
        let status = JobStatus {
            start_time: now(),
            completion_time: now(),
            succeeded: Some(1),
            ..Default::default()
        };
        assert_eq!(
            derive_status(&job(status), &[], String::new()).status,
            TaskStatus::StoppedOnOK
        );

        let status = JobStatus {
            start_time: now(),
            completion_time: now(),
            succeeded: Some(0),
            ..Default::default()
        };
        assert_eq!(
            derive_status(&job(status), &[], String::new()).status,
            TaskStatus::StoppedOnFailed
        );
    }

    #[test]
    fn test_missing_completions_defaults_to_one() {
        let mut j = job(JobStatus {
            start_time: now(),
            completion_time: now(),
            succeeded: Some(1),
            ..Default::default()
        });
        j.spec = None;
        assert_eq!(derive_status(&j, &[], String::new()).status, TaskStatus::StoppedOnOK);
    }

    #[test]
    fn test_oom_killed_container_overrides_event_message() {
        let mut p = pod("Failed");
        if let Some(status) = p.status.as_mut() {
            status.container_statuses = Some(vec![ContainerStatus {
                name: "abc".to_string(),
                state: Some(ContainerState {
                    terminated: Some(ContainerStateTerminated {
                        exit_code: 137,
                        reason: Some("OOMKilled".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]);
        }
        let status = JobStatus {
            start_time: now(),
            failed: Some(1),
            ..Default::default()
        };
        let desc = derive_status(&job(status), &[p], "failed to mount volume".to_string());
        assert_eq!(desc.status, TaskStatus::StoppedOnFailed);
        assert!(desc.last_message.contains("OOMKilled"));
    }

    #[test]
    fn test_pod_selector_prefers_job_match_labels() {
        let mut j = job(JobStatus::default());
        assert_eq!(pod_selector(&j), "job-name=ns1.abc");

        if let Some(spec) = j.spec.as_mut() {
            spec.selector = Some(LabelSelector {
                match_labels: Some([("controller-uid".to_string(), "u-1".to_string())].into()),
                ..Default::default()
            });
        }
        assert_eq!(pod_selector(&j), "controller-uid=u-1");
    }
}
