//! Turns pod events into a one-line diagnostic for the pipeline engine.
//!
//! Classification runs in two stages. Reasons whose meaning is obvious map
//! straight to a comment through [`EventCommentTable`]. A few reasons need
//! their message scanned first (scheduling failures, image pull failures).
//! Everything else is dropped.

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Event;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

pub const MSG_IMAGE_NEVER_PULL: &str = "image is not present on the node and the pull policy is Never";
pub const MSG_NETWORK_NOT_READY: &str = "node network is not ready";
pub const MSG_MOUNT_VOLUME: &str = "failed to mount volume";
pub const MSG_ALREADY_MOUNTED_VOLUME: &str = "volume is already mounted";
pub const MSG_NODE_REBOOTED: &str = "node was rebooted";
pub const MSG_NODE_SELECTOR_MISMATCH: &str = "no node matches the node selector";
pub const MSG_INSUFFICIENT_CPU: &str = "insufficient free cpu on nodes";
pub const MSG_INSUFFICIENT_MEMORY: &str = "insufficient free memory on nodes";
pub const MSG_INVALID_IMAGE_NAME: &str = "invalid image name";
pub const MSG_PULL_IMAGE: &str = "failed to pull image";
pub const MSG_OOM_KILLED: &str = "container was killed for running out of memory (OOMKilled)";

/// Event reasons that map straight to a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCommentTable {
    comments: HashMap<String, String>,
}

impl EventCommentTable {
    pub fn new(comments: HashMap<String, String>) -> Self {
        Self { comments }
    }

    pub fn get(&self, reason: &str) -> Option<&str> {
        self.comments.get(reason).map(String::as_str)
    }
}

impl Default for EventCommentTable {
    fn default() -> Self {
        let comments = [
            ("ErrImageNeverPull", MSG_IMAGE_NEVER_PULL),
            ("NetworkNotReady", MSG_NETWORK_NOT_READY),
            ("FailedAttachVolume", MSG_MOUNT_VOLUME),
            ("FailedMount", MSG_MOUNT_VOLUME),
            ("VolumeResizeFailed", MSG_MOUNT_VOLUME),
            ("FileSystemResizeFailed", MSG_MOUNT_VOLUME),
            ("FailedMapVolume", MSG_MOUNT_VOLUME),
            ("AlreadyMountedVolume", MSG_ALREADY_MOUNTED_VOLUME),
            ("Rebooted", MSG_NODE_REBOOTED),
        ]
        .into_iter()
        .map(|(reason, comment)| (reason.to_string(), comment.to_string()))
        .collect();
        Self { comments }
    }
}

#[derive(Debug, Clone)]
pub struct EventDiagnoser {
    table: EventCommentTable,
    nodes_available: Regex,
    selector_mismatch: Regex,
}

impl EventDiagnoser {
    pub fn new(table: EventCommentTable) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                AppError::InternalServerError(format!("Regex compilation failed: {}", e))
            })
        };
        Ok(Self {
            table,
            nodes_available: compile(r"^0/(\d+) nodes are available:\s*\S")?,
            selector_mismatch: compile(
                r"(\d+) node\(s\) didn't match (?:node selector|Pod's node affinity/selector)",
            )?,
        })
    }

    /// Comment for the most recent classifiable event on the job's pods, or
    /// an empty string.
    pub fn last_message(&self, job_name: &str, events: &[Event]) -> String {
        let pod_prefix = format!("{}-", job_name);
        let mut classified: Vec<(Option<DateTime<Utc>>, String)> = events
            .iter()
            .filter(|e| {
                e.involved_object.kind.as_deref() == Some("Pod")
                    && e
                        .involved_object
                        .name
                        .as_deref()
                        .is_some_and(|name| name.starts_with(&pod_prefix))
            })
            .filter_map(|e| {
                let reason = e.reason.as_deref().unwrap_or_default();
                let message = e.message.as_deref().unwrap_or_default();
                self.classify(reason, message)
                    .map(|comment| (event_timestamp(e), comment))
            })
            .collect();

        classified.sort_by_key(|(ts, _)| *ts);
        classified
            .pop()
            .map(|(_, comment)| comment)
            .unwrap_or_default()
    }

    pub fn classify(&self, reason: &str, message: &str) -> Option<String> {
        if let Some(comment) = self.table.get(reason) {
            return Some(comment.to_string());
        }
        let comment = match reason {
            "FailedScheduling" => self.failed_scheduling(message),
            "Failed" => failure_reason(message),
            _ => None,
        };
        if comment.is_none() {
            debug!("🔍 Ignoring unclassified event {}: {}", reason, message);
        }
        comment.map(str::to_string)
    }

    fn failed_scheduling(&self, message: &str) -> Option<&'static str> {
        let total: u32 = self.nodes_available.captures(message)?[1].parse().ok()?;
        let mismatched = self
            .selector_mismatch
            .captures_iter(message)
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .last()
            .unwrap_or(0);

        if total > 0 && total == mismatched {
            Some(MSG_NODE_SELECTOR_MISMATCH)
        } else if message.contains("Insufficient cpu") {
            Some(MSG_INSUFFICIENT_CPU)
        } else if message.contains("Insufficient memory") {
            Some(MSG_INSUFFICIENT_MEMORY)
        } else {
            None
        }
    }
}

/// Comment for an image pull failure message or a terminated container
/// reason.
pub fn failure_reason(message: &str) -> Option<&'static str> {
    if message.contains("InvalidImageName") {
        Some(MSG_INVALID_IMAGE_NAME)
    } else if message.contains("ImagePullBackOff") {
        Some(MSG_PULL_IMAGE)
    } else if message.contains("OOMKilled") {
        Some(MSG_OOM_KILLED)
    } else {
        None
    }
}

fn event_timestamp(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.first_timestamp.as_ref().map(|t| t.0))
}
