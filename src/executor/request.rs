//! Backend-neutral translation of a [`TaskSpec`] into a [`JobRequest`].
//!
//! Every backend starts from the same request so naming, volume filtering
//! and command assembly cannot drift between them.

use super::task::{Bind, FlinkConf, PreFetcher, TaskSpec, VolumeType};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Nfs,
}

/// A volume that survived filtering. `id` is `None` until a claim exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVolume {
    pub path: String,
    pub storage: StorageKind,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// The task uuid; unique within the namespace.
    pub name: String,
    pub namespace: String,
    pub cluster_name: String,
    pub image: String,
    pub cmd: String,
    pub cpu: f64,
    pub memory: f64,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub binds: Vec<Bind>,
    pub volumes: Vec<RequestVolume>,
    pub pre_fetcher: Option<PreFetcher>,
    pub flink: Option<FlinkConf>,
}

/// Deterministic native job name shared by every backend that supports one.
pub fn job_name(namespace: &str, uuid: &str) -> String {
    format!("{}.{}", namespace, uuid)
}

/// Reject tasks that cannot be addressed in any cluster.
pub fn validate_task(task: &TaskSpec) -> Result<()> {
    if task.namespace.is_empty() {
        return Err(AppError::ValidationError(format!(
            "task {:?} missing namespace",
            task.name
        )));
    }
    if task.uuid.is_empty() {
        return Err(AppError::ValidationError(format!(
            "task {:?} missing UUID",
            task.name
        )));
    }
    Ok(())
}

impl JobRequest {
    pub fn from_task(task: &TaskSpec) -> Result<Self> {
        validate_task(task)?;

        if task.cluster_name.is_empty() {
            return Err(AppError::TranslationError(format!(
                "missing cluster name in task {}",
                job_name(&task.namespace, &task.uuid)
            )));
        }

        Ok(Self {
            name: task.uuid.clone(),
            namespace: task.namespace.clone(),
            cluster_name: task.cluster_name.clone(),
            image: task.image.clone(),
            cmd: join_command(&task.cmd, &task.cmd_args),
            cpu: task.cpu,
            memory: task.memory,
            env: task.env.clone(),
            labels: task.labels.clone(),
            binds: task.binds.clone(),
            volumes: task_volumes(task)?,
            pre_fetcher: task.pre_fetcher.clone(),
            flink: task.flink.clone(),
        })
    }

    pub fn job_name(&self) -> String {
        job_name(&self.namespace, &self.name)
    }

    /// Resource environment shared by every backend, in injection order.
    pub fn resource_env(&self) -> Vec<(String, String)> {
        let cpu = format!("{:.6}", self.cpu);
        let mem = format!("{:.6}", self.memory);
        vec![
            ("DICE_CPU_ORIGIN".to_string(), cpu.clone()),
            ("DICE_MEM_ORIGIN".to_string(), mem.clone()),
            ("DICE_CPU_REQUEST".to_string(), cpu.clone()),
            ("DICE_MEM_REQUEST".to_string(), mem.clone()),
            ("DICE_CPU_LIMIT".to_string(), cpu),
            ("DICE_MEM_LIMIT".to_string(), mem),
        ]
    }
}

fn join_command(cmd: &str, args: &[String]) -> String {
    std::iter::once(cmd)
        .chain(args.iter().map(String::as_str))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fake volumes are dropped, and so are optional ones that were never
/// provisioned. The index of a kept volume is its claim index.
pub fn task_volumes(task: &TaskSpec) -> Result<Vec<RequestVolume>> {
    let mut volumes = Vec::with_capacity(task.volumes.len());
    for volume in &task.volumes {
        let storage = match &volume.kind {
            VolumeType::Fake => continue,
            VolumeType::Nfs => StorageKind::Nfs,
            VolumeType::Local => StorageKind::Local,
            VolumeType::Other(kind) => {
                return Err(AppError::UnsupportedVolumeType {
                    volume: volume.name.clone(),
                    kind: kind.clone(),
                })
            }
        };

        let id = volume.existing_id().map(str::to_string);
        if id.is_none() && volume.optional {
            continue;
        }

        volumes.push(RequestVolume {
            path: volume.path.clone(),
            storage,
            id,
        });
    }
    Ok(volumes)
}
