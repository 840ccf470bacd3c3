//! Backend-agnostic description of one runnable unit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label carrying the id of a volume provisioned by a previous attempt.
pub const VOLUME_ID_LABEL: &str = "ID";

/// One task attempt as submitted by the pipeline engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub namespace: String,
    pub uuid: String,
    #[serde(default)]
    pub cluster_name: String,
    pub image: String,
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub cmd_args: Vec<String>,
    /// CPU cores.
    pub cpu: f64,
    /// Memory in MiB.
    pub memory: f64,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub binds: Vec<Bind>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default)]
    pub pre_fetcher: Option<PreFetcher>,
    #[serde(default)]
    pub flink: Option<FlinkConf>,
    /// Id assigned by a backend that does not use deterministic names.
    #[serde(default)]
    pub backend_job_id: Option<String>,
}

/// Host path bind. `host_path` may contain `{{.KEY}}` cluster-info placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VolumeType,
    /// Mount path inside the container.
    pub path: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl VolumeSpec {
    pub fn existing_id(&self) -> Option<&str> {
        self.labels.get(VOLUME_ID_LABEL).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VolumeType {
    Nfs,
    Local,
    /// Declared for bookkeeping only, never mounted.
    Fake,
    Other(String),
}

impl From<String> for VolumeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "nfs" => VolumeType::Nfs,
            "local" => VolumeType::Local,
            "fake" => VolumeType::Fake,
            _ => VolumeType::Other(value),
        }
    }
}

impl From<VolumeType> for String {
    fn from(value: VolumeType) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for VolumeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeType::Nfs => write!(f, "nfs"),
            VolumeType::Local => write!(f, "local"),
            VolumeType::Fake => write!(f, "fake"),
            VolumeType::Other(kind) => write!(f, "{}", kind),
        }
    }
}

/// Files fetched into the task before the main container starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreFetcher {
    #[serde(default)]
    pub file_from_image: String,
    #[serde(default)]
    pub file_from_host: String,
    pub container_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlinkConf {
    pub jar_resource: String,
    #[serde(default)]
    pub main_class: String,
    #[serde(default)]
    pub main_args: Vec<String>,
}

/// A volume requested outside of any task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobVolume {
    pub namespace: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VolumeType,
}
