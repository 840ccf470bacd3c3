//! Process-level executor settings.
//!
//! Every toggle the executors honour is read once, here, and handed to the
//! registry. Executors never look at the process environment themselves, so
//! tests can build settings from a plain map.

use crate::error::{AppError, Result};
use crate::executor::request::StorageKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When set, namespaces are operator-managed and never torn down. The value
/// names the namespace standalone job volumes are created in.
pub const ENABLE_SPECIFIED_K8S_NAMESPACE: &str = "ENABLE_SPECIFIED_K8S_NAMESPACE";
/// `Always`, `Never` or `IfNotPresent`.
pub const SPECIFY_IMAGE_PULL_POLICY: &str = "SPECIFY_IMAGE_PULL_POLICY";
pub const K8S_EXECUTOR_CONNECT_TIMEOUT_SEC: &str = "K8S_EXECUTOR_CONNECT_TIMEOUT_SEC";
pub const K8S_EXECUTOR_READ_TIMEOUT_SEC: &str = "K8S_EXECUTOR_READ_TIMEOUT_SEC";
pub const REST_EXECUTOR_TIMEOUT_SEC: &str = "REST_EXECUTOR_TIMEOUT_SEC";
pub const EXECUTOR_PVC_SIZE: &str = "EXECUTOR_PVC_SIZE";
/// Name of the registry credential copied into task namespaces. Set it
/// empty to stop copying.
pub const IMAGE_PULL_SECRET: &str = "IMAGE_PULL_SECRET";
pub const IMAGE_PULL_SECRET_NAMESPACE: &str = "IMAGE_PULL_SECRET_NAMESPACE";

const DEFAULT_PVC_SIZE: &str = "10Gi";
const DEFAULT_IMAGE_PULL_SECRET: &str = "aliyun-registry";
const DEFAULT_IMAGE_PULL_SECRET_NAMESPACE: &str = "default";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;
const DEFAULT_REST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImagePullPolicy {
    Always,
    Never,
    #[default]
    IfNotPresent,
}

impl ImagePullPolicy {
    /// Unknown or empty values fall back to `IfNotPresent`.
    pub fn parse(value: &str) -> Self {
        match value {
            "Always" => ImagePullPolicy::Always,
            "Never" => ImagePullPolicy::Never,
            _ => ImagePullPolicy::IfNotPresent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImagePullPolicy::Always => "Always",
            ImagePullPolicy::Never => "Never",
            ImagePullPolicy::IfNotPresent => "IfNotPresent",
        }
    }
}

/// Storage class names used for provisioned claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClasses {
    pub local: String,
    pub nfs: String,
}

impl Default for StorageClasses {
    fn default() -> Self {
        Self {
            local: "dice-local-volume".to_string(),
            nfs: "dice-nfs-volume".to_string(),
        }
    }
}

impl StorageClasses {
    pub fn class_for(&self, storage: StorageKind) -> &str {
        match storage {
            StorageKind::Nfs => &self.nfs,
            StorageKind::Local => &self.local,
        }
    }
}

/// Where the registry credential shared with task namespaces lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePullSecret {
    pub namespace: String,
    pub name: String,
}

impl Default for ImagePullSecret {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_IMAGE_PULL_SECRET_NAMESPACE.to_string(),
            name: DEFAULT_IMAGE_PULL_SECRET.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub specified_namespace: Option<String>,
    pub image_pull_policy: ImagePullPolicy,
    pub storage_classes: StorageClasses,
    pub pvc_size: String,
    pub image_pull_secret: Option<ImagePullSecret>,
    pub k8s_connect_timeout: Duration,
    pub k8s_read_timeout: Duration,
    pub rest_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            specified_namespace: None,
            image_pull_policy: ImagePullPolicy::IfNotPresent,
            storage_classes: StorageClasses::default(),
            pvc_size: DEFAULT_PVC_SIZE.to_string(),
            image_pull_secret: Some(ImagePullSecret::default()),
            k8s_connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            k8s_read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            rest_timeout: Duration::from_secs(DEFAULT_REST_TIMEOUT_SECS),
        }
    }
}

impl ExecutorSettings {
    /// Read settings from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let specified_namespace = lookup(ENABLE_SPECIFIED_K8S_NAMESPACE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let image_pull_policy = lookup(SPECIFY_IMAGE_PULL_POLICY)
            .map(|v| ImagePullPolicy::parse(v.trim()))
            .unwrap_or_default();

        let pvc_size = lookup(EXECUTOR_PVC_SIZE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.pvc_size);

        let image_pull_secret = match lookup(IMAGE_PULL_SECRET).map(|v| v.trim().to_string()) {
            Some(name) if name.is_empty() => None,
            name => {
                let fallback = ImagePullSecret::default();
                Some(ImagePullSecret {
                    namespace: lookup(IMAGE_PULL_SECRET_NAMESPACE)
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty())
                        .unwrap_or(fallback.namespace),
                    name: name.unwrap_or(fallback.name),
                })
            }
        };

        Ok(Self {
            specified_namespace,
            image_pull_policy,
            storage_classes: defaults.storage_classes,
            pvc_size,
            image_pull_secret,
            k8s_connect_timeout: seconds(&lookup, K8S_EXECUTOR_CONNECT_TIMEOUT_SEC)?
                .unwrap_or(defaults.k8s_connect_timeout),
            k8s_read_timeout: seconds(&lookup, K8S_EXECUTOR_READ_TIMEOUT_SEC)?
                .unwrap_or(defaults.k8s_read_timeout),
            rest_timeout: seconds(&lookup, REST_EXECUTOR_TIMEOUT_SEC)?
                .unwrap_or(defaults.rest_timeout),
        })
    }

    /// Automatic namespace teardown is disabled when the operator pins one.
    pub fn namespace_teardown_enabled(&self) -> bool {
        self.specified_namespace.is_none()
    }
}

fn seconds<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| {
                AppError::ConfigurationError(format!("{} must be a number, got {:?}", key, raw))
            }),
    }
}
