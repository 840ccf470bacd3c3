//! Namespace and volume lifecycle around a job.
//!
//! Namespaces are shared by every task of a pipeline, so they are created on
//! demand and only torn down once no live Job remains in them. Not-found and
//! already-exists replies are expected under concurrent callers and are
//! never errors here.

use super::api::{ApiError, ClusterApi};
use super::volumes::{build_pvc, claim_names, job_volume_pvc_name, storage_for};
use crate::config::ExecutorSettings;
use crate::error::Result;
use crate::executor::request::JobRequest;
use crate::executor::task::JobVolume;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Task env key that keeps the namespace alive after the last job is removed.
pub const RETAIN_NAMESPACE: &str = "RETAIN_NAMESPACE";

pub struct Lifecycle {
    api: Arc<dyn ClusterApi>,
    settings: ExecutorSettings,
}

impl Lifecycle {
    pub fn new(api: Arc<dyn ClusterApi>, settings: ExecutorSettings) -> Self {
        Self { api, settings }
    }

    pub async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        match self.api.get_namespace(namespace).await {
            Ok(_) => return Ok(()),
            Err(ApiError::NotFound) => {}
            Err(e) => return Err(e.context("get namespace", namespace)),
        }

        info!("📁 Creating namespace {}", namespace);
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match self.api.create_namespace(&ns).await {
            Ok(_) => Ok(()),
            Err(ApiError::AlreadyExists) => {
                debug!("📁 Namespace {} was created concurrently", namespace);
                Ok(())
            }
            Err(e) => Err(e.context("create namespace", namespace)),
        }
    }

    /// Copy the registry credential into `namespace` when it is missing
    /// there. Returns the secret name when pods in `namespace` can use it.
    pub async fn ensure_image_secret(&self, namespace: &str) -> Result<Option<String>> {
        let Some(source) = &self.settings.image_pull_secret else {
            return Ok(None);
        };

        match self.api.get_secret(namespace, &source.name).await {
            Ok(_) => return Ok(Some(source.name.clone())),
            Err(ApiError::NotFound) => {}
            Err(e) => return Err(e.context("get secret", &source.name)),
        }

        let original = match self.api.get_secret(&source.namespace, &source.name).await {
            Ok(secret) => secret,
            Err(ApiError::NotFound) => {
                warn!(
                    "⚠️ Image pull secret {}/{} not found, pods in {} pull anonymously",
                    source.namespace, source.name, namespace
                );
                return Ok(None);
            }
            Err(e) => return Err(e.context("get secret", &source.name)),
        };

        let copy = Secret {
            metadata: ObjectMeta {
                name: Some(source.name.clone()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: original.data,
            string_data: original.string_data,
            type_: original.type_,
            ..Default::default()
        };
        match self.api.create_secret(namespace, &copy).await {
            Ok(_) => info!("🔑 Copied image pull secret {} into {}", source.name, namespace),
            Err(ApiError::AlreadyExists) => {
                debug!("🔑 Image pull secret {} was copied concurrently", source.name)
            }
            Err(e) => return Err(e.context("create secret", &source.name)),
        }
        Ok(Some(source.name.clone()))
    }

    /// Create the claims this attempt owns and return the claim name backing
    /// each request volume, in order.
    pub async fn provision_volumes(&self, request: &JobRequest) -> Result<Vec<String>> {
        let claims = claim_names(&request.namespace, &request.name, &request.volumes);
        for (volume, claim) in request.volumes.iter().zip(&claims) {
            if volume.id.is_some() {
                debug!("♻️ Reusing volume {} for {}", claim, volume.path);
                continue;
            }

            let pvc = build_pvc(&request.namespace, claim, volume.storage, &self.settings);
            match self.api.create_pvc(&request.namespace, &pvc).await {
                Ok(_) => info!("💾 Created volume claim {}", claim),
                Err(ApiError::AlreadyExists) => {
                    warn!("⚠️ Volume claim {} already exists, reusing it", claim)
                }
                Err(e) => return Err(e.context("create pvc", claim)),
            }
        }
        Ok(claims)
    }

    /// Delete the job (pods go with it) and the claims it owns.
    pub async fn release_job(
        &self,
        namespace: &str,
        job_name: &str,
        owned_claims: &[String],
    ) -> Result<()> {
        match self.api.get_job(namespace, job_name).await {
            Ok(job) if job.metadata.deletion_timestamp.is_some() => {
                debug!("⏳ Job {} is already being deleted", job_name);
            }
            Ok(_) => match self.api.delete_job(namespace, job_name).await {
                Ok(()) | Err(ApiError::NotFound) => info!("🗑️ Deleted job {}", job_name),
                Err(e) => return Err(e.context("delete job", job_name)),
            },
            Err(ApiError::NotFound) => debug!("🔍 Job {} is already gone", job_name),
            Err(e) => return Err(e.context("get job", job_name)),
        }

        for claim in owned_claims {
            match self.api.delete_pvc(namespace, claim).await {
                Ok(()) => info!("🗑️ Deleted volume claim {}", claim),
                Err(ApiError::NotFound) => debug!("🔍 Volume claim {} is already gone", claim),
                Err(e) => return Err(e.context("delete pvc", claim)),
            }
        }
        Ok(())
    }

    /// Delete the namespace once no live job remains in it. Returns whether a
    /// delete was issued.
    pub async fn retire_namespace_if_idle(&self, namespace: &str, retain: bool) -> Result<bool> {
        if !self.settings.namespace_teardown_enabled() {
            debug!("📌 Namespace {} is operator-managed, keeping it", namespace);
            return Ok(false);
        }

        let jobs = match self.api.list_jobs(namespace).await {
            Ok(jobs) => jobs,
            Err(ApiError::NotFound) => return Ok(false),
            Err(e) => return Err(e.context("list jobs in namespace", namespace)),
        };
        let remaining = jobs
            .iter()
            .filter(|job| job.metadata.deletion_timestamp.is_none())
            .count();
        if remaining > 0 {
            debug!("📁 Namespace {} still has {} live jobs", namespace, remaining);
            return Ok(false);
        }
        if retain {
            info!("📌 Retaining idle namespace {}", namespace);
            return Ok(false);
        }

        match self.api.get_namespace(namespace).await {
            Ok(ns) if is_terminating(&ns) => {
                debug!("⏳ Namespace {} is already terminating", namespace);
                return Ok(false);
            }
            Ok(_) => {}
            Err(ApiError::NotFound) => return Ok(false),
            Err(e) => return Err(e.context("get namespace", namespace)),
        }

        match self.api.delete_namespace(namespace).await {
            Ok(()) => info!("🗑️ Deleted idle namespace {}", namespace),
            Err(ApiError::NotFound) => debug!("🔍 Namespace {} is already gone", namespace),
            Err(e) => return Err(e.context("delete namespace", namespace)),
        }
        Ok(true)
    }

    /// Get-or-create a standalone claim and return its name.
    pub async fn create_job_volume(&self, volume: &JobVolume) -> Result<String> {
        let namespace = self
            .settings
            .specified_namespace
            .clone()
            .unwrap_or_else(|| volume.namespace.clone());
        self.ensure_namespace(&namespace).await?;

        let name = job_volume_pvc_name(&volume.namespace, &volume.name);
        match self.api.get_pvc(&namespace, &name).await {
            Ok(_) => {
                debug!("♻️ Job volume {} already exists", name);
                return Ok(name);
            }
            Err(ApiError::NotFound) => {}
            Err(e) => return Err(e.context("get pvc", &name)),
        }

        let pvc = build_pvc(&namespace, &name, storage_for(&volume.kind), &self.settings);
        match self.api.create_pvc(&namespace, &pvc).await {
            Ok(_) => info!("💾 Created job volume {} in {}", name, namespace),
            Err(ApiError::AlreadyExists) => warn!("⚠️ Job volume {} was created concurrently", name),
            Err(e) => return Err(e.context("create pvc", &name)),
        }
        Ok(name)
    }
}

fn is_terminating(ns: &Namespace) -> bool {
    ns.metadata.deletion_timestamp.is_some()
        || ns
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .is_some_and(|phase| phase == "Terminating")
}

/// Whether the task asked to keep its namespace. Accepts the usual boolean
/// spellings; anything else counts as false.
pub fn retain_namespace(env: &BTreeMap<String, String>) -> bool {
    match env.get(RETAIN_NAMESPACE).map(|v| v.trim()) {
        None | Some("") => false,
        Some("1" | "t" | "T" | "true" | "TRUE" | "True") => true,
        Some("0" | "f" | "F" | "false" | "FALSE" | "False") => false,
        Some(other) => {
            warn!("⚠️ Ignoring invalid {} value {:?}", RETAIN_NAMESPACE, other);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(value: &str) -> BTreeMap<String, String> {
        [(RETAIN_NAMESPACE.to_string(), value.to_string())].into()
    }

    #[test]
    fn test_retain_namespace_parsing() {
        assert!(!retain_namespace(&BTreeMap::new()));
        assert!(retain_namespace(&env("true")));
        assert!(retain_namespace(&env("1")));
        assert!(!retain_namespace(&env("false")));
        assert!(!retain_namespace(&env("yes please")));
    }

    #[test]
    fn test_terminating_namespace() {
        let mut ns = Namespace::default();
        assert!(!is_terminating(&ns));
        ns.status = Some(k8s_openapi::api::core::v1::NamespaceStatus {
            phase: Some("Terminating".to_string()),
            ..Default::default()
        });
        assert!(is_terminating(&ns));
    }
}
