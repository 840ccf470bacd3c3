//! `JobRequest` → `batch/v1` Job.

use crate::config::ImagePullPolicy;
use crate::error::Result;
use crate::executor::request::JobRequest;
use crate::executor::template::HostPathTemplate;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, EnvVarSource, HostPathVolumeSource,
    LocalObjectReference, ObjectFieldSelector, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec,
    ResourceRequirements, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error};

pub const JOB_POD_LABEL: &str = "dice/job";
pub const PRE_FETCH_CONTAINER: &str = "pre-fetch-container";
pub const PRE_FETCH_VOLUME: &str = "pre-fetch-volume";

/// Translates job requests into Kubernetes Jobs for one cluster
#[derive(Debug, Clone)]
pub struct JobTranslator {
    image_pull_policy: ImagePullPolicy,
    template: HostPathTemplate,
}

impl JobTranslator {
    pub fn new(image_pull_policy: ImagePullPolicy) -> Result<Self> {
        Ok(Self {
            image_pull_policy,
            template: HostPathTemplate::new()?,
        })
    }

    /// `claims[i]` is the claim backing `request.volumes[i]`.
    pub fn translate(
        &self,
        request: &JobRequest,
        claims: &[String],
        cluster_info: &BTreeMap<String, String>,
        image_pull_secret: Option<&str>,
    ) -> Result<Job> {
        let job_name = request.job_name();
        debug!("🔧 Translating task {} into Kubernetes job", job_name);

        let resources = resources(request);
        let env = container_env(request, cluster_info);

        let mut volumes = Vec::new();
        let mut mounts = Vec::new();

        for (i, (volume, claim)) in request.volumes.iter().zip(claims).enumerate() {
            let name = format!("vol-{}", i);
            volumes.push(Volume {
                name: name.clone(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: claim.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            });
            mounts.push(VolumeMount {
                name,
                mount_path: volume.path.clone(),
                ..Default::default()
            });
        }

        for (i, bind) in request.binds.iter().enumerate() {
            if bind.host_path.is_empty() || bind.container_path.is_empty() {
                error!(
                    "❌ Skipping invalid bind for job {}: hostPath {:?}, containerPath {:?}",
                    job_name, bind.host_path, bind.container_path
                );
                continue;
            }
            let host_path = self.template.render(&bind.host_path, cluster_info)?;
            let name = format!("volume{}", i);
            volumes.push(Volume {
                name: name.clone(),
                host_path: Some(HostPathVolumeSource {
                    path: host_path,
                    ..Default::default()
                }),
                ..Default::default()
            });
            mounts.push(VolumeMount {
                name,
                mount_path: bind.container_path.clone(),
                read_only: Some(bind.read_only),
                ..Default::default()
            });
        }

        let mut init_containers = Vec::new();
        if let Some(pre_fetcher) = &request.pre_fetcher {
            let mount = VolumeMount {
                name: PRE_FETCH_VOLUME.to_string(),
                mount_path: pre_fetcher.container_path.clone(),
                read_only: Some(false),
                ..Default::default()
            };
            init_containers.push(Container {
                name: PRE_FETCH_CONTAINER.to_string(),
                image: Some(pre_fetcher.file_from_image.clone()),
                resources: Some(resources.clone()),
                image_pull_policy: Some(self.image_pull_policy.as_str().to_string()),
                env: Some(env.clone()),
                volume_mounts: Some(vec![mount.clone()]),
                ..Default::default()
            });
            mounts.push(mount);
            volumes.push(Volume {
                name: PRE_FETCH_VOLUME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            });
        }

        let command = (!request.cmd.is_empty())
            .then(|| vec!["sh".to_string(), "-c".to_string(), request.cmd.clone()]);

        let container = Container {
            name: request.name.clone(),
            image: Some(request.image.clone()),
            command,
            env: Some(env),
            resources: Some(resources),
            image_pull_policy: Some(self.image_pull_policy.as_str().to_string()),
            volume_mounts: Some(mounts),
            ..Default::default()
        };

        let pod_template = PodTemplateSpec {
            metadata: Some(ObjectMeta {
                name: Some(request.name.clone()),
                namespace: Some(request.namespace.clone()),
                labels: Some([(JOB_POD_LABEL.to_string(), String::new())].into()),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                containers: vec![container],
                init_containers: (!init_containers.is_empty()).then_some(init_containers),
                restart_policy: Some("Never".to_string()),
                volumes: Some(volumes),
                image_pull_secrets: image_pull_secret.map(|name| {
                    vec![LocalObjectReference {
                        name: name.to_string(),
                    }]
                }),
                enable_service_links: Some(false),
                share_process_namespace: Some(false),
                ..Default::default()
            }),
        };

        Ok(Job {
            metadata: ObjectMeta {
                name: Some(job_name),
                namespace: Some(request.namespace.clone()),
                ..Default::default()
            },
            spec: Some(JobSpec {
                parallelism: Some(1),
                completions: Some(1),
                // Either success or failure, never a retry.
                backoff_limit: Some(0),
                template: pod_template,
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

fn resources(request: &JobRequest) -> ResourceRequirements {
    let cpu = Quantity(format!("{}m", (request.cpu * 1000.0) as i64));
    let memory = Quantity(format!("{}Mi", request.memory as i64));
    let list: BTreeMap<String, Quantity> = [
        ("cpu".to_string(), cpu),
        ("memory".to_string(), memory),
    ]
    .into();
    ResourceRequirements {
        requests: Some(list.clone()),
        limits: Some(list),
        ..Default::default()
    }
}

fn field_ref(name: &str, path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: Some("v1".to_string()),
                field_path: path.to_string(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn plain(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

/// User env, then executor-provided env, then cluster info. A name is
/// emitted once, first declaration wins.
fn container_env(request: &JobRequest, cluster_info: &BTreeMap<String, String>) -> Vec<EnvVar> {
    let mut fixed = vec![
        plain("IS_K8S", "true"),
        plain("DICE_NAMESPACE", &request.namespace),
        field_ref("HOST_IP", "status.hostIP"),
        field_ref("POD_IP", "status.podIP"),
    ];
    fixed.extend(
        request
            .resource_env()
            .iter()
            .map(|(name, value)| plain(name, value)),
    );

    let mut seen = HashSet::new();
    request
        .env
        .iter()
        .map(|(name, value)| plain(name, value))
        .chain(fixed)
        .chain(cluster_info.iter().map(|(name, value)| plain(name, value)))
        .filter(|var| seen.insert(var.name.clone()))
        .collect()
}
