use crate::config::ExecutorSettings;
use crate::executor::request::{RequestVolume, StorageKind};
use crate::executor::task::VolumeType;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Claim name for the `index`-th volume of a task attempt.
pub fn pvc_name(namespace: &str, uuid: &str, index: usize) -> String {
    format!("{}-{}-{}", namespace, uuid, index)
}

/// Claim name for a standalone job volume.
pub fn job_volume_pvc_name(namespace: &str, name: &str) -> String {
    format!("{}-{}", namespace, name)
}

/// Claim backing each volume: the existing id, or the claim this attempt
/// provisions for it.
pub fn claim_names(namespace: &str, uuid: &str, volumes: &[RequestVolume]) -> Vec<String> {
    volumes
        .iter()
        .enumerate()
        .map(|(i, v)| v.id.clone().unwrap_or_else(|| pvc_name(namespace, uuid, i)))
        .collect()
}

/// Claims owned by this attempt. Reused claims belong to an earlier
/// attempt and are left alone.
pub fn owned_claims(namespace: &str, uuid: &str, volumes: &[RequestVolume]) -> Vec<String> {
    volumes
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let name = pvc_name(namespace, uuid, i);
            match &v.id {
                Some(id) if *id != name => None,
                _ => Some(name),
            }
        })
        .collect()
}

pub fn storage_for(kind: &VolumeType) -> StorageKind {
    match kind {
        VolumeType::Nfs => StorageKind::Nfs,
        _ => StorageKind::Local,
    }
}

pub fn build_pvc(
    namespace: &str,
    name: &str,
    storage: StorageKind,
    settings: &ExecutorSettings,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(
                    [("storage".to_string(), Quantity(settings.pvc_size.clone()))].into(),
                ),
                ..Default::default()
            }),
            storage_class_name: Some(settings.storage_classes.class_for(storage).to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(id: Option<&str>) -> RequestVolume {
        RequestVolume {
            path: "/data".to_string(),
            storage: StorageKind::Nfs,
            id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_claim_names_prefer_existing_ids() {
        let volumes = vec![volume(None), volume(Some("shared-cache"))];
        assert_eq!(
            claim_names("ns1", "abc", &volumes),
            vec!["ns1-abc-0".to_string(), "shared-cache".to_string()]
        );
    }

    #[test]
    fn test_owned_claims_skip_reused_volumes() {
        let volumes = vec![
            volume(None),
            volume(Some("shared-cache")),
            volume(Some("ns1-abc-2")),
        ];
        assert_eq!(
            owned_claims("ns1", "abc", &volumes),
            vec!["ns1-abc-0".to_string(), "ns1-abc-2".to_string()]
        );
    }

    #[test]
    fn test_build_pvc_uses_settings() {
        let settings = ExecutorSettings::default();
        let pvc = build_pvc("ns1", "ns1-abc-0", StorageKind::Nfs, &settings);
        let spec = pvc.spec.unwrap();
        assert_eq!(spec.storage_class_name.as_deref(), Some("dice-nfs-volume"));
        assert_eq!(spec.access_modes, Some(vec!["ReadWriteOnce".to_string()]));
        let requests = spec.resources.unwrap().requests.unwrap();
        assert_eq!(requests["storage"], Quantity("10Gi".to_string()));
    }

    #[test]
    fn test_unknown_job_volume_types_use_local_storage() {
        assert_eq!(storage_for(&VolumeType::Nfs), StorageKind::Nfs);
        assert_eq!(storage_for(&VolumeType::Local), StorageKind::Local);
        assert_eq!(storage_for(&VolumeType::Other("ceph".into())), StorageKind::Local);
    }
}
