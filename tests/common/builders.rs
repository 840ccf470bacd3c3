use std::collections::BTreeMap;
use task_executor::executor::task::{Bind, FlinkConf, TaskSpec, VolumeSpec, VolumeType, VOLUME_ID_LABEL};

/// Builder for task specs used across executor tests
pub struct TaskBuilder {
    task: TaskSpec,
}

impl TaskBuilder {
    /// A 1 core / 512 MiB task `ns1/abc` on cluster `dev`.
    pub fn new() -> Self {
        Self {
            task: TaskSpec {
                name: "build".to_string(),
                namespace: "ns1".to_string(),
                uuid: "abc".to_string(),
                cluster_name: "dev".to_string(),
                image: "x".to_string(),
                cpu: 1.0,
                memory: 512.0,
                ..Default::default()
            },
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.task.namespace = namespace.to_string();
        self
    }

    pub fn uuid(mut self, uuid: &str) -> Self {
        self.task.uuid = uuid.to_string();
        self
    }

    pub fn cmd(mut self, cmd: &str, args: &[&str]) -> Self {
        self.task.cmd = cmd.to_string();
        self.task.cmd_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn bind(mut self, host_path: &str, container_path: &str) -> Self {
        self.task.binds.push(Bind {
            host_path: host_path.to_string(),
            container_path: container_path.to_string(),
            read_only: false,
        });
        self
    }

    pub fn volume(mut self, kind: VolumeType, optional: bool, id: Option<&str>) -> Self {
        let mut labels = BTreeMap::new();
        if let Some(id) = id {
            labels.insert(VOLUME_ID_LABEL.to_string(), id.to_string());
        }
        self.task.volumes.push(VolumeSpec {
            name: format!("vol{}", self.task.volumes.len()),
            kind,
            path: format!("/data/{}", self.task.volumes.len()),
            optional,
            labels,
        });
        self
    }

    pub fn flink(mut self, jar: &str, main_class: &str, args: &[&str]) -> Self {
        self.task.flink = Some(FlinkConf {
            jar_resource: jar.to_string(),
            main_class: main_class.to_string(),
            main_args: args.iter().map(|a| a.to_string()).collect(),
        });
        self
    }

    pub fn backend_job_id(mut self, id: &str) -> Self {
        self.task.backend_job_id = Some(id.to_string());
        self
    }

    pub fn build(self) -> TaskSpec {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn cluster_info() -> BTreeMap<String, String> {
    [
        ("DICE_CLUSTER_NAME".to_string(), "dev".to_string()),
        ("DICE_STORAGE_MOUNTPOINT".to_string(), "/netdata".to_string()),
    ]
    .into()
}
