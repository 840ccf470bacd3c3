//! Task executors and their registry.
//!
//! An executor turns a [`TaskSpec`] into a job in one backend cluster and
//! reports its status back in backend-neutral terms.

pub mod factory;
pub mod kubernetes;
pub mod manager;
pub mod request;
pub mod rest;
pub mod task;
pub mod template;
pub mod traits;

pub use factory::{ExecutorFactory, ExecutorRegistry};
pub use manager::ExecutorManager;
pub use request::{JobRequest, StorageKind};
pub use task::{Bind, FlinkConf, JobVolume, PreFetcher, TaskSpec, VolumeSpec, VolumeType};
pub use traits::{
    ExecutorName, Kind, NativeJob, StatusDesc, TaskExecutor, TaskInspect, TaskStatus,
};
