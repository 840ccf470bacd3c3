//! Kubernetes Job backend.

pub mod api;
pub mod events;
pub mod executor;
pub mod job_builder;
pub mod lifecycle;
pub mod status;
pub mod volumes;

pub use api::{ApiError, ApiResult, ClusterApi, KubeClusterApi};
pub use events::{EventCommentTable, EventDiagnoser};
pub use executor::K8sJobExecutor;
pub use job_builder::JobTranslator;
pub use lifecycle::{Lifecycle, RETAIN_NAMESPACE};
