//! Task executor - runs pipeline tasks on Kubernetes, Chronos and Flink
//!
//! This library translates backend-neutral task specs into native jobs,
//! manages the namespaces and volumes around them, and reports their status
//! back in a common vocabulary.

pub mod cluster_info;
pub mod config;
pub mod error;
pub mod executor;

// Re-export commonly used types
pub use cluster_info::{ClusterConfig, ClusterInfoSource, ClusterType, StaticClusterInfo};
pub use config::ExecutorSettings;
pub use error::{AppError, Result};
pub use executor::{
    ExecutorManager, ExecutorName, ExecutorRegistry, Kind, StatusDesc, TaskExecutor, TaskSpec,
    TaskStatus,
};
