use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use task_executor::cluster_info::load_clusters;
use task_executor::{
    ExecutorManager, ExecutorName, ExecutorRegistry, ExecutorSettings, StaticClusterInfo,
    TaskSpec,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Task executor CLI
#[derive(Parser)]
#[command(name = "task-executor")]
#[command(about = "Run pipeline tasks on Kubernetes, Chronos and Flink clusters")]
#[command(version)]
struct Cli {
    /// Cluster definitions file
    #[arg(short, long, env = "EXECUTOR_CLUSTERS")]
    clusters: PathBuf,

    /// Without a command, only build and list the executors
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create the task's job
    Create(TaskArgs),
    /// Print the task's status
    Status(TaskArgs),
    /// Describe the task's latest run
    Inspect(TaskArgs),
    /// Delete the task's job and its resources
    Remove(TaskArgs),
}

#[derive(Args)]
struct TaskArgs {
    /// Executor name, e.g. devfork8sjob
    executor: String,

    /// Task definition (JSON)
    task: PathBuf,
}

async fn read_task(path: &Path) -> anyhow::Result<TaskSpec> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read task file {}", path.display()))?;
    serde_json::from_str(&content).context("invalid task file")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let settings = ExecutorSettings::from_env()?;
    let clusters = load_clusters(&cli.clusters).await?;
    let cluster_info = Arc::new(StaticClusterInfo::from_clusters(&clusters));
    let registry = ExecutorRegistry::builtin(settings, cluster_info)?;

    let manager = ExecutorManager::new(registry);
    manager.initialize(&clusters).await?;
    for name in manager.names().await {
        info!("🚀 Executor ready: {}", name);
    }

    let Some(command) = cli.command else {
        return Ok(());
    };
    let args = match &command {
        Command::Create(args)
        | Command::Status(args)
        | Command::Inspect(args)
        | Command::Remove(args) => args,
    };
    let executor = manager.get(&ExecutorName::new(args.executor.as_str())).await?;
    let task = read_task(&args.task).await?;

    match command {
        Command::Create(_) => {
            let job = executor.create(&task).await?;
            println!("{}", job.id());
        }
        Command::Status(_) => {
            let desc = executor.status(&task).await?;
            println!("{}", serde_json::to_string_pretty(&desc)?);
        }
        Command::Inspect(_) => {
            println!("{}", executor.inspect(&task).await?.description);
        }
        Command::Remove(_) => {
            executor.remove(&task).await?;
            println!("removed {}", task.uuid);
        }
    }
    Ok(())
}
