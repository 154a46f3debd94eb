mod config;

use clap::{Parser, Subcommand};
use conductor_agent::OpenAiBackend;
use conductor_orchestrator::{OrchestratorManager, RunOutcome};
use conductor_skills::{register_builtins, SkillRegistry};
use conductor_store::{FileJobStore, JobStore};
use config::{ConductorConfig, JobFile};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "conductor", about = "Multi-agent job orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "conductor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a pending job from a TOML job file
    Create {
        /// Job definition (title, goal, user and agents)
        file: PathBuf,
    },
    /// Decompose a pending job's goal into tasks
    Plan { job_id: Uuid },
    /// Run a ready job and stream its events as JSON lines
    Run {
        job_id: Uuid,
        /// Acting user; defaults to the job's owner
        #[arg(long)]
        user: Option<String>,
    },
    /// Print a job with its tasks and attempts
    Show { job_id: Uuid },
    /// List stored jobs, newest first
    List,
    /// Delete a stored job
    Delete { job_id: Uuid },
    /// List the tools agents may use
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut registry = SkillRegistry::new();
    register_builtins(&mut registry);

    if let Commands::Tools = cli.command {
        for descriptor in registry.list_descriptors() {
            println!("{:<16} {}", descriptor.name, descriptor.description);
        }
        return Ok(());
    }

    let config = ConductorConfig::load(&cli.config).await?;
    let store: Arc<dyn JobStore> = Arc::new(FileJobStore::new(config.jobs_dir()).await?);

    match cli.command {
        Commands::Create { file } => {
            let job = JobFile::load(&file).await?.into_job(&registry)?;
            store.create_job(&job).await?;
            info!(job_id = %job.id, agents = job.agents.len(), "Job created");
            println!("{}", job.id);
        }
        Commands::Plan { job_id } => {
            let manager = build_manager(&config, Arc::clone(&store), registry);
            let summary = manager.start_decomposition(job_id).await?;
            let job = store.load_job(job_id).await?;
            println!("Planned {} task(s):", summary.task_count);
            for task in job.ordered_tasks() {
                let agent = job
                    .agent(task.agent_id)
                    .map_or("<unassigned>", |a| a.name.as_str());
                println!("  {}. {} [{agent}]", task.order, task.title);
            }
            if let Some(reasoning) = summary.reasoning {
                println!("\n{reasoning}");
            }
        }
        Commands::Run { job_id, user } => {
            let manager = build_manager(&config, Arc::clone(&store), registry);
            let user = match user {
                Some(user) => user,
                None => store.load_job(job_id).await?.user_id,
            };
            let outcome = run_job(&manager, job_id, &user).await?;
            info!(
                job_id = %job_id,
                outcome = ?outcome,
                agents = %manager.monitor().to_json().await,
                "Run finished"
            );
            if outcome != RunOutcome::Completed {
                anyhow::bail!("Job {job_id} did not complete ({outcome:?})");
            }
        }
        Commands::Show { job_id } => {
            let job = store.load_job(job_id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Commands::List => {
            let jobs = store.list_jobs().await?;
            if jobs.is_empty() {
                println!("No jobs.");
            }
            for job in jobs {
                println!(
                    "{}  {:<10} {:>3} task(s)  {}",
                    job.id,
                    job.status.as_str(),
                    job.tasks.len(),
                    job.title
                );
            }
        }
        Commands::Delete { job_id } => {
            store.delete_job(job_id).await?;
            println!("Deleted {job_id}");
        }
        Commands::Tools => {}
    }

    Ok(())
}

fn build_manager(
    config: &ConductorConfig,
    store: Arc<dyn JobStore>,
    registry: SkillRegistry,
) -> OrchestratorManager {
    let backend = Arc::new(OpenAiBackend::new(config.model.clone()));
    OrchestratorManager::new(store, backend, Arc::new(registry), &config.orchestrator)
}

/// Start the run and print every event until the terminal one.
/// The first Ctrl-C requests cancellation.
async fn run_job(
    manager: &OrchestratorManager,
    job_id: Uuid,
    user: &str,
) -> anyhow::Result<RunOutcome> {
    let (mut events, _subscription) = manager.subscribe_channel(job_id);
    let handle = manager.start_run(job_id, user).await?;
    let mut cancelling = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if event.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !cancelling => {
                signal?;
                warn!(job_id = %job_id, "Interrupted, cancelling run");
                manager.cancel_run(job_id);
                cancelling = true;
            }
        }
    }

    Ok(handle.await?)
}
