use anyhow::{Context, Result};
use conformance_orchestrator::{
    cli::{
        commands::{HistoryCommand, PlanCommand, RunCommand, TargetArgs},
        output::*,
        Cli, Command,
    },
    execution::{ExecutionEngine, Orchestrator},
    gcp::{
        secret_manager::SecretManagerClient, CredentialProvider, DataprocClient, DataprocSettings,
        GcloudCredentialProvider, GcsObjectStore, LocalObjectStore, ObjectStore,
        StaticCredentialProvider,
    },
    persistence::{create_summary, PersistenceBackend, RunSummary},
};
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Plan(cmd) => plan_pipeline(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// A pre-issued token from the environment, else the gcloud CLI
fn credential_provider() -> Arc<dyn CredentialProvider> {
    match StaticCredentialProvider::from_env() {
        Some(provider) => {
            debug!("Using access token from the environment");
            Arc::new(provider)
        }
        None => Arc::new(GcloudCredentialProvider::default()),
    }
}

fn object_store(target: &TargetArgs, credentials: Arc<dyn CredentialProvider>) -> Arc<dyn ObjectStore> {
    match &target.local_store {
        Some(root) => {
            println!(
                "{} Reading configuration from {}",
                INFO,
                style(root.display()).dim()
            );
            Arc::new(LocalObjectStore::new(root))
        }
        None => Arc::new(GcsObjectStore::new(credentials)),
    }
}

fn orchestrator(target: &TargetArgs, credentials: Arc<dyn CredentialProvider>) -> Orchestrator {
    Orchestrator::new(
        object_store(target, credentials.clone()),
        Arc::new(SecretManagerClient::default()),
        credentials,
    )
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    let store = conformance_orchestrator::persistence::SqliteRunStore::with_default_path().await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    tracing::warn!("Built without sqlite; run history is not kept between invocations");
    Ok(Arc::new(conformance_orchestrator::persistence::InMemoryPersistence::new()))
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let request = cmd.target.to_request()?;
    let credentials = credential_provider();
    let orchestrator = orchestrator(&cmd.target, credentials.clone());

    let settings = DataprocSettings::default()
        .with_poll_interval(cmd.poll_interval())
        .with_wait_timeout(cmd.wait_timeout());
    let engine = ExecutionEngine::new(DataprocClient::new(credentials, settings));

    // Set up event handler for console output
    let printer = Arc::new(EventPrinter::new());
    engine
        .add_event_handler(move |event| printer.handle(&event))
        .await;

    // Set up persistence before anything is submitted
    let store = if cmd.no_history {
        None
    } else {
        Some(open_history().await?)
    };

    println!();
    let completed = orchestrator.run(&request, &engine).await?;

    // Save to history
    if let Some(store) = store {
        let summary = create_summary(&completed);
        store
            .save_run(&summary)
            .await
            .context("Failed to save run to history")?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    // Print final status
    match &completed.result {
        Ok(()) => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&completed.graph.name).bold(),
                style("successfully").green()
            );
            Ok(())
        }
        Err(failure) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&completed.graph.name).bold(),
                style("failed").red()
            );
            error!("{}", failure);
            std::process::exit(1);
        }
    }
}

async fn plan_pipeline(cmd: &PlanCommand) -> Result<()> {
    let request = cmd.target.to_request()?;
    let plan = orchestrator(&cmd.target, credential_provider())
        .plan(&request)
        .await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&plan_json(&plan))?);
    } else {
        println!("{}", format_plan(&plan));
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history().await?;

    // If a specific run is requested
    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_run_details(&summary),
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let runs = store.list_runs(cmd.limit).await?;

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_summary(summary));
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_id).bold());
    println!("  Environment: {}", style(&summary.environment).cyan());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    if let Some(failure) = &summary.failure {
        println!("  Failure: {}", style(failure).red());
    }

    println!("\n  {}", style("Tasks:").bold());
    for node in &summary.nodes {
        match &node.detail {
            Some(detail) => println!("    {} {} ({})", node.id, node.state, style(detail).dim()),
            None => println!("    {} {}", node.id, node.state),
        }
    }
}
