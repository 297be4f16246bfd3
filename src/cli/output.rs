//! CLI output formatting

use crate::{
    core::{NodeKind, NodeState, RunStatus},
    execution::{ExecutionEvent, PreparedRun},
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Create a spinner shown while a remote job is pending
pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a node state for display
pub fn format_node_state(state: &NodeState) -> String {
    let label = state.label();
    match state {
        NodeState::Queued => style(label).dim().to_string(),
        NodeState::Running { .. } => style(label).yellow().to_string(),
        NodeState::Success { .. } => style(label).green().to_string(),
        NodeState::Failed { .. } | NodeState::UpstreamFailed { .. } => style(label).red().to_string(),
        NodeState::Skipped { .. } => style(label).dim().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style(status.as_str()).dim().to_string(),
        RunStatus::Running => style(status.as_str()).yellow().to_string(),
        RunStatus::Succeeded => style(status.as_str()).green().to_string(),
        RunStatus::Failed => style(status.as_str()).red().to_string(),
    }
}

/// Format an execution event for display
pub fn format_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted { run_id, pipeline_name } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(short_id(run_id)).dim()
        ),
        ExecutionEvent::NodeSubmitted {
            node_id,
            main_python_file_uri,
        } => format!(
            "{} {} submitted ({})",
            SPINNER,
            style(node_id).cyan(),
            style(main_python_file_uri).dim()
        ),
        ExecutionEvent::NodeStarted { node_id } => {
            format!("{} {}", SPINNER, style(node_id).cyan())
        }
        ExecutionEvent::NodeSucceeded { node_id, job_id } => match job_id {
            Some(job_id) => format!(
                "{} {} (job {})",
                CHECK,
                style(node_id).green(),
                style(job_id).dim()
            ),
            None => format!("{} {}", CHECK, style(node_id).green()),
        },
        ExecutionEvent::NodeFailed { node_id, error } => {
            format!("{} {}: {}", CROSS, style(node_id).red(), style(error).dim())
        }
        ExecutionEvent::NodeGated { node_id, state } => format!(
            "{} {} {}{}",
            WARN,
            style(node_id).yellow(),
            format_node_state(state),
            state
                .detail()
                .map(|d| format!(" ({})", d))
                .unwrap_or_default()
        ),
        ExecutionEvent::RunFinished {
            run_id,
            status,
            failure,
        } => {
            let status_str = match (status, failure) {
                (RunStatus::Succeeded, _) => format!("{} completed", style("successfully").green()),
                (_, Some(failure)) => format!("{}: {}", style("failed").red(), failure),
                _ => format_status(*status),
            };
            format!("{} Run ({}) {}", INFO, style(short_id(run_id)).dim(), status_str)
        }
    }
}

/// Prints events, with a spinner while a job is running
#[derive(Default)]
pub struct EventPrinter {
    spinner: Mutex<Option<ProgressBar>>,
}

impl EventPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, event: &ExecutionEvent) {
        let mut spinner = match self.spinner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(active) = spinner.take() {
            active.finish_and_clear();
        }

        println!("{}", format_event(event));

        if let ExecutionEvent::NodeSubmitted { node_id, .. } = event {
            *spinner = Some(create_spinner(format!("waiting for {}", node_id)));
        }
    }
}

/// Format a run summary for display
pub fn format_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        RunStatus::Pending => INFO,
    };

    format!(
        "{} {} - {} [{}] - {} - {}",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.pipeline_id).bold(),
        style(&summary.environment).cyan(),
        format_status(summary.status),
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Multi-line description of a prepared run
pub fn format_plan(plan: &PreparedRun) -> String {
    let metadata = plan.metadata();
    let mut lines = vec![
        format!("{} Pipeline {}", INFO, style(&metadata.dag_id).bold()),
        format!("  {}", style(&metadata.description).dim()),
        format!("  Environment: {}", style(plan.context.environment).cyan()),
        format!("  Owner: {}", metadata.owner),
        format!("  Tags: {}", metadata.tags.join(", ")),
        format!("  Schedule: {}", metadata.schedule),
        format!(
            "  Cluster: {} ({})",
            style(plan.config.cluster_name()).bold(),
            plan.config.region()
        ),
        String::new(),
    ];

    for node_id in plan.graph.execution_order() {
        let Some(node) = plan.graph.node(node_id) else {
            continue;
        };
        let after = if node.dependencies.is_empty() {
            String::new()
        } else {
            format!(" after {} ({:?})", node.dependencies.join(", "), node.join)
        };
        lines.push(format!("  {}{}", style(&node.id).cyan(), style(after).dim()));

        if let NodeKind::Job(spec) = &node.kind {
            lines.push(format!("    project: {}", spec.project_id));
            lines.push(format!("    main: {}", spec.main_python_file_uri));
            if let Some(sa) = &spec.impersonation_chain {
                lines.push(format!("    impersonate: {}", sa));
            }
            for arg in spec.redacted_args() {
                lines.push(format!("      {}", style(arg).dim()));
            }
        }
    }

    lines.join("\n")
}

/// JSON description of a prepared run; job arguments are redacted
pub fn plan_json(plan: &PreparedRun) -> serde_json::Value {
    let jobs: Vec<serde_json::Value> = plan
        .graph
        .job_specs()
        .into_iter()
        .map(|spec| {
            let mut payload = spec.payload();
            payload.pyspark_job.args = spec.redacted_args();
            json!({
                "task_id": spec.task_id,
                "region": spec.region,
                "impersonation_chain": spec.impersonation_chain,
                "job": payload,
            })
        })
        .collect();

    json!({
        "run_id": plan.context.run_id,
        "environment": plan.context.environment.as_str(),
        "config_blob": plan.context.config_blob(),
        "metadata": plan.metadata(),
        "execution_order": plan.graph.execution_order(),
        "jobs": jobs,
    })
}

/// Format a duration as `1h 2m 3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
