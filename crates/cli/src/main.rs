use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use forge_common::{Cancellation, ForgeError};
use forge_events::{EventBus, Payload};
use forge_provider::{create_provider, AiFacade, ProviderKind};
use forge_sandbox::SandboxRunner;
use forge_store::{default_config_dir, ReportStore, SettingsStore};
use forge_symbols::SymbolIndex;
use forge_taskflow::{Engine, NodeState, SLAPolicy};
use forge_tree::{build_tree, TreeOptions};
use forge_verify::{VerificationPipeline, VerificationPolicy};

#[derive(Parser)]
#[command(name = "forge", about = "Autonomous AI worker factory", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the symbol graph for a project
    Index {
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
    /// Run the full autonomous flow: decompose, edit, and verify a task
    Solve {
        /// The task description to hand to the model
        #[arg(long)]
        task: Option<String>,
        /// SLA preset controlling budget, retries, and quality gates
        #[arg(long, default_value = "standard")]
        sla: String,
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
    /// List or show persisted reports
    Result {
        #[arg(long, default_value = "text")]
        format: String,
        /// Filter by report type (e.g. "solve")
        #[arg(long = "type")]
        report_type: Option<String>,
        /// Filter to reports for one task id
        #[arg(long)]
        task: Option<String>,
    },
    /// Run the Verification Pipeline only, without editing anything
    Verify {
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = forge_events::init_logging();
    let events = Arc::new(EventBus::default());

    let cli = Cli::parse();
    let dispatch_events = Arc::clone(&events);
    let dispatch = async move {
        match cli.command {
            Commands::Index { project } => run_index(&project).await,
            Commands::Solve { task, sla, project } => run_solve(task, &sla, &project, dispatch_events).await,
            Commands::Result { format, report_type, task } => run_result(&format, report_type.as_deref(), task.as_deref()),
            Commands::Verify { project } => run_verify(&project, dispatch_events).await,
        }
    }
    .await;

    let exit_code = match dispatch {
        Ok(code) => code,
        Err(e) => {
            let classified = e.downcast_ref::<ForgeError>().map(|fe| fe.classify()).unwrap_or_else(|| format!("ErrInternal: {e}"));
            events.publish(Payload::TaskError { node_id: None, message: classified.clone() });
            eprintln!("{classified}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run_index(project: &std::path::Path) -> Result<i32> {
    let scan = build_tree(project, &TreeOptions::default()).with_context(|| format!("failed to walk {}", project.display()))?;

    let mut index = SymbolIndex::new(project);
    let symbol_count = index.index().context("failed to build symbol graph")?;

    println!("indexed {} files, {symbol_count} symbols (truncated: {})", scan.files_visited, scan.truncated);
    Ok(0)
}

async fn run_solve(task: Option<String>, sla_name: &str, project: &std::path::Path, events: Arc<EventBus>) -> Result<i32> {
    let task = task.ok_or_else(|| anyhow!("--task is required"))?;
    let sla = SLAPolicy::from_preset(sla_name).ok_or_else(|| anyhow!("unknown SLA preset '{sla_name}' (expected lite, standard, or strict)"))?;

    let settings = SettingsStore::load(default_config_dir())?.get();
    let provider_name = settings.selected_provider.ok_or_else(|| anyhow!("no provider selected; set selectedProvider in settings.json"))?;
    let model = settings.selected_models.first().cloned().ok_or_else(|| anyhow!("no model selected; set selectedModels in settings.json"))?;
    let kind = ProviderKind::parse(&provider_name).ok_or_else(|| anyhow!("unknown provider '{provider_name}'"))?;

    let credential = if kind.requires_api_key() {
        Some(forge_auth::resolve_credential(&provider_name, None)?.header_value().to_string())
    } else {
        forge_auth::resolve_optional_credential(&provider_name, None).map(|c| c.header_value().to_string())
    };

    let provider = create_provider(kind, credential, None, Some(model.clone()))?;
    let mut facade = AiFacade::new();
    facade.register(provider);

    let mut symbol_index = SymbolIndex::new(project);
    symbol_index.index().context("failed to build symbol graph")?;

    let engine = Arc::new(
        Engine::new(project, provider_name.clone(), model, Arc::new(facade), Arc::new(SandboxRunner::new()), events).with_symbol_index(Arc::new(symbol_index)),
    );

    let result = engine.run(&task, &sla, &Cancellation::new()).await?;
    let passed = result.state == NodeState::Succeeded;

    let reports = ReportStore::new(default_config_dir());
    let task_id = forge_common::new_id();
    reports.create(&task_id, "solve", &format!("solve: {task}"), &format!("{:?}", result.state), serde_json::to_value(&result)?)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if passed { 0 } else { 1 })
}

fn run_result(format: &str, report_type: Option<&str>, task: Option<&str>) -> Result<i32> {
    let store = ReportStore::new(default_config_dir());
    let reports: Vec<_> = store
        .list()?
        .into_iter()
        .filter(|r| report_type.map(|t| r.kind == t).unwrap_or(true))
        .filter(|r| task.map(|t| r.task_id == t).unwrap_or(true))
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&reports)?),
        _ => {
            for report in &reports {
                println!("{}  {}  {}  {}", report.id, report.kind, report.created_at, report.title);
            }
        }
    }
    Ok(0)
}

async fn run_verify(project: &std::path::Path, events: Arc<EventBus>) -> Result<i32> {
    let mut symbol_index = SymbolIndex::new(project);
    symbol_index.index().context("failed to build symbol graph")?;

    let pipeline = VerificationPipeline::new();
    let report = pipeline.verify(project, &VerificationPolicy::default(), Some(&symbol_index), &Cancellation::new(), Some(&events)).await;

    for (stage, result) in &report.stages {
        println!("{stage}: {}", if result.pass { "pass" } else { "fail" });
        for finding in &result.findings {
            println!("  - {}", finding.message);
        }
    }
    Ok(if report.all_passed() { 0 } else { 1 })
}
