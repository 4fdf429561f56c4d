use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cubeflow_config::WorkflowDef;
use cubeflow_cubes::{AiProviderConfig, HandlerRegistry, OpenAiCompatibleClient};
use cubeflow_engine::ExecutionManager;
use cubeflow_runtime::{
  CubeExecutor, DEFAULT_AI_TIMEOUT_MS, ExecutionEvent, FnNotifier, RunStatus, RuntimeConfig,
};
use cubeflow_store::{MemoryStore, PersistenceSink};
use cubeflow_workflow::{Workflow, WorkflowValidator};

/// Owner recorded for workflows run from the command line.
const LOCAL_OWNER: &str = "local";

/// Cubeflow - a visual-workflow execution engine
#[derive(Parser)]
#[command(name = "cubeflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: platform data dir + /cubeflow)
  #[arg(long, global = true, env = "CUBEFLOW_DATA_DIR")]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a workflow file and print the validation report
  Validate {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Print the order cubes would execute in
  Order {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Execute a workflow and print the run result
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    #[command(flatten)]
    options: RunOptions,
  },
}

#[derive(clap::Args)]
struct RunOptions {
  /// Time budget for each AI-backed cube, in milliseconds
  #[arg(long, env = "CUBEFLOW_AI_TIMEOUT_MS", default_value_t = DEFAULT_AI_TIMEOUT_MS)]
  ai_timeout_ms: u64,

  /// Root directory for saver cubes (default: <data dir>/uploads)
  #[arg(long, env = "CUBEFLOW_OUTPUT_DIR")]
  output_dir: Option<PathBuf>,

  /// Base URL of an OpenAI-compatible API
  #[arg(long, env = "CUBEFLOW_AI_BASE_URL")]
  ai_base_url: Option<String>,

  #[arg(long, env = "CUBEFLOW_AI_API_KEY", hide_env_values = true)]
  ai_api_key: Option<String>,
}

fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cubeflow=info,warn")),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = cli
    .data_dir
    .or_else(|| dirs::data_dir().map(|d| d.join("cubeflow")))
    .unwrap_or_else(|| PathBuf::from(".cubeflow"));

  match cli.command {
    Some(Commands::Validate { workflow_file }) => validate(&workflow_file),
    Some(Commands::Order { workflow_file }) => order(&workflow_file),
    Some(Commands::Run {
      workflow_file,
      options,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_workflow(&workflow_file, options, &data_dir).await })
    }
    None => {
      println!("cubeflow - use --help to see available commands");
      Ok(ExitCode::SUCCESS)
    }
  }
}

fn load_workflow(workflow_file: &Path) -> Result<Workflow> {
  let content = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let def: WorkflowDef = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  let fallback_id = workflow_file
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "workflow".to_string());

  Ok(Workflow::from_def(def, fallback_id, LOCAL_OWNER))
}

fn validate(workflow_file: &Path) -> Result<ExitCode> {
  let workflow = load_workflow(workflow_file)?;
  let report = WorkflowValidator::validate(&workflow);

  println!("{}", serde_json::to_string_pretty(&report)?);

  Ok(if report.is_valid() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

fn order(workflow_file: &Path) -> Result<ExitCode> {
  let workflow = load_workflow(workflow_file)?;
  let report = WorkflowValidator::validate(&workflow);
  if !report.is_valid() {
    for message in report.messages() {
      eprintln!("{message}");
    }
    return Ok(ExitCode::FAILURE);
  }

  let order = WorkflowValidator::execution_order(&workflow.cubes, &workflow.connections);
  println!("{}", serde_json::to_string_pretty(&order)?);

  Ok(ExitCode::SUCCESS)
}

async fn run_workflow(workflow_file: &Path, options: RunOptions, data_dir: &Path) -> Result<ExitCode> {
  let workflow = load_workflow(workflow_file)?;
  info!(
    workflow_id = %workflow.workflow_id,
    cubes = workflow.cubes.len(),
    "workflow_loaded"
  );

  let mut provider_config = AiProviderConfig::default();
  if let Some(base_url) = options.ai_base_url {
    provider_config.base_url = base_url;
  }
  provider_config.api_key = options.ai_api_key;
  let provider = Arc::new(OpenAiCompatibleClient::new(provider_config));

  let config = RuntimeConfig {
    ai_timeout_ms: options.ai_timeout_ms,
    output_dir: options
      .output_dir
      .unwrap_or_else(|| data_dir.join("uploads")),
  };
  let registry = HandlerRegistry::builtin(provider, config.output_dir.clone());
  let executor = CubeExecutor::new(registry, config);

  let store = Arc::new(MemoryStore::new());
  store
    .save_workflow(&workflow)
    .await
    .context("failed to store workflow")?;

  let observer = FnNotifier::new(|event: ExecutionEvent| {
    if let Some(percent) = event.progress_percent() {
      info!(percent = percent.round(), "progress");
    }
  });
  let manager = ExecutionManager::with_observer(store, executor, Arc::new(observer));

  let cancel = CancellationToken::new();
  let ctrl_c = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt_received");
      ctrl_c.cancel();
    }
  });

  let record = manager
    .run_with_cancel(&workflow.owner_id, &workflow.workflow_id, cancel)
    .await
    .context("failed to start workflow run")?;

  println!("{}", serde_json::to_string_pretty(&record)?);

  Ok(if record.status == RunStatus::Completed {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}
