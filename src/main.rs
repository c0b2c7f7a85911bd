use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use euclid_api::{ApiConfig, ServiceState, WaitMode, build_router};
use euclid_config::PipelineSettings;
use euclid_runtime::{RuntimeConfig, WorkflowRuntime};
use euclid_store::{MemoryStore, SqliteStore, Store};
use euclid_task::{
  ContainerLauncher, FsStoreResolver, IngestFunction, LocalLauncher, ProcessLauncher,
  StoreResolver, SumWorker, TaskRegistry, WorkerParams, compute,
};
use euclid_workflow::compute_pipeline;

/// Euclid - two operands in, a durable orchestrated sum out
#[derive(Parser)]
#[command(name = "euclid")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.euclid)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Pipeline settings file (JSON); defaults apply when omitted
  #[arg(long, global = true)]
  settings: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Serve the HTTP ingress
  Serve {
    /// Address to listen on
    #[arg(long, env = "EUCLID_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,

    /// Wait for executions to finish before responding (sync) or not (async)
    #[arg(long, env = "EUCLID_WAIT", default_value = "sync")]
    wait: WaitMode,

    /// Cancel a synchronous execution after this many milliseconds
    #[arg(long, env = "EUCLID_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,

    /// Execution record database (default: sqlite in the data directory)
    #[arg(long, env = "EUCLID_DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, value_enum, default_value_t = Launcher::Local)]
    launcher: Launcher,
  },

  /// Run one execution with a JSON payload read from stdin
  Run {
    /// Execution record database (default: in memory)
    #[arg(long, env = "EUCLID_DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, value_enum, default_value_t = Launcher::Local)]
    launcher: Launcher,
  },

  /// Compute task entrypoint: sum OPERAND_A and OPERAND_B into the result channel
  Worker,
}

/// Where container tasks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Launcher {
  /// In this process
  Local,
  /// As a `euclid worker` child process
  Process,
  /// As a `docker run` of the configured image
  Docker,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("euclid=info,info")),
    )
    .with_writer(io::stderr)
    .init();

  let data_dir = cli.data_dir.unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".euclid")
  });
  let settings = load_settings(cli.settings.as_deref())?;

  match cli.command {
    Some(Commands::Serve {
      listen,
      wait,
      request_timeout_ms,
      database_url,
      launcher,
    }) => {
      let config = ApiConfig {
        wait,
        request_timeout: request_timeout_ms.map(Duration::from_millis),
      };
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(serve(settings, data_dir, listen, config, database_url, launcher))?;
    }
    Some(Commands::Run {
      database_url,
      launcher,
    }) => {
      let payload = read_payload_from_stdin()?;
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_once(settings, data_dir, payload, database_url, launcher))?;
    }
    Some(Commands::Worker) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(worker(data_dir))?;
    }
    None => {
      println!("euclid - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<PipelineSettings> {
  match path {
    Some(path) => PipelineSettings::from_file(path)
      .with_context(|| format!("failed to load settings: {}", path.display())),
    None => Ok(PipelineSettings::default()),
  }
}

fn storage_root(data_dir: &Path) -> PathBuf {
  data_dir.join("storage")
}

/// Wire the pipeline: stores, the ingest function, the launcher, the runtime.
fn build_runtime(
  settings: &PipelineSettings,
  data_dir: &Path,
  records: Arc<dyn Store>,
  launcher: Launcher,
) -> Result<(WorkflowRuntime, Arc<dyn StoreResolver>)> {
  let resolver: Arc<dyn StoreResolver> = Arc::new(FsStoreResolver::new(storage_root(data_dir)));
  let input_store = resolver
    .resolve(&settings.storage_container)
    .context("invalid storage container")?;
  let ingest = IngestFunction::new(input_store, settings.storage_container.clone());

  let launcher: Arc<dyn ContainerLauncher> = match launcher {
    Launcher::Local => Arc::new(LocalLauncher::new(Arc::new(SumWorker::new(resolver.clone())))),
    Launcher::Process => {
      let exe = std::env::current_exe().context("failed to locate the euclid executable")?;
      Arc::new(ProcessLauncher::new(
        exe.to_string_lossy(),
        vec![
          "--data-dir".to_string(),
          data_dir.to_string_lossy().into_owned(),
          "worker".to_string(),
        ],
      ))
    }
    Launcher::Docker => {
      let mount = format!("{}:/var/lib/euclid", data_dir.display());
      Arc::new(ProcessLauncher::docker(
        vec!["-v".to_string(), mount],
        vec![
          "--data-dir".to_string(),
          "/var/lib/euclid".to_string(),
          "worker".to_string(),
        ],
      ))
    }
  };

  let registry =
    TaskRegistry::new(launcher).with_function(settings.ingest_function.clone(), Arc::new(ingest));
  let workflow = compute_pipeline(settings).context("failed to build workflow")?;
  let runtime = WorkflowRuntime::new(RuntimeConfig::from(settings), workflow, registry, records);

  Ok((runtime, resolver))
}

async fn connect_records(database_url: &str) -> Result<Arc<dyn Store>> {
  let store = SqliteStore::connect(database_url)
    .await
    .with_context(|| format!("failed to open execution database: {}", database_url))?;
  Ok(Arc::new(store))
}

async fn serve(
  settings: PipelineSettings,
  data_dir: PathBuf,
  listen: String,
  config: ApiConfig,
  database_url: Option<String>,
  launcher: Launcher,
) -> Result<()> {
  tokio::fs::create_dir_all(&data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let database_url = database_url
    .unwrap_or_else(|| format!("sqlite://{}", data_dir.join("euclid.db").display()));
  let records = connect_records(&database_url).await?;
  let (runtime, resolver) = build_runtime(&settings, &data_dir, records, launcher)?;

  let router = build_router(ServiceState::new(Arc::new(runtime), resolver, config.clone()));
  let listener = tokio::net::TcpListener::bind(&listen)
    .await
    .with_context(|| format!("failed to bind {}", listen))?;

  info!(
    listen = %listen,
    wait = %config.wait,
    workflow = %settings.workflow_name,
    storage_container = %settings.storage_container,
    "euclid listening"
  );

  axum::serve(listener, router)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .context("server error")?;

  Ok(())
}

async fn run_once(
  settings: PipelineSettings,
  data_dir: PathBuf,
  payload: serde_json::Value,
  database_url: Option<String>,
  launcher: Launcher,
) -> Result<()> {
  let records: Arc<dyn Store> = match database_url {
    Some(url) => connect_records(&url).await?,
    None => Arc::new(MemoryStore::new()),
  };
  let (runtime, _) = build_runtime(&settings, &data_dir, records.clone(), launcher)?;

  // Ctrl-C cancels the execution and stops any running task
  let cancel = CancellationToken::new();
  let on_signal = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_signal.cancel();
    }
  });

  let execution = runtime.execute_workflow(payload, cancel);
  let execution_id = execution.execution_id().to_string();
  let outcome = execution.wait().await;

  let record = records
    .get_execution(&execution_id)
    .await
    .context("failed to load execution record")?;
  println!("{}", serde_json::to_string_pretty(&record)?);

  outcome.map(|_| ()).context("execution failed")
}

async fn worker(data_dir: PathBuf) -> Result<()> {
  let params = WorkerParams::from_env().context("invalid worker parameters")?;
  let store = FsStoreResolver::new(storage_root(&data_dir))
    .resolve(&params.storage_container)
    .context("invalid storage container")?;

  let output_key = compute(store.as_ref(), &params)
    .await
    .context("compute failed")?;
  eprintln!("wrote {}", output_key);
  Ok(())
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    anyhow::bail!("expected a JSON payload on stdin, e.g. {{\"a\": 6, \"b\": 9}}");
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read payload from stdin")?;
  serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
}
