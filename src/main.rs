mod dlq;
mod functions;

use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use reverb_config::ServerConfig;
use reverb_function::FunctionRegistry;
use reverb_gateway::Gateway;
use reverb_ingress::IngressState;
use reverb_orchestrator::{EventRunner, HttpInvoker, Invoker, LocalInvoker, Orchestrator, Trigger};
use reverb_store::SqliteStore;

use crate::dlq::{DeadLetterClient, Window};

/// Reverb - durable step functions
#[derive(Parser)]
#[command(name = "reverb")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.reverb)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Serve the gateway and the ingress, and run triggered functions
  Serve {
    /// Path to the config file (default: <data-dir>/config.json if present)
    #[arg(long)]
    config: Option<PathBuf>,
  },

  /// Get dead letter items that occurred within a time period
  Dlq {
    /// The url of the ingress
    #[arg(short = 'u', long, env = "REVERB_API_URL", default_value = "http://127.0.0.1:3000")]
    api_url: String,

    /// API key that goes with the api url
    #[arg(short = 'k', long, env = "REVERB_API_KEY", default_value = "")]
    api_key: String,

    /// Start of the period (default: 7 days before end)
    #[arg(short, long)]
    start: Option<String>,

    /// End of the period (default: now)
    #[arg(short, long)]
    end: Option<String>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reverb=info")),
    )
    .with_writer(std::io::stderr)
    .init();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".reverb"),
  };

  match cli.command {
    Some(Commands::Serve { config }) => {
      let config = load_config(config.as_deref(), &data_dir)?;
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(serve(config, data_dir))?;
    }
    Some(Commands::Dlq {
      api_url,
      api_key,
      start,
      end,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      let result = rt.block_on(async {
        let window = Window::resolve(start.as_deref(), end.as_deref(), chrono::Utc::now())?;
        let client = DeadLetterClient::new(api_url, api_key);
        dlq::run(&client, &window).await
      });

      if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
      }
    }
    None => {
      println!("reverb - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_config(path: Option<&Path>, data_dir: &Path) -> Result<ServerConfig> {
  if let Some(path) = path {
    return ServerConfig::load(path)
      .with_context(|| format!("failed to load config file: {}", path.display()));
  }

  let default_path = data_dir.join("config.json");
  if default_path.exists() {
    return ServerConfig::load(&default_path)
      .with_context(|| format!("failed to load config file: {}", default_path.display()));
  }

  Ok(ServerConfig::default())
}

async fn serve(config: ServerConfig, data_dir: PathBuf) -> Result<()> {
  let database_url = match &config.database_url {
    Some(url) => url.clone(),
    None => {
      tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
      format!("sqlite://{}", data_dir.join("reverb.db").display())
    }
  };

  let store = SqliteStore::connect(&database_url)
    .await
    .with_context(|| format!("failed to open store: {}", database_url))?;
  store.migrate().await.context("failed to run migrations")?;
  let store = Arc::new(store);

  let registry = Arc::new(functions::registry().context("failed to register functions")?);
  let gateway = Arc::new(Gateway::new(registry.clone()));

  let (invoker, triggers): (Arc<dyn Invoker>, Vec<Trigger>) = match &config.functions_url {
    Some(url) => (
      Arc::new(HttpInvoker::new(url.clone())),
      config
        .functions
        .iter()
        .map(|f| Trigger::new(&f.id, &f.event))
        .collect(),
    ),
    None => (Arc::new(LocalInvoker::new(gateway.clone())), local_triggers(&registry)),
  };

  let orchestrator = Arc::new(Orchestrator::new(invoker, store.clone(), config.retry.clone()));
  let runner = EventRunner::new(orchestrator, triggers);

  let ingress = IngressState::new(store)
    .with_api_key(config.api_key.clone())
    .with_events(runner.sender());

  let gateway_listener = TcpListener::bind(config.gateway_addr)
    .await
    .with_context(|| format!("failed to bind gateway to {}", config.gateway_addr))?;
  let ingress_listener = TcpListener::bind(config.ingress_addr)
    .await
    .with_context(|| format!("failed to bind ingress to {}", config.ingress_addr))?;

  info!(
    gateway = %config.gateway_addr,
    ingress = %config.ingress_addr,
    functions = registry.len(),
    "reverb_listening"
  );

  let cancel = CancellationToken::new();
  let runner_task = tokio::spawn(runner.start(cancel.clone()));

  let gateway_server = axum::serve(gateway_listener, reverb_gateway::router(gateway))
    .with_graceful_shutdown(shutdown(cancel.clone()))
    .into_future();
  let ingress_server = axum::serve(ingress_listener, reverb_ingress::router(ingress))
    .with_graceful_shutdown(shutdown(cancel.clone()))
    .into_future();

  {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown_requested");
      }
      cancel.cancel();
    });
  }

  let (gateway_result, ingress_result) = tokio::join!(gateway_server, ingress_server);
  // A failed listener takes the rest of the process down with it.
  cancel.cancel();
  gateway_result.context("gateway server failed")?;
  ingress_result.context("ingress server failed")?;
  runner_task.await.context("event runner panicked")?;

  info!("reverb_stopped");
  Ok(())
}

/// Triggers for the bundled functions, sorted by function name.
fn local_triggers(registry: &FunctionRegistry) -> Vec<Trigger> {
  let mut triggers: Vec<Trigger> = registry
    .triggers()
    .into_iter()
    .map(|(function, event)| Trigger::new(function, event))
    .collect();
  triggers.sort_by(|a, b| a.function.cmp(&b.function));
  triggers
}

async fn shutdown(cancel: CancellationToken) {
  cancel.cancelled().await
}
