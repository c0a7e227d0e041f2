use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use temporal_mongo_harness::config::create_sample_env_file;
use temporal_mongo_harness::{
    Config, FunctionalSuite, LoadRunner, Mode, NamespaceRegistrar, StackManager, SummaryWriter,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "temporal-mongo-harness")]
#[command(about = "Validation harness for a MongoDB-backed Temporal persistence layer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the container stack and register the test namespace
    Up {
        /// Skip namespace and search-attribute registration
        #[arg(long)]
        skip_namespace: bool,
    },
    /// Stop the container stack
    Down {
        /// Also remove database volumes
        #[arg(long)]
        volumes: bool,
        /// Also remove generated summary artifacts
        #[arg(long)]
        clean: bool,
    },
    /// Register the namespace and keyword search attribute
    Namespace,
    /// Run the functional pytest suite against the running server
    Functional {
        /// Per-test timeout in seconds (overrides TEST_TIMEOUT)
        #[arg(long)]
        timeout: Option<u64>,
        /// Extra arguments forwarded to pytest after `--`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        pytest_args: Vec<String>,
    },
    /// Run a load-scenario sweep and write the markdown summary
    Load {
        /// Sweep profile
        #[arg(value_enum)]
        mode: Mode,
        /// Summary file path (overrides SUMMARY_FILE)
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Wait until the server frontend is reachable
    Wait,
    /// Generate sample configuration file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env()?;

    let default_filter = if config.debug_log { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Up { skip_namespace } => {
            let stack = StackManager::new(&config);
            stack.up().await?;

            if skip_namespace {
                info!("Skipping namespace registration");
            } else {
                NamespaceRegistrar::new(&config).ensure().await?;
            }
            Ok(())
        }
        Commands::Down { volumes, clean } => {
            let stack = StackManager::new(&config);
            stack.down(volumes)?;

            if clean {
                remove_artifacts(&config);
            }
            Ok(())
        }
        Commands::Namespace => NamespaceRegistrar::new(&config).ensure().await,
        Commands::Functional { timeout, pytest_args } => {
            let mut config = config;
            if let Some(timeout) = timeout {
                config.functional.timeout_secs = timeout;
            }
            FunctionalSuite::new(&config).run(&pytest_args).await
        }
        Commands::Load { mode, summary } => {
            let runner = LoadRunner::new(&config, mode);
            let report = runner.run(mode).await?;

            let path = summary.unwrap_or_else(|| config.load.summary_file.clone());
            SummaryWriter::new(path).write(&report)?;

            match report.failure {
                Some(failure) => Err(anyhow::anyhow!("Load run aborted: {failure}")),
                None => {
                    info!(
                        workflows = report.total_workflows(),
                        "Load run completed"
                    );
                    Ok(())
                }
            }
        }
        Commands::Wait => StackManager::new(&config).wait_for_server().await,
        Commands::InitConfig => create_sample_env_file(),
    }
}

/// Best-effort removal of generated summary artifacts.
fn remove_artifacts(config: &Config) {
    let writer = SummaryWriter::new(config.load.summary_file.clone());
    for path in [writer.path().to_path_buf(), writer.sidecar_path()] {
        match std::fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), "Removed artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove artifact"),
        }
    }
}
