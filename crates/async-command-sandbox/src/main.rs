/*
[INPUT]:  CLI arguments, optional YAML configuration file, OS shutdown signals
[OUTPUT]: Demo commands executed through a queue dispatcher, with a summary
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use async_command::{CommandFactory, QueueDispatcher, TracingErrorHandler};
use async_command_sandbox::{DemoRunner, SandboxConfig};

#[derive(Parser, Debug)]
#[command(name = "async-command-sandbox", version, about = "Runs demo commands against the async command engine")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "cancel-after-ms", value_name = "MS")]
    cancel_after_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let mut config = load_config(args.config_path.as_ref())?;
    if let Some(cancel_after_ms) = args.cancel_after_ms {
        config.cancel_after_ms = cancel_after_ms;
    }
    info!(
        demo_count = config.demos.len(),
        cancel_after_ms = config.cancel_after_ms,
        "configuration loaded"
    );

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let dispatch_shutdown = CancellationToken::new();
    let (dispatcher, dispatch_loop) = QueueDispatcher::spawn(dispatch_shutdown.clone());
    let factory = CommandFactory::new(Arc::new(dispatcher), Arc::new(TracingErrorHandler));

    let runner = DemoRunner::new(factory, &config);
    let reports = runner.run_all(&config.demos, &shutdown).await;

    dispatch_shutdown.cancel();
    let dispatched = dispatch_loop.await.context("join dispatch loop")?;
    info!(dispatched, "dispatch loop stopped");

    for report in reports? {
        info!(
            title = %report.title,
            kind = report.kind.as_str(),
            outcome = report.outcome.as_str(),
            progress = report.progress,
            final_title = %report.final_title,
            "demo summary"
        );
    }
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<SandboxConfig> {
    let Some(path) = path else {
        info!("no config file given; using built-in demos");
        return Ok(SandboxConfig::default());
    };
    let path_str = path.to_str().context("config path must be valid utf-8")?;
    SandboxConfig::from_file(path_str).context("load config")
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown.cancel();
    });
}
