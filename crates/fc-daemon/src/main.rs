//! # fc-daemon
//!
//! Fibonacci Computer action server daemon.
//!
//! Serves the JSON-lines goal protocol on stdio: requests arrive one per
//! line on stdin, replies (goal responses, feedback, results) leave one per
//! line on stdout. Logs go to stderr.
//!
//! ## Usage
//!
//! ```text
//! $ echo '{"op":"send_goal","order":5}' | fc-daemon --step-interval-ms 10
//! {"type":"goal_response","order":5,"accepted":true,"goal_id":"..."}
//! {"type":"feedback","goal_id":"...","partial_sequence":[0,1,1]}
//! ...
//! {"type":"result","goal_id":"...","status":"succeeded","sequence":[0,1,1,2,3]}
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use fc_server::config::DEFAULT_CONFIG_FILE;
use fc_server::{transport, GoalServer, ServerConfig};

/// Fibonacci Computer action server.
#[derive(Parser, Debug)]
#[command(name = "fc-daemon", about = "Fibonacci Computer action server on stdio")]
struct Cli {
    /// Path to the TOML config file. A missing file means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the pause between computation steps (milliseconds).
    #[arg(long)]
    step_interval_ms: Option<u64>,

    /// Override the largest admissible order.
    #[arg(long)]
    max_order: Option<u32>,

    /// Append lifecycle events to this JSONL file.
    #[arg(long)]
    events_log: Option<PathBuf>,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Config file values with command-line overrides applied on top.
fn resolve_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = ServerConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(ms) = cli.step_interval_ms {
        config.step_interval_ms = ms;
    }
    if let Some(max_order) = cli.max_order {
        config.max_order = max_order;
    }
    if let Some(path) = &cli.events_log {
        config.events_log = Some(path.clone());
    }

    config.validate().context("invalid server configuration")?;
    Ok(config)
}

fn init_logging(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("fc_server=info".parse()?)
        .add_directive("fc_daemon=info".parse()?);

    // Logs go to stderr so they don't interfere with replies on stdout.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let config = resolve_config(&cli)?;
    tracing::info!(
        max_order = config.max_order,
        min_cancelable_order = config.min_cancelable_order,
        step_interval_ms = config.step_interval_ms,
        "Starting Fibonacci action server"
    );

    let server = Arc::new(GoalServer::new(&config)?);
    tracing::info!("Action server ready, reading goals from stdin");

    tokio::select! {
        served = transport::serve(server.clone(), BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => {
            served
                .inspect_err(|e| tracing::error!("serving error: {:?}", e))
                .context("stdio transport failed")?;
            tracing::info!("Input closed");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl-C")?;
            tracing::info!("Interrupted");
        }
    }

    server.shutdown().await;
    tracing::info!("Action server shutting down");
    Ok(())
}
