#![deny(unsafe_code)]

//! auxproc — auxiliary-processor daemon for shared variables.

mod bootstrap;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use auxproc_config::AppConfig;
use auxproc_core::{
    Dispatcher, EventLoop, MemoryStore, ProcessorKind, UdpTransport, select_processor,
};

/// auxproc — couples to shared variables and services control writes.
#[derive(Parser)]
#[command(name = "auxproc", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "auxproc.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the auxiliary processor.
    Run {
        /// Processor kind override: "command", "passthrough", "record".
        #[arg(long)]
        kind: Option<String>,

        /// Exit once the last coupled variable is retracted.
        #[arg(long)]
        auto: bool,

        /// Pid of the launching interpreter to watch.
        #[arg(long)]
        parent: Option<u32>,

        /// Stay in the foreground (no fork).
        #[arg(long)]
        foreground: bool,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics always go to stderr; stdout is closed once the
    // process forks into the background.
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            kind,
            auto,
            parent,
            foreground,
        } => cmd_run(&cli.config, kind.as_deref(), auto, parent, foreground),
        Commands::Config { show } => cmd_config(&cli.config, show),
    }
}

fn cmd_run(
    config_path: &Path,
    kind: Option<&str>,
    auto: bool,
    parent: Option<u32>,
    foreground: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, kind, auto, parent, foreground);
    config.validate()?;

    if config.daemon.daemonize {
        bootstrap::daemonize()?;
    }

    // One thread of control: all variable mutation and every AP effect
    // runs on the loop, so a current-thread runtime is exactly enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_processor(config))
}

/// Fold command-line flags into the loaded configuration.
fn apply_overrides(
    config: &mut AppConfig,
    kind: Option<&str>,
    auto: bool,
    parent: Option<u32>,
    foreground: bool,
) {
    if let Some(kind) = kind {
        config.processor.kind = kind.to_string();
    }
    if auto {
        config.daemon.auto_exit = true;
    }
    if let Some(pid) = parent {
        config.daemon.parent_pid = Some(pid);
    }
    if foreground {
        config.daemon.daemonize = false;
    }
}

async fn run_processor(config: AppConfig) -> Result<()> {
    let kind: ProcessorKind = config
        .processor
        .kind
        .parse()
        .map_err(anyhow::Error::msg)?;
    let identity = config
        .processor
        .identity
        .clone()
        .unwrap_or_else(|| kind.default_identity().to_string());

    info!(%kind, %identity, "starting auxiliary processor");

    let bind = format!(
        "{}:{}",
        config.transport.listen_addr, config.transport.listen_port
    );
    let transport = UdpTransport::bind(&bind).await?;

    let dispatcher = Dispatcher::new(
        select_processor(kind, &identity),
        Box::new(MemoryStore::new()),
        &identity,
        config.daemon.auto_exit,
    );
    let event_loop = EventLoop::new(
        dispatcher,
        transport,
        config.daemon.parent_pid,
        Duration::from_millis(config.daemon.poll_interval_ms),
    );
    event_loop.run().await?;
    Ok(())
}

fn cmd_config(config_path: &Path, show: bool) -> Result<()> {
    let config = load_config(config_path)?;
    if show {
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        AppConfig::parse(&content).map_err(|e| anyhow::anyhow!(e))
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}
