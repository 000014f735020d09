//! TTD Dedicated Server
//!
//! Loads a server configuration, creates the world and answers server
//! discovery queries until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Serve with defaults
//! cargo run -p ttd_server
//!
//! # Serve with a config file on another port
//! cargo run -p ttd_server -- --config server.ron --port 4000
//!
//! # Print the announced game info as JSON and exit
//! cargo run -p ttd_server -- --config server.ron --print-info
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ttd_core::settings::GameSettings;
use ttd_core::world::World;
use ttd_server::udp::{ServerState, UdpResponder};
use ttd_server::ServerConfig;

#[derive(Parser)]
#[command(name = "ttd_server")]
#[command(about = "Dedicated transport simulation server")]
#[command(version)]
struct Cli {
    /// Server configuration (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Game settings (RON)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// UDP port, overriding the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Print the announced game info as JSON and exit
    #[arg(long)]
    print_info: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load(cli: &Cli) -> Result<(ServerConfig, World), String> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path).map_err(|e| e.to_string())?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    let settings = match &cli.settings {
        Some(path) => GameSettings::load(path).map_err(|e| e.to_string())?,
        None => GameSettings::default(),
    };
    let mut world = World::new(settings);
    world.map = config.map_info();
    Ok((config, world))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (config, world) = match load(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let state = ServerState::new(&config, world);

    if cli.print_info {
        return match serde_json::to_string_pretty(&state.info) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("Failed to encode game info: {e}");
                ExitCode::FAILURE
            }
        };
    }

    tracing::info!(
        name = %config.server_name,
        revision = %state.info.server_revision,
        "Starting TTD dedicated server"
    );

    let responder = match UdpResponder::bind(("0.0.0.0", config.port), state.shared()).await {
        Ok(responder) => responder,
        Err(e) => {
            tracing::error!(port = config.port, "Failed to bind: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    match responder.run(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server stopped: {e}");
            ExitCode::FAILURE
        }
    }
}
