//! CVA STP Server
//!
//! REST API server for the CVA straight-through-processing pipeline.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cva_server::config::{build_config, CliArgs as ConfigCliArgs};
use cva_server::server::Server;

/// CVA STP Server - REST API for CVA run orchestration
#[derive(Parser, Debug)]
#[command(name = "cva_server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Host address to bind to
    #[arg(long, env = "CVA_SERVER_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CVA_SERVER_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CVA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Pricing engine batch endpoint URL
    #[arg(long, env = "CVA_PRICER_ENDPOINT")]
    pricer_endpoint: Option<String>,
}

impl From<Args> for ConfigCliArgs {
    fn from(args: Args) -> Self {
        ConfigCliArgs {
            config_file: args.config,
            host: args.host,
            port: args.port,
            log_level: args.log_level,
            pricer_endpoint: args.pricer_endpoint,
        }
    }
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let cli_args: ConfigCliArgs = args.into();
    let config = build_config(&cli_args)?;

    init_tracing(config.log_level.as_filter_str());

    tracing::info!("CVA STP Server v{}", cva_server::VERSION);
    tracing::info!(
        host = %config.host,
        port = %config.port,
        log_level = %config.log_level,
        pricer_endpoint = %config.pricer_endpoint,
        batch_size = %config.batch_size,
        fan_out = %config.fan_out,
        "Server configuration loaded"
    );

    let server = Server::new(config);
    server.run().await?;

    Ok(())
}
