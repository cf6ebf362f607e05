use clap::Parser;
use kestrel::{BrokerConfig, BrokerServer, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "kestrel")]
#[command(about = "A minimal Kafka-compatible broker serving KRaft metadata and partition logs")]
struct Args {
    /// Kafka `server.properties` file; `log.dirs`, `listeners` and `node.id` are honored
    server_properties: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding `<topic>-<partition>` log directories
    #[arg(long)]
    log_dir: Option<String>,

    /// Metadata log segment (defaults to `<log-dir>/__cluster_metadata-0/00000000000000000000.log`)
    #[arg(long)]
    metadata_log: Option<String>,

    #[arg(long)]
    max_frame_size: Option<usize>,

    /// Start from `KESTREL_*` environment variables instead of the defaults
    #[arg(long)]
    from_env: bool,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    let config = build_config(args)?;

    info!("Starting Kestrel broker on {}", config.bind_address());
    info!("Node ID: {}", config.node_id);
    info!("Log directory: {}", config.log_dir);
    info!("Metadata log: {}", config.metadata_log_path().display());

    let server = Arc::new(BrokerServer::new(config)?);

    let server_task = Arc::clone(&server);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server_task.run().await {
            error!("Server error: {}", e);
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            server.shutdown();
        }
        _ = server_handle => {
            info!("Server task completed");
        }
    }

    info!("{}", server.handler().get_metrics().snapshot());
    info!("Kestrel shut down successfully");
    Ok(())
}

/// Defaults (or environment), then `server.properties`, then CLI flags.
fn build_config(args: Args) -> Result<BrokerConfig> {
    let mut config = if args.from_env {
        BrokerConfig::from_env()?
    } else {
        BrokerConfig::default()
    };

    if let Some(path) = &args.server_properties {
        info!("Loading server properties from {}", path);
        config.apply_server_properties(path)?;
    }

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(log_dir) = args.log_dir {
        config.log_dir = log_dir;
    }
    if args.metadata_log.is_some() {
        config.metadata_log = args.metadata_log;
    }
    if let Some(max_frame_size) = args.max_frame_size {
        config.max_frame_size = max_frame_size;
    }

    Ok(config)
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            warn!("Invalid log level '{}', defaulting to 'info'", level);
            tracing::Level::INFO
        }
    }
}
