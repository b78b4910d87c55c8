// src/main.rs - PULSOX service entry point
use anyhow::{Context, Result};
use clap::Parser;
use pulsox::{sink::ensure_parent_dir, Config, IngestSettings, Ingestor, SerialConnector};
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pulse-oximeter serial logger")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Enable debug logging (overrides the config file)
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let debug = args.debug || config.debug;
    let file_logging = pulsox::init_logging(debug, &config.output.logfile);

    info!("PULSOX v{} starting", pulsox::VERSION);
    info!("Build: {}", pulsox::build_info::summary());
    if !file_logging {
        warn!(
            "Log file {} unavailable, logging to console only",
            config.output.logfile.display()
        );
    }
    info!(
        "Port {} @ {} baud, output {}, latest {}",
        config.serial.port,
        config.serial.baud_rate,
        config.output.filepath.display(),
        config.output.latest_path().display()
    );
    info!(
        "Decay: red->orange on clear, orange->yellow after {}s, yellow->green after {}s",
        config.settings.time2y, config.settings.time2g
    );

    if let Err(e) = ensure_parent_dir(&config.output.filepath).await {
        error!(
            "Cannot create output directory for {}: {}",
            config.output.filepath.display(),
            e
        );
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Stopped by operator");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let connector = SerialConnector::new(&config.serial);
    let mut ingestor = Ingestor::new(connector, IngestSettings::from_config(&config), cancel);
    let stats = ingestor.run().await;

    info!(
        "Final stats: {} connection attempts, {} connections lost, {} lines, {} samples, \
         {} write errors",
        stats.connect_attempts,
        stats.connections_lost,
        stats.lines_received,
        stats.samples_written,
        stats.write_errors
    );

    Ok(())
}
