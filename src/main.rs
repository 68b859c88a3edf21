//! Launch Mirror - MIDI mirror with Ableton Live remote actions

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launch_mirror::actions::register_triggers;
use launch_mirror::cli::port_listing;
use launch_mirror::config::AppConfig;
use launch_mirror::mirror::{MirrorLoop, DAW_TO_DEVICE, DEVICE_TO_DAW};
use launch_mirror::ports::PortPrefixes;
use launch_mirror::registry::CallbackRegistry;
use launch_mirror::remote::{AbletonOscClient, RemoteClient};
use launch_mirror::transport::{MidirBackend, TransportSession};

const CLIENT_NAME: &str = "Launch Mirror";

/// Launch Mirror - mirror a MIDI controller through DAW virtual ports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting Launch Mirror...");

    if args.list_ports {
        // The config is optional here; it only adds the resolved mapping
        let prefixes = AppConfig::load(&args.config)
            .await
            .ok()
            .map(|config| PortPrefixes::from(&config.midi));
        print!("{}", port_listing(&MidirBackend::new(CLIENT_NAME), prefixes.as_ref())?);
        return Ok(());
    }

    info!("Configuration file: {}", args.config);
    let config = AppConfig::load(&args.config).await?;
    info!("Configuration loaded successfully");

    let remote = Arc::new(AbletonOscClient::new(&config.remote));
    match remote.ping().await {
        Ok(tracks) => info!(
            "Connected to Ableton Live at {}:{} ({} tracks)",
            config.remote.host, config.remote.port, tracks
        ),
        Err(e) => warn!("Ableton Live not reachable yet, actions will retry: {}", e),
    }

    let registry = Arc::new(CallbackRegistry::new());
    let remote: Arc<dyn RemoteClient> = remote;
    let count = register_triggers(&registry, &config.triggers, remote)?;
    info!("Registered {} trigger(s)", count);

    let mut backend = MidirBackend::new(CLIENT_NAME);
    let (session, report) = TransportSession::open(&mut backend, &PortPrefixes::from(&config.midi));

    let feedback = report.direction_active(DAW_TO_DEVICE.input, DAW_TO_DEVICE.output);
    let presses = report.direction_active(DEVICE_TO_DAW.input, DEVICE_TO_DAW.output);
    if !feedback && !presses {
        anyhow::bail!(
            "No mirror direction could be opened ({} port error(s)); try --list-ports",
            report.failures.len()
        );
    }
    if !feedback {
        warn!("DAW -> device direction disabled");
    }
    if !presses {
        warn!("Device -> DAW direction disabled");
    }

    let handle = MirrorLoop::new(session, registry, config.midi.poll_interval())
        .flush_on_start(config.midi.flush_on_start)
        .spawn();

    shutdown_signal().await;

    info!("Shutting down...");
    let stats = handle.stop_and_join().await?;
    info!(
        "Forwarded {} message(s) to the device and {} to the DAW, {} callback(s) fired ({} failed)",
        stats.to_device, stats.to_daw, stats.callbacks, stats.callback_failures
    );
    info!("Launch Mirror shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
