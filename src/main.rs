//! packet-relay - forwards captured IP packet summaries to a WebSocket endpoint.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use packet_relay::{
    Config, ConnectionMode, ConsoleSink, IpExtractor, PacketCapture, PnetCapture, RecordSink,
    Relay, WebSocketSink,
};

const DEFAULT_STARTUP_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "packet-relay")]
#[command(about = "Capture IP packets and forward summaries to a WebSocket endpoint")]
struct Cli {
    /// Network interface to capture on (default: first active interface)
    #[arg(short, long)]
    interface: Option<String>,

    /// List available network interfaces and exit
    #[arg(short, long)]
    list_interfaces: bool,

    /// WebSocket endpoint (e.g. ws://localhost:8080)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Open a new connection for every packet
    #[arg(long)]
    per_message: bool,

    /// Also relay IPv6 packets
    #[arg(long)]
    ipv6: bool,

    /// Stop after sending this many packets
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Print records to stdout instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_interfaces {
        println!("Available network interfaces:");
        for iface in PnetCapture::list_interfaces() {
            println!("  {}", iface);
        }
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // Config warnings go through a provisional subscriber until the
    // configured filter is known
    let startup = subscriber(log_filter(DEFAULT_STARTUP_FILTER, cli.verbose));
    let config = tracing::subscriber::with_default(startup, || load_config(&cli))?;
    tracing::subscriber::set_global_default(subscriber(log_filter(&config.log_filter, cli.verbose)))
        .context("Failed to install log subscriber")?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut capture = match &config.interface {
        Some(name) => PnetCapture::new(name),
        None => PnetCapture::on_default_interface(),
    }
    .context("Failed to open capture interface")?;
    capture.set_running(running);

    tracing::info!("Capturing on interface {}", capture.interface_name());

    let extractor = IpExtractor::new().with_ipv6(config.include_ipv6);

    if cli.dry_run {
        relay(capture, ConsoleSink::new(), extractor, &config)
    } else {
        let sink = WebSocketSink::new(config.endpoint.clone(), config.connection_mode);
        relay(capture, sink, extractor, &config)
    }
}

fn relay<S: RecordSink>(
    capture: PnetCapture,
    sink: S,
    extractor: IpExtractor,
    config: &Config,
) -> Result<()> {
    let stats = Relay::new(capture, sink)
        .with_extractor(extractor)
        .with_max_packets(config.max_packets)
        .run()
        .context("Relay stopped")?;

    tracing::debug!("Final stats: {:?}", stats);
    Ok(())
}

/// Config file and environment first, command-line flags on top.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(interface) = &cli.interface {
        config.interface = Some(interface.clone());
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if cli.per_message {
        config.connection_mode = ConnectionMode::PerMessage;
    }
    if cli.ipv6 {
        config.include_ipv6 = true;
    }
    if cli.count.is_some() {
        config.max_packets = cli.count;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn log_filter(fallback: &str, verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    }
}

fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
}
