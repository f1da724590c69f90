// ============================================
// File: crates/aries-server/src/main.rs
// ============================================
//! # Aries Server Entry Point
//!
//! ## Creation Reason
//! Main entry point for the Aries server binary.
//! Handles CLI parsing, logging setup, and server start/stop.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading and validation
//! - Server execution until Ctrl-C
//!
//! ## Usage
//! ```bash
//! aries-server start --config /etc/aries/server.toml
//! aries-server start --config server.toml --debug-packets
//! aries-server validate --config server.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RUST_LOG` overrides `[logging] level`
//! - A bootstrap failure exits with status 1 after logging
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aries_server::debug::TracingDebugger;
use aries_server::{Server, ServerConfig};

// ============================================
// CLI Definition
// ============================================

/// Aries protocol server
#[derive(Parser, Debug)]
#[command(name = "aries-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/aries/server.toml")]
        config: PathBuf,

        /// Log every raw frame as hex at debug level
        #[arg(long)]
        debug_packets: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/aries/server.toml")]
        config: PathBuf,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start {
            config,
            debug_packets,
        } => cmd_start(config, debug_packets).await,
        Commands::Validate { config } => cmd_validate(config).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Starts the server and runs until Ctrl-C.
async fn cmd_start(config_path: PathBuf, debug_packets: bool) -> anyhow::Result<()> {
    let config = ServerConfig::load(&config_path).await?;
    init_logging(&config.logging.level);

    info!("════════════════════════════════════════");
    info!("Call sign:  {}", config.call_sign()?);
    info!("Public:     {}", config.public_host()?);
    info!("Internal:   {}", config.internal_host()?);
    info!("Binding:    {}", config.binding()?);
    if let Some(plain) = config.server.plain_binding {
        info!("Plain:      {}", plain);
    }
    info!("════════════════════════════════════════");

    let mut builder = Server::builder(config);
    if debug_packets {
        builder = builder.debugger(Arc::new(TracingDebugger::new()));
    }
    let server = builder.build()?;

    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");

    server.shutdown().await;
    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ServerConfig::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Server:");
    println!("   Call sign:  {}", config.call_sign()?);
    println!("   Public:     {}", config.public_host()?);
    println!("   Internal:   {}", config.internal_host()?);
    println!("   Binding:    {}", config.binding()?);
    if let Some(plain) = config.server.plain_binding {
        println!("   Plain:      {plain}");
    }
    println!("   Handlers:   {}", config.server.handlers.join(", "));
    println!();
    println!("Limits:");
    println!("   Max Sessions:    {}", config.limits.max_sessions);
    println!("   Max Frame Size:  {}", config.limits.max_frame_size);
    println!();
    println!("Statistics:");
    println!("   Digest:       {}s", config.statistics.digest_interval_secs);
    println!("   Granularity:  {}s", config.statistics.granularity_secs);
    println!("   Retention:    {}s", config.statistics.retention_secs);
    println!();

    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}
