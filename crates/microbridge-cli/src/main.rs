//! `microbridge-cli` – bridge host loop
//!
//! This binary is the entry point for the microbridge stack.  It:
//!
//! 1. Initialises structured logging (`RUST_LOG`, optional JSON format).
//! 2. Loads `~/.microbridge/config.toml` (defaults when absent, with
//!    `MICROBRIDGE_*` env overrides).
//! 3. Builds the middleware context, the shared command cell, and the
//!    [`SerialBridge`]; a setup failure exits non-zero.
//! 4. Pumps the bridge: one dispatch step per iteration, a status publish
//!    every configured period, until **Ctrl-C** flips the shutdown flag.

mod config;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use microbridge_middleware::{Context, SerialBridge};
use microbridge_types::CommandCell;

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set MICROBRIDGE_LOG_FORMAT=json to emit newline-delimited JSON logs
    // suitable for log aggregators.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("MICROBRIDGE_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            // First run: persist the defaults so users have a file to edit.
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  No config found – wrote defaults to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Could not write default config".yellow(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── Bridge setup ──────────────────────────────────────────────────────
    let ctx = Context::new();
    let cell = Arc::new(CommandCell::default());
    let mut bridge = SerialBridge::new(ctx, Arc::clone(&cell), cfg.bridge_config());

    if let Err(e) = bridge.initialize() {
        error!(error = %e, "bridge setup failed");
        eprintln!("{}: {}", "Fatal".red().bold(), e);
        std::process::exit(1);
    }

    info!(
        command_topic = %cfg.command_topic,
        status_topic = %cfg.status_topic,
        status_period_ms = cfg.status_period_ms,
        "bridge running"
    );
    println!(
        "  Bridge up: {} → cell, {} ← \"{}\" every {} ms.\n",
        cfg.command_topic.bold(),
        cfg.status_topic.bold(),
        cfg.status_payload,
        cfg.status_period_ms
    );

    // ── Spin / publish loop ───────────────────────────────────────────────
    let status_period = Duration::from_millis(cfg.status_period_ms);
    let mut last_status = tokio::time::Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        match bridge.start().await {
            Ok(true) => debug!(linear_x = cell.load(), "command value updated"),
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "dispatch step failed");
                break;
            }
        }

        if last_status.elapsed() >= status_period {
            match bridge.publish(&cfg.status_payload) {
                Ok(true) => debug!("status delivered"),
                Ok(false) => debug!("status dropped (no listener)"),
                Err(e) => {
                    error!(error = %e, "status publish failed");
                    break;
                }
            }
            last_status = tokio::time::Instant::now();
        }
    }

    info!(linear_x = cell.load(), "bridge stopped");
    println!("{}", "  ✓ Bridge stopped.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "microbridge".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Serial command/telemetry bridge");
    println!();
}
