//! Cashback Console
//!
//! Command-line client for the cashback platform backend. It signs admins in,
//! loads the dashboard sections, derives analytics series and QR batch
//! summaries, moves printed-QR orders through their lifecycle, and exports
//! printable QR sheets as PDF files.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod analytics;
mod api;
mod auth;
mod batches;
mod commands;
mod config;
mod dashboard;
mod diagnostics;
mod endpoints;
mod format;
mod models;
mod qr_pdf;
mod qr_render;
mod status;
mod storage;
mod validation;

use commands::{Cli, Context};
use config::AppConfig;

pub(crate) fn value_str(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Structured logging: console plus a daily rolling file under the data dir.
fn init_logging(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cashback_console_lib=debug"));

    let log_dir = config.log_dir();
    diagnostics::prune_old_logs(&log_dir);
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, diagnostics::LOG_PREFIX);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    // stdout carries the JSON result, so console logs go to stderr.
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Flushes on drop; the process exits right after the command finishes.
    std::mem::forget(_guard);
}

pub fn run() {
    let cli = Cli::parse();
    let ctx = match Context::new(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    init_logging(&ctx.config);
    info!(
        "Starting Cashback Console v{} against {}",
        env!("CARGO_PKG_VERSION"),
        ctx.client.base_url()
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(commands::dispatch(&ctx, cli.command));
    match result.and_then(|value| Ok(serde_json::to_string_pretty(&value)?)) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
