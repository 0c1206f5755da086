use crate::models::ReconcileResult;
use env_logger::{Builder, Target};
use log::{Level, LevelFilter, SetLoggerError};
use std::env;
use std::io::Write;

fn parse_level(value: &str) -> LevelFilter {
    match value.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Install the process logger. Output goes to stderr so command results on
/// stdout stay machine readable.
pub fn init_logging() -> Result<(), SetLoggerError> {
    let level = parse_level(&env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));

    let mut builder = Builder::new();
    builder.format(|buf, record| {
        let timestamp = buf.timestamp();
        match record.level() {
            Level::Info => writeln!(
                buf,
                "{} [INFO] [{}]: {}",
                timestamp,
                record.target(),
                record.args()
            ),
            level => writeln!(
                buf,
                "{} [{}] [{}:{}] {}: {}",
                timestamp,
                level,
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.target(),
                record.args()
            ),
        }
    });

    if env::var("RUST_ENV").as_deref() == Ok("production") {
        builder.filter_module("reqwest", LevelFilter::Warn);
        builder.filter_module("hyper", LevelFilter::Warn);
        builder.filter_module("sqlx", LevelFilter::Warn);
    }

    builder.filter_level(level).target(Target::Stderr).try_init()
}

pub fn log_error_with_context(error: &anyhow::Error, context: &str) {
    log::error!("[{}] {}", context, error);

    for cause in error.chain().skip(1) {
        log::error!("  Caused by: {}", cause);
    }
}

pub fn log_network_error(operation: &str, error: &dyn std::error::Error) {
    log::warn!("[Network] {} failed: {}", operation, error);
}

pub fn log_reconcile_summary(
    owner_id: &str,
    calendar_id: &str,
    result: &ReconcileResult,
    duration_ms: u64,
) {
    if result.errors.is_empty() {
        log::info!(
            "[Sync] owner {} calendar '{}': {} created, {} updated, {} deleted in {}ms",
            owner_id,
            calendar_id,
            result.created,
            result.updated,
            result.deleted,
            duration_ms
        );
    } else {
        log::warn!(
            "[Sync] owner {} calendar '{}': {} created, {} updated, {} deleted, {} errors in {}ms",
            owner_id,
            calendar_id,
            result.created,
            result.updated,
            result.deleted,
            result.errors.len(),
            duration_ms
        );
    }
}

pub fn log_auth_event(event: &str, detail: &str) {
    log::info!("[Auth] {} ({})", event, detail);
}
