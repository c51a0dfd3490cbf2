use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::fs;
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::scheduler::analytics::ANALYTICS_TARGET;

// Define where to store logs
const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "scheduler.log";
const ANALYTICS_FILE: &str = "analytics.log";

static INIT: Once = Once::new();

/// Initializes the global logger.
///
/// Log level is controlled by the `RUST_LOG` environment variable.
/// Example: `RUST_LOG=debug cargo test`
///
/// If `RUST_LOG` is not set, it defaults to `info`.
/// Logs will be written to `logs/scheduler.log` and the console. Calling this more than once is a
/// no-op.
pub fn init() {
    INIT.call_once(apply_dispatch);
}

fn apply_dispatch() {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create log directory at '{}': {}", LOG_DIR, e);
    }

    let log_file_path = format!("{}/{}", LOG_DIR, LOG_FILE);

    // Get the log level from RUST_LOG, defaulting to "info" (RUST_LOG=debug or RUST_LOG=warn)
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let log_level_filter = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let base_config = Dispatch::new().level(log_level_filter).level_for("serde", LevelFilter::Warn);

    let console_config = Dispatch::new()
        .format(|out, message, record| {
            let colors = fern::colors::ColoredLevelConfig::new()
                .error(fern::colors::Color::Red)
                .warn(fern::colors::Color::Yellow)
                .info(fern::colors::Color::Green)
                .debug(fern::colors::Color::Blue)
                .trace(fern::colors::Color::BrightBlack);

            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = base_config.chain(console_config);

    match fern::log_file(&log_file_path) {
        Ok(file) => {
            let file_config = Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.target(), message))
                })
                .chain(file);
            dispatch = dispatch.chain(file_config);
        }
        Err(e) => eprintln!("Failed to open log file '{}': {}. Logging to console only.", log_file_path, e),
    }

    match dispatch.apply() {
        Ok(()) => log::info!("Logger initialized. Logging to console and '{}'.", log_file_path),
        Err(e) => eprintln!("Failed to apply logger configuration: {}", e),
    }
}

/// Routes the structured scheduling events of `ANALYTICS_TARGET` into `<log_dir>/analytics.log`.
///
/// # Returns
/// The writer guard, which must be kept alive for as long as events should be flushed, or `None`
/// if a global `tracing` subscriber was already installed.
pub fn init_analytics(log_dir: &str) -> Option<WorkerGuard> {
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("Failed to create analytics directory at '{}': {}", log_dir, e);
        return None;
    }

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, ANALYTICS_FILE));
    let analytics_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .with_filter(EnvFilter::new(format!("{}=info", ANALYTICS_TARGET)));

    match tracing::subscriber::set_global_default(tracing_subscriber::registry().with(analytics_layer)) {
        Ok(()) => {
            log::info!("Analytics events are written to '{}/{}'.", log_dir, ANALYTICS_FILE);
            Some(guard)
        }
        Err(e) => {
            log::warn!("Analytics sink not installed: {}", e);
            None
        }
    }
}
