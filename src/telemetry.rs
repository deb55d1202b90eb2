/// Telemetry Module - Structured Logging with Tracing
///
/// - JSON vs pretty format
/// - Optional log file, rotated daily, hourly or never
/// - RUST_LOG env var overrides the configured level
/// - Truncation and progress-sampling helpers

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Settings;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub log_level: String,
    /// Log format: "json" or "pretty"
    pub log_format: String,
    /// Optional log file path (None = console only)
    pub log_file: Option<String>,
    /// Rotation interval: "daily", "hourly", "never"
    pub rotation: String,
}

impl TelemetryConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            log_level: settings.log_level.clone(),
            log_format: settings.log_format.clone(),
            log_file: settings.log_file.clone(),
            rotation: settings.log_rotation.clone(),
        }
    }
}

/// Initialize tracing subscriber
///
/// The returned guard must be held until exit so file logs get flushed.
pub fn init_tracing(
    config: TelemetryConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let Some(log_file_path) = config.log_file else {
        if config.log_format == "json" {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_current_span(true).with_span_list(true))
                .try_init()?;
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_target(false).with_thread_ids(false))
                .try_init()?;
        }
        return Ok(None);
    };

    let path = std::path::Path::new(&log_file_path);
    let directory = path.parent()
        .ok_or("Invalid log file path: no parent directory")?;
    let file_name = path.file_name()
        .ok_or("Invalid log file path: no filename")?;
    let filename_prefix = path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or("Invalid log file path: no filename")?;

    let file_appender = match config.rotation.as_str() {
        "hourly" => rolling::hourly(directory, filename_prefix),
        "never" => rolling::never(directory, file_name),
        _ => rolling::daily(directory, filename_prefix),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(non_blocking)
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking)
            )
            .try_init()?;
    }

    Ok(Some(guard))
}

/// Truncate hex string for logging
///
/// Example: "0a1b2c3d4e5f67890a1b2c3d4e5f6789" → "0a1b2c3d4e5f6789..."
pub fn truncate_hex(hex: &str, len: usize) -> String {
    if hex.len() <= len {
        hex.to_string()
    } else {
        format!("{}...", &hex[..len])
    }
}

/// Fires every `interval` ticks, starting with the `interval`-th one
pub struct ProgressCounter {
    count: u64,
    interval: u64,
}

impl ProgressCounter {
    pub fn new(interval: u64) -> Self {
        Self { count: 0, interval }
    }

    /// Count one event; true when the running count is a multiple of the interval
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        self.interval != 0 && self.count % self.interval == 0
    }
}
