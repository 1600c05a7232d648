//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to the console and, optionally,
//! to a JSON log file for post-mortem analysis of interrupted runs.
//!
//! Library components only emit `tracing` events; installing a subscriber is left to
//! the binary that embeds them.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::fs;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(&log_level));

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");

        let file_layer = if config.file_output {
            match fs::create_dir_all(&config.directory) {
                Ok(()) => {
                    let file_appender =
                        tracing_appender::rolling::never(&config.directory, &log_filename);
                    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                    // The writer must outlive every event; logging lives for the process.
                    std::mem::forget(guard);
                    Some(
                        fmt::layer()
                            .with_writer(file_writer)
                            .with_target(true)
                            .with_level(true)
                            .with_ansi(false)
                            .json()
                            .with_filter(EnvFilter::new(&log_level)),
                    )
                }
                Err(e) => {
                    eprintln!(
                        "Failed to create log directory {}: {e}; logging to console only",
                        config.directory.display()
                    );
                    None
                }
            }
        } else {
            None
        };
        let log_file = if file_layer.is_some() {
            config.directory.join(&log_filename).display().to_string()
        } else {
            "disabled".to_string()
        };

        // A global subscriber may already be installed by the embedding application
        if tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_file,
            "STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("EXTRACT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for run-level operations
pub fn log_run_operation(
    operation: &str,
    run_name: &str,
    execution_id: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        run_name = %run_name,
        execution_id = %execution_id,
        status = %status,
        details = details,
        "RUN_OPERATION"
    );
}

/// Log structured data for unit-level operations
pub fn log_unit_operation(
    operation: &str,
    execution_id: &str,
    unit: &str,
    record_count: Option<usize>,
    status: &str,
) {
    tracing::info!(
        operation = %operation,
        execution_id = %execution_id,
        unit = %unit,
        record_count = record_count,
        status = %status,
        "UNIT_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        "ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: Some("warn".to_string()),
            directory: dir.path().join("logs"),
            file_output: false,
        };
        init_structured_logging(&config);
        init_structured_logging(&config);
    }
}
