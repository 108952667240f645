//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `ARBOR_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `warn`
//!
//! Logs go to STDERR so stdout carries only command output (and stays valid
//! JSON under `--json`).

use clap::ValueEnum;
use tracing_subscriber::fmt;

pub const LOG_ENV: &str = "ARBOR_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Resolve the effective level from the flag and the raw env value.
pub fn effective_level(cli_level: Option<LogLevel>, env_value: Option<&str>) -> tracing::Level {
    match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => env_value
            .and_then(parse_level_str)
            .unwrap_or(tracing::Level::WARN),
    }
}

/// Initialise the global subscriber. Call once at startup; later calls are
/// ignored.
pub fn init_logging(cli_level: Option<LogLevel>) {
    let env_value = std::env::var(LOG_ENV).ok();
    let level = effective_level(cli_level, env_value.as_deref());

    let _ = fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_env() {
        let level = effective_level(Some(LogLevel::Debug), Some("error"));
        assert_eq!(level, tracing::Level::DEBUG);
    }

    #[test]
    fn env_used_without_flag() {
        assert_eq!(effective_level(None, Some(" Info ")), tracing::Level::INFO);
        assert_eq!(effective_level(None, Some("warning")), tracing::Level::WARN);
    }

    #[test]
    fn unknown_env_falls_back_to_warn() {
        assert_eq!(effective_level(None, Some("loud")), tracing::Level::WARN);
        assert_eq!(effective_level(None, None), tracing::Level::WARN);
    }
}
