//! Structured logging foundation for rite.
//!
//! Dual-mode logging on stderr:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSON lines for agent workflows
//!
//! stdout stays reserved for command payloads (plan JSON, reports).
//! Respects the `RITE_LOG` / `RUST_LOG` filter variables and
//! `RITE_LOG_FORMAT` for format selection.

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Jsonl,
}

/// Logging configuration resolved from CLI flags and environment.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level directive when no env filter is set.
    pub level: String,
    pub format: LogFormat,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Resolve from verbosity flags and environment.
    ///
    /// `-v` raises to debug, `-vv` to trace; `--quiet` drops to error.
    /// `RITE_LOG_FORMAT=jsonl` switches to JSON lines.
    pub fn from_env(verbose: u8, quiet: bool) -> Self {
        let level = if quiet {
            "error"
        } else {
            match verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        };

        let format = match std::env::var("RITE_LOG_FORMAT").as_deref() {
            Ok("jsonl") | Ok("json") => LogFormat::Jsonl,
            _ => LogFormat::Human,
        };

        Self {
            level: level.to_string(),
            format,
            timestamps: true,
        }
    }
}

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_env("RITE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(format!("rite_core={}", config.level)));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .init();
            }
        }
        LogFormat::Jsonl => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(LogConfig::from_env(0, false).level, "info");
        assert_eq!(LogConfig::from_env(1, false).level, "debug");
        assert_eq!(LogConfig::from_env(3, false).level, "trace");
        assert_eq!(LogConfig::from_env(2, true).level, "error");
    }
}
