//! Logging infrastructure for Magic Eye.

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::io::{IsTerminal, Write};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level
    pub level: LevelFilter,
    /// Show timestamps
    pub timestamps: bool,
    /// Show module path
    pub module_path: bool,
    /// Colorize the level tag (only when stderr is a terminal)
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            timestamps: true,
            module_path: false,
            color: stderr_is_terminal(),
        }
    }
}

impl LogConfig {
    /// Create a log config from application config.
    pub fn from_config(config: &Config) -> Self {
        let level = parse_level(&config.logging.log_level);
        Self {
            level,
            timestamps: true,
            module_path: config.logging.module_path
                || level == LevelFilter::Debug
                || level == LevelFilter::Trace,
            color: stderr_is_terminal(),
        }
    }

    /// Create a verbose log config for CLI.
    pub fn verbose() -> Self {
        Self {
            level: LevelFilter::Debug,
            timestamps: true,
            module_path: true,
            color: stderr_is_terminal(),
        }
    }

    /// Create a quiet log config (errors only).
    pub fn quiet() -> Self {
        Self {
            level: LevelFilter::Error,
            timestamps: false,
            module_path: false,
            color: stderr_is_terminal(),
        }
    }
}

fn stderr_is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

/// Parse a level name, defaulting to `Info`.
pub fn parse_level(name: &str) -> LevelFilter {
    match name.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

/// Initialize the logging system. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let mut builder = Builder::new();

    builder.filter_level(config.level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    let level_for_log = config.level;
    builder.format(move |buf, record| {
        let mut output = String::new();

        if config.timestamps {
            output.push_str(&format!("{} ", Local::now().format("%Y-%m-%d %H:%M:%S")));
        }

        let level_str = match (record.level(), config.color) {
            (log::Level::Error, true) => "\x1b[31mERROR\x1b[0m",
            (log::Level::Warn, true) => "\x1b[33mWARN\x1b[0m ",
            (log::Level::Info, true) => "\x1b[32mINFO\x1b[0m ",
            (log::Level::Debug, true) => "\x1b[34mDEBUG\x1b[0m",
            (log::Level::Trace, true) => "\x1b[35mTRACE\x1b[0m",
            (log::Level::Error, false) => "ERROR",
            (log::Level::Warn, false) => "WARN ",
            (log::Level::Info, false) => "INFO ",
            (log::Level::Debug, false) => "DEBUG",
            (log::Level::Trace, false) => "TRACE",
        };
        output.push_str(&format!("[{}] ", level_str));

        if config.module_path {
            if let Some(path) = record.module_path() {
                output.push_str(&format!("{}: ", path));
            }
        }

        output.push_str(&format!("{}", record.args()));

        writeln!(buf, "{}", output)
    });

    builder
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to initialize logging: {}", e)))?;

    log::debug!("Logging initialized with level: {:?}", level_for_log);
    Ok(())
}
