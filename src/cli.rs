// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `scantest`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scantest",
    version,
    about = "Run scanner hardware tests and keep the rig in a safe state.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// When omitted, `scantest.toml` is used if it exists, otherwise the
    /// built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Address to serve the HTTP API on (overrides `[server].bind`).
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Run the dummy scripts instead of the hardware ones.
    #[arg(long)]
    pub dummy: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCANTEST_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
