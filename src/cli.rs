// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sitepipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitepipe",
    version,
    about = "Build, serve and live-reload a static documentation site from named task pipelines.",
    long_about = None
)]
pub struct CliArgs {
    /// Composite task or pipeline names to run, in order
    /// (e.g. `setup-bootstrap`, `dev-compile`, `dist`, `server`).
    #[arg(value_name = "TASK", required_unless_present = "list")]
    pub tasks: Vec<String>,

    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Sitepipe.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve the given tasks and print their steps without running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the registered tasks, pipelines and watch bindings.
    #[arg(long)]
    pub list: bool,
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
