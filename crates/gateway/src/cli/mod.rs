pub mod config;
pub mod doctor;
pub mod run;

use clap::{Parser, Subcommand};

/// nextai-gateway — a personal AI-assistant control plane.
#[derive(Debug, Parser)]
#[command(name = "nextai-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Run,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// The config file path `Config::load` would resolve, for display in
/// `doctor`/`config` output (loading itself happens inside `Config::load`).
pub fn config_path() -> String {
    std::env::var("NEXTAI_CONFIG").unwrap_or_else(|_| "./data/config.toml".to_string())
}
