//! CLI module for jobcast
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing with clap
//! - Configuration loading with CLI overrides
//! - Command execution

pub mod executor;
pub mod parser;

pub use executor::execute_command;
pub use parser::{Cli, Commands};

use crate::config::ConfigLoader;
use crate::config::settings::Settings;
use crate::error::AppResult;

/// Load configuration honoring the `--config`, `--verbose` and `--quiet`
/// flags.
pub fn load_settings(cli: &Cli) -> AppResult<Settings> {
    let loader = match cli.config {
        Some(ref path) => ConfigLoader::from_file(path),
        None => ConfigLoader::new()?,
    };

    let mut settings = loader.load()?;

    if cli.verbose {
        settings.logger.level = "debug".to_string();
    } else if cli.quiet {
        settings.logger.level = "error".to_string();
    }

    Ok(settings)
}
