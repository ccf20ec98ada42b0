//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and service creation
//! to reduce duplication across command handlers.

use std::path::Path;

use tracing::info;

use mediathumb::config::{config_file_path, ConfigFile};
use mediathumb::logging::{init_logging, split_log_path, LoggingGuard};
use mediathumb::service::ThumbnailService;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a runner from the config at `config_path`, or the default
    /// config file when `None`.
    ///
    /// # Arguments
    ///
    /// * `verbose` - Mirror log output to stdout
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn new(config_path: Option<&Path>, verbose: bool, debug_mode: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load_from(&config_file_path())?,
        };

        let (log_dir, log_file) = split_log_path(&config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;
        let logging_guard = init_logging(&log_dir, &log_file, verbose, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("mediathumb v{}", mediathumb::VERSION);
        info!(command, log = %self.logging_guard.path().display(), "CLI command started");
    }

    /// Build a service from the loaded configuration.
    pub fn create_service(&self) -> Result<ThumbnailService, CliError> {
        ThumbnailService::from_config(self.config.clone())
            .map_err(CliError::ServiceCreation)
            .inspect(|_| info!("Service created successfully"))
    }
}
