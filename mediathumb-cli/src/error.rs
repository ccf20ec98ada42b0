//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use mediathumb::background::BackgroundError;
use mediathumb::config::ConfigFileError;
use mediathumb::derivative::AssetId;
use mediathumb::metadata::MetadataError;
use mediathumb::service::ServiceError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to create service
    ServiceCreation(ServiceError),
    /// Metadata query failed
    Metadata(MetadataError),
    /// Failed to queue background work
    Backfill(BackgroundError),
    /// Asset id has no metadata row
    AssetNotFound(AssetId),
    /// A generation step reported failure
    Generation { asset_id: AssetId, step: String },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::ServiceCreation(ServiceError::Metadata(_)) => {
                eprintln!();
                eprintln!("Check that [storage] database in the config file points");
                eprintln!("at a readable media database.");
                eprintln!("Run 'mediathumb config path' to locate the config file.");
            }
            CliError::Generation { .. } => {
                eprintln!();
                eprintln!("Details are in the log file named by [logging] file.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ServiceCreation(e) => write!(f, "Failed to create service: {}", e),
            CliError::Metadata(e) => write!(f, "Metadata error: {}", e),
            CliError::Backfill(e) => write!(f, "Failed to queue work: {}", e),
            CliError::AssetNotFound(id) => write!(f, "No asset with id {}", id),
            CliError::Generation { asset_id, step } => {
                write!(f, "{} failed for asset {}", step, asset_id)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ServiceCreation(e) => Some(e),
            CliError::Metadata(e) => Some(e),
            CliError::Backfill(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::ServiceCreation(e)
    }
}

impl From<MetadataError> for CliError {
    fn from(e: MetadataError) -> Self {
        CliError::Metadata(e)
    }
}

impl From<BackgroundError> for CliError {
    fn from(e: BackgroundError) -> Self {
        CliError::Backfill(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(CliError::AssetNotFound(7).to_string(), "No asset with id 7");
        assert_eq!(
            CliError::Generation {
                asset_id: 3,
                step: "LCD".to_string()
            }
            .to_string(),
            "LCD failed for asset 3"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: CliError = ConfigFileError::WriteError("disk full".to_string()).into();
        assert!(matches!(err, CliError::Config(ref msg) if msg.contains("disk full")));
    }
}
