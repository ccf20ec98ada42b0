//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`. None of them
//! need logging or a running service.

use std::path::Path;

use clap::Subcommand;
use mediathumb::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration as INI
    Show,

    /// Write a default configuration file if none exists
    Init {
        /// Overwrite an existing file with defaults
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand against `config_path`, or the default location.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);

    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Init { force } => run_init(&path, force).map(|created| {
            if created {
                println!("Created {}", path.display());
            } else {
                println!("Configuration already exists at {}", path.display());
                println!("Use --force to overwrite it with defaults.");
            }
        }),
    }
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    if !path.exists() {
        println!("# {} not found, showing defaults", path.display());
    }
    print!("{}", config.to_ini_string());
    Ok(())
}

/// Write defaults to `path`. Returns whether a file was written.
pub(crate) fn run_init(path: &Path, force: bool) -> Result<bool, CliError> {
    if path.exists() && !force {
        return Ok(false);
    }
    ConfigFile::default().save_to(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_then_keeps_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mediathumb/config.ini");

        assert!(run_init(&path, false).unwrap());
        assert!(path.exists());

        std::fs::write(&path, "[workers]\nforeground_threads = 9\n").unwrap();
        assert!(!run_init(&path, false).unwrap());
        let kept = ConfigFile::load_from(&path).unwrap();
        assert_eq!(kept.workers.foreground_threads, 9);
    }

    #[test]
    fn test_init_force_resets_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[workers]\nforeground_threads = 9\n").unwrap();

        assert!(run_init(&path, true).unwrap());
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }
}
