//! Configuration for the mediathumb service.
//!
//! User configuration lives in `~/.mediathumb/config.ini`. A missing file
//! means defaults; unknown keys are ignored.
//!
//! # Example
//!
//! ```
//! use mediathumb::config::{ConfigFile, DEFAULT_LCD_QUALITY};
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.generation.lcd_quality, DEFAULT_LCD_QUALITY);
//! assert_eq!(config.workers.foreground_threads, 4);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    AgingSettings, BackgroundSettings, ConfigFile, GenerationSettings, LoggingSettings,
    StorageSettings, WorkerSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
