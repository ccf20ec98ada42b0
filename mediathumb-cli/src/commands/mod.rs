//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`age`] - LCD aging (run or preview)
//! - [`backfill`] - Queue generation for assets missing a derivative
//! - [`config`] - Configuration management (path, show, init)
//! - [`generate`] - Generate derivatives for a single asset
//! - [`status`] - Derivative cache summary

pub mod age;
pub mod backfill;
pub mod common;
pub mod config;
pub mod generate;
pub mod status;
