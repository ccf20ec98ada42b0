//! mediathumb - derivative image generation for a media library
//!
//! Produces and maintains the scaled copies a gallery shows instead of the
//! originals: a screen-sized LCD, a square THUMB, an ASTC-compressed thumb,
//! and two tiny squares kept in a key-value store.
//!
//! # High-Level API
//!
//! Most callers build a [`service::ThumbnailService`] from the user config
//! and go through it:
//!
//! ```no_run
//! use mediathumb::config::ConfigFile;
//! use mediathumb::derivative::{AssetDerivativeRequest, DerivativeKind};
//! use mediathumb::service::ThumbnailService;
//!
//! let service = ThumbnailService::from_config(ConfigFile::load()?)?;
//! let request = AssetDerivativeRequest::new(42, "/home/me/Pictures/IMG_0042.jpg");
//! let thumb = service.get_derivative(&request, DerivativeKind::Thumb)?;
//! println!("{} bytes", thumb.bytes.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aging;
pub mod background;
pub mod config;
pub mod coordinator;
pub mod derivative;
pub mod diagnostics;
pub mod encoder;
pub mod logging;
pub mod metadata;
pub mod notify;
pub mod pipeline;
pub mod service;
pub mod source;
pub mod store;
pub mod time;
pub mod worker;

/// Version of the mediathumb library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
