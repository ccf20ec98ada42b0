//! Derivative persistence.
//!
//! File-backed kinds go through [`DerivativeStore`]; the tiny kinds go
//! through an optional [`KvStore`].

mod files;
mod kv;
mod path;

pub use files::DerivativeStore;
pub use kv::{tiny_key, KvError, KvStore, MemoryKvStore, SqliteKvStore};
pub use path::{
    asset_derivative_dir, derivative_path, ex_dir, ex_path, thumbs_root, EX_DIR, THUMBS_DIR,
};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::derivative::DerivativeKind;

/// Errors from the file-backed derivative store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The asset does not live under the media root
    #[error("asset {path} is outside media root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// The kind lives in the key-value store
    #[error("{0} is not stored as a file")]
    NotFileBacked(DerivativeKind),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
