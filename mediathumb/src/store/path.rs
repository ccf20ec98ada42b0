//! Derivative path construction.
//!
//! Every derivative of an asset lives in one directory that mirrors the
//! asset's path relative to the media root:
//!
//! ```text
//! <root>/.thumbs/<relative asset path>/<SUFFIX>.<ext>
//! <root>/.thumbs/<relative asset path>/THM_EX/{LCD,THM}.jpg
//! ```

use std::path::{Path, PathBuf};

use crate::derivative::{DerivativeKind, StorageMedium};

use super::StoreError;

/// Directory under the media root that holds every derivative.
pub const THUMBS_DIR: &str = ".thumbs";
/// Per-asset scratch directory for unrotated copies.
pub const EX_DIR: &str = "THM_EX";

/// Root of the derivative tree.
pub fn thumbs_root(root: &Path) -> PathBuf {
    root.join(THUMBS_DIR)
}

/// Directory holding every derivative of `source`.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use mediathumb::store::asset_derivative_dir;
///
/// let dir = asset_derivative_dir(Path::new("/media"), Path::new("/media/Camera/IMG_1.jpg")).unwrap();
/// assert_eq!(dir, Path::new("/media/.thumbs/Camera/IMG_1.jpg"));
/// ```
pub fn asset_derivative_dir(root: &Path, source: &Path) -> Result<PathBuf, StoreError> {
    let relative = source
        .strip_prefix(root)
        .map_err(|_| StoreError::OutsideRoot {
            path: source.to_path_buf(),
            root: root.to_path_buf(),
        })?;
    if relative.as_os_str().is_empty() {
        return Err(StoreError::OutsideRoot {
            path: source.to_path_buf(),
            root: root.to_path_buf(),
        });
    }
    Ok(thumbs_root(root).join(relative))
}

/// Path of a file-backed derivative of `source`.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use mediathumb::derivative::DerivativeKind;
/// use mediathumb::store::derivative_path;
///
/// let path = derivative_path(Path::new("/media"), Path::new("/media/a.jpg"), DerivativeKind::ThumbCompressed).unwrap();
/// assert_eq!(path, Path::new("/media/.thumbs/a.jpg/THM_ASTC.astc"));
/// ```
pub fn derivative_path(
    root: &Path,
    source: &Path,
    kind: DerivativeKind,
) -> Result<PathBuf, StoreError> {
    if kind.storage() != StorageMedium::File {
        return Err(StoreError::NotFileBacked(kind));
    }
    Ok(asset_derivative_dir(root, source)?.join(kind.file_name()))
}

/// Scratch directory of `source`.
pub fn ex_dir(root: &Path, source: &Path) -> Result<PathBuf, StoreError> {
    Ok(asset_derivative_dir(root, source)?.join(EX_DIR))
}

/// Path of an unrotated scratch copy. Only `Lcd` and `Thumb` have one.
pub fn ex_path(root: &Path, source: &Path, kind: DerivativeKind) -> Result<PathBuf, StoreError> {
    match kind {
        DerivativeKind::Lcd | DerivativeKind::Thumb => {
            Ok(ex_dir(root, source)?.join(format!("{}.jpg", kind.suffix())))
        }
        other => Err(StoreError::NotFileBacked(other)),
    }
}
