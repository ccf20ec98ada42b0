//! File-backed derivative storage.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::derivative::{DerivativeKind, Dimensions};

use super::path::{asset_derivative_dir, derivative_path, ex_dir, ex_path, thumbs_root};
use super::StoreError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Persists LCD, THUMB and THUMB_COMPRESSED files under a media root.
///
/// Writes go to a temporary file in the target directory and are renamed
/// into place, so readers only ever see complete files.
#[derive(Debug, Clone)]
pub struct DerivativeStore {
    root: PathBuf,
}

impl DerivativeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Media root the store mirrors.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of the derivative tree (`<root>/.thumbs`).
    pub fn thumbs_root(&self) -> PathBuf {
        thumbs_root(&self.root)
    }

    pub fn path_for(&self, source: &Path, kind: DerivativeKind) -> Result<PathBuf, StoreError> {
        derivative_path(&self.root, source, kind)
    }

    pub fn ex_path_for(&self, source: &Path, kind: DerivativeKind) -> Result<PathBuf, StoreError> {
        ex_path(&self.root, source, kind)
    }

    /// Atomically write a derivative. Returns the number of bytes written.
    pub fn save(&self, source: &Path, kind: DerivativeKind, bytes: &[u8]) -> Result<u64, StoreError> {
        let path = self.path_for(source, kind)?;
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), kind = %kind, bytes = bytes.len(), "Saved derivative");
        Ok(bytes.len() as u64)
    }

    /// Atomically write an unrotated scratch copy.
    pub fn save_ex(&self, source: &Path, kind: DerivativeKind, bytes: &[u8]) -> Result<u64, StoreError> {
        let path = self.ex_path_for(source, kind)?;
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), kind = %kind, "Saved scratch copy");
        Ok(bytes.len() as u64)
    }

    /// Read a derivative; `Ok(None)` if it does not exist.
    pub fn read(&self, source: &Path, kind: DerivativeKind) -> Result<Option<Vec<u8>>, StoreError> {
        read_optional(&self.path_for(source, kind)?)
    }

    pub fn read_ex(&self, source: &Path, kind: DerivativeKind) -> Result<Option<Vec<u8>>, StoreError> {
        read_optional(&self.ex_path_for(source, kind)?)
    }

    pub fn exists(&self, source: &Path, kind: DerivativeKind) -> bool {
        self.path_for(source, kind)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    pub fn ex_exists(&self, source: &Path, kind: DerivativeKind) -> bool {
        self.ex_path_for(source, kind)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Pixel dimensions of a stored derivative, read from its header.
    pub fn dimensions(&self, source: &Path, kind: DerivativeKind) -> Option<Dimensions> {
        let path = self.path_for(source, kind).ok()?;
        image::image_dimensions(&path)
            .ok()
            .map(|(w, h)| Dimensions::new(w, h))
    }

    /// Size on disk of a stored derivative.
    pub fn file_size(&self, source: &Path, kind: DerivativeKind) -> Option<u64> {
        let path = self.path_for(source, kind).ok()?;
        fs::metadata(path).ok().map(|m| m.len())
    }

    /// Delete one derivative. Returns `false` if it was already absent.
    pub fn delete(&self, source: &Path, kind: DerivativeKind) -> Result<bool, StoreError> {
        let path = self.path_for(source, kind)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                trace!(path = %path.display(), "Deleted derivative");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Remove the THM_EX scratch directory of `source`.
    pub fn delete_ex_dir(&self, source: &Path) -> Result<bool, StoreError> {
        remove_dir_optional(&ex_dir(&self.root, source)?)
    }

    /// Remove every file derivative of `source`.
    pub fn delete_asset_dir(&self, source: &Path) -> Result<bool, StoreError> {
        remove_dir_optional(&asset_derivative_dir(&self.root, source)?)
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn remove_dir_optional(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().ok_or_else(|| {
        io_err(io::Error::new(ErrorKind::InvalidInput, "path has no parent"))
    })?;
    fs::create_dir_all(parent).map_err(io_err)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(
        ".{}.{}-{}.tmp",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    if let Err(e) = fs::write(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_err(e));
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (DerivativeStore, TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let store = DerivativeStore::new(temp.path());
        let source = temp.path().join("DCIM").join("a.jpg");
        (store, temp, source)
    }

    #[test]
    fn test_save_and_read() {
        let (store, _temp, source) = create_store();
        assert!(!store.exists(&source, DerivativeKind::Thumb));

        let written = store.save(&source, DerivativeKind::Thumb, b"jpeg").unwrap();
        assert_eq!(written, 4);
        assert!(store.exists(&source, DerivativeKind::Thumb));
        assert_eq!(
            store.read(&source, DerivativeKind::Thumb).unwrap(),
            Some(b"jpeg".to_vec())
        );
        assert_eq!(store.file_size(&source, DerivativeKind::Thumb), Some(4));
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let (store, _temp, source) = create_store();
        store.save(&source, DerivativeKind::Lcd, b"one").unwrap();
        store.save(&source, DerivativeKind::Lcd, b"two").unwrap();

        let dir = store.path_for(&source, DerivativeKind::Lcd).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["LCD.jpg".to_string()]);
        assert_eq!(
            store.read(&source, DerivativeKind::Lcd).unwrap(),
            Some(b"two".to_vec())
        );
    }

    #[test]
    fn test_read_missing_is_none() {
        let (store, _temp, source) = create_store();
        assert_eq!(store.read(&source, DerivativeKind::Lcd).unwrap(), None);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, _temp, source) = create_store();
        store.save(&source, DerivativeKind::Lcd, b"x").unwrap();
        assert!(store.delete(&source, DerivativeKind::Lcd).unwrap());
        assert!(!store.delete(&source, DerivativeKind::Lcd).unwrap());
    }

    #[test]
    fn test_ex_dir_lifecycle() {
        let (store, _temp, source) = create_store();
        store.save_ex(&source, DerivativeKind::Lcd, b"raw").unwrap();
        assert!(store.ex_exists(&source, DerivativeKind::Lcd));
        assert_eq!(
            store.read_ex(&source, DerivativeKind::Lcd).unwrap(),
            Some(b"raw".to_vec())
        );

        assert!(store.delete_ex_dir(&source).unwrap());
        assert!(!store.ex_exists(&source, DerivativeKind::Lcd));
        assert!(!store.delete_ex_dir(&source).unwrap());
    }

    #[test]
    fn test_delete_asset_dir_removes_everything() {
        let (store, _temp, source) = create_store();
        store.save(&source, DerivativeKind::Lcd, b"l").unwrap();
        store.save(&source, DerivativeKind::Thumb, b"t").unwrap();
        assert!(store.delete_asset_dir(&source).unwrap());
        assert!(!store.exists(&source, DerivativeKind::Lcd));
        assert!(!store.exists(&source, DerivativeKind::Thumb));
    }

    #[test]
    fn test_dimensions_from_header() {
        let (store, _temp, source) = create_store();
        let img = image::RgbImage::from_pixel(30, 20, image::Rgb([1, 2, 3]));
        let mut bytes = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut bytes)
            .encode_image(&img)
            .unwrap();
        store.save(&source, DerivativeKind::Lcd, &bytes).unwrap();
        assert_eq!(
            store.dimensions(&source, DerivativeKind::Lcd),
            Some(Dimensions::new(30, 20))
        );
    }
}
