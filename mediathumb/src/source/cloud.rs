//! Cloud copies of originals and LCDs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::derivative::{AssetDerivativeRequest, DerivativeKind};
use crate::store::derivative_path;

/// Errors from a cloud source.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("no cloud source configured")]
    Unavailable,

    #[error("asset {0} has no cloud copy")]
    Missing(i64),

    #[error("asset path {0} is outside the media root")]
    OutsideRoot(PathBuf),

    #[error("cloud read failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads bytes for assets whose originals live in the cloud.
pub trait CloudFetcher: Send + Sync {
    /// Encoded bytes of the full original.
    fn fetch_original(&self, request: &AssetDerivativeRequest) -> Result<Vec<u8>, CloudError>;

    /// Encoded bytes of the cloud-side LCD rendition (unrotated).
    fn fetch_lcd(&self, request: &AssetDerivativeRequest) -> Result<Vec<u8>, CloudError>;
}

/// Fetcher for deployments without a cloud.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCloud;

impl CloudFetcher for NoCloud {
    fn fetch_original(&self, _request: &AssetDerivativeRequest) -> Result<Vec<u8>, CloudError> {
        Err(CloudError::Unavailable)
    }

    fn fetch_lcd(&self, _request: &AssetDerivativeRequest) -> Result<Vec<u8>, CloudError> {
        Err(CloudError::Unavailable)
    }
}

/// Reads "cloud" copies from a local mirror of the media root.
///
/// The mirror uses the same relative layout as the media root; its LCDs live
/// under `<mirror>/.thumbs/<relative path>/LCD.jpg`.
#[derive(Debug, Clone)]
pub struct MirrorDirFetcher {
    media_root: PathBuf,
    mirror: PathBuf,
}

impl MirrorDirFetcher {
    pub fn new(media_root: impl Into<PathBuf>, mirror: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
            mirror: mirror.into(),
        }
    }

    fn mirrored_original(&self, source: &Path) -> Result<PathBuf, CloudError> {
        let relative = source
            .strip_prefix(&self.media_root)
            .map_err(|_| CloudError::OutsideRoot(source.to_path_buf()))?;
        Ok(self.mirror.join(relative))
    }

    fn read(&self, asset_id: i64, path: &Path) -> Result<Vec<u8>, CloudError> {
        debug!(asset_id, path = %path.display(), "Fetching from cloud mirror");
        std::fs::read(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                CloudError::Missing(asset_id)
            } else {
                CloudError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

impl CloudFetcher for MirrorDirFetcher {
    fn fetch_original(&self, request: &AssetDerivativeRequest) -> Result<Vec<u8>, CloudError> {
        let path = self.mirrored_original(&request.source_path)?;
        self.read(request.asset_id, &path)
    }

    fn fetch_lcd(&self, request: &AssetDerivativeRequest) -> Result<Vec<u8>, CloudError> {
        let original = self.mirrored_original(&request.source_path)?;
        let path = derivative_path(&self.mirror, &original, DerivativeKind::Lcd)
            .map_err(|_| CloudError::OutsideRoot(request.source_path.clone()))?;
        self.read(request.asset_id, &path)
    }
}
