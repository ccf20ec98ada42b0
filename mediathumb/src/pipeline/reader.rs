//! On-demand derivative reads.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::coordinator::WaitResult;
use crate::derivative::{AssetDerivativeRequest, DerivativeKey, DerivativeKind, StorageMedium};
use crate::store::tiny_key;
use crate::time::now_millis;

use super::error::ReadError;
use super::GenerationPipeline;

/// Bytes of a served derivative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeHandle {
    /// Kind actually served; THUMB stands in for a missing THUMB_COMPRESSED
    pub kind: DerivativeKind,
    pub bytes: Vec<u8>,
    /// Backing file, for file-stored kinds
    pub path: Option<PathBuf>,
}

impl GenerationPipeline {
    /// Serve `kind` for an asset, generating it first when absent.
    ///
    /// Waits up to the configured timeout for a generation already in
    /// flight. A pending THM_EX scratch is applied before serving. Reading
    /// an LCD bumps its visit time.
    pub fn get_derivative(
        &self,
        request: &AssetDerivativeRequest,
        kind: DerivativeKind,
    ) -> Result<DerivativeHandle, ReadError> {
        if kind.storage() == StorageMedium::KeyValue {
            return self.get_tiny(request, kind);
        }

        let key = DerivativeKey::new(request.asset_id, kind.class());
        if let WaitResult::TimedOut = self.coordinator.try_wait(&key, self.wait_timeout) {
            debug!(asset_id = request.asset_id, kind = %kind, "In-flight generation still running");
        }

        if self.store.ex_exists(&request.source_path, DerivativeKind::Lcd)
            && !self.create_compressed_from_existing_ex(request)
        {
            warn!(asset_id = request.asset_id, "Applying THM_EX scratch failed");
        }

        if let Some(handle) = self.read_file(request, kind)? {
            return Ok(handle);
        }

        debug!(asset_id = request.asset_id, kind = %kind, "Derivative missing, generating");
        let generated = match kind {
            DerivativeKind::Lcd => self.create_lcd(request),
            _ => self.create_thumb_or_reload(request),
        };
        if !generated {
            return Err(ReadError::GenerationFailed {
                asset_id: request.asset_id,
                kind,
            });
        }
        self.read_file(request, kind)?.ok_or(ReadError::Missing {
            asset_id: request.asset_id,
            kind,
        })
    }

    fn read_file(
        &self,
        request: &AssetDerivativeRequest,
        kind: DerivativeKind,
    ) -> Result<Option<DerivativeHandle>, ReadError> {
        let source = request.source_path.as_path();
        let served = if kind == DerivativeKind::ThumbCompressed
            && !self.store.exists(source, kind)
            && self.store.exists(source, DerivativeKind::Thumb)
        {
            DerivativeKind::Thumb
        } else {
            kind
        };

        let Some(bytes) = self.store.read(source, served)? else {
            return Ok(None);
        };
        if served == DerivativeKind::Lcd {
            if let Err(e) = self.metadata.touch_lcd(request.asset_id, now_millis()) {
                warn!(asset_id = request.asset_id, error = %e, "Failed to bump LCD visit time");
            }
        }
        Ok(Some(DerivativeHandle {
            kind: served,
            bytes,
            path: Some(self.store.path_for(source, served)?),
        }))
    }

    fn get_tiny(
        &self,
        request: &AssetDerivativeRequest,
        kind: DerivativeKind,
    ) -> Result<DerivativeHandle, ReadError> {
        let kv = self.kv.as_ref().ok_or(ReadError::KvUnavailable(kind))?;
        let key = tiny_key(request.capture_time, request.asset_id);
        if let Some(bytes) = kv.get(kind, &key)? {
            return Ok(DerivativeHandle {
                kind,
                bytes,
                path: None,
            });
        }
        if !self.create_compressed_from_existing(request) {
            return Err(ReadError::GenerationFailed {
                asset_id: request.asset_id,
                kind,
            });
        }
        let bytes = kv.get(kind, &key)?.ok_or(ReadError::Missing {
            asset_id: request.asset_id,
            kind,
        })?;
        Ok(DerivativeHandle {
            kind,
            bytes,
            path: None,
        })
    }
}
