//! Strategy ladder for loading source pixels.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, trace};

use crate::derivative::{AssetDerivativeRequest, AssetId, AssetLocation, DerivativeKind, Dimensions};
use crate::store::DerivativeStore;

use super::cloud::CloudFetcher;
use super::decoder::{apply_orientation, ImageDecoder};

/// One way of obtaining source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStrategy {
    /// Decode the original file under the media root
    LocalOriginal,
    /// Decode the existing THUMB derivative
    LocalThumb,
    /// Decode the existing LCD derivative
    LocalLcd,
    /// Download and decode the cloud original
    CloudOriginal,
    /// Download and decode the cloud LCD
    CloudLcd,
    /// Decode the unrotated THM_EX scratch LCD
    ExScratch,
}

impl LoadStrategy {
    /// Pixels from this strategy are in capture orientation and still
    /// need the asset's rotation applied.
    pub fn is_raw(self) -> bool {
        matches!(
            self,
            LoadStrategy::LocalOriginal
                | LoadStrategy::CloudOriginal
                | LoadStrategy::CloudLcd
                | LoadStrategy::ExScratch
        )
    }

    pub fn is_cloud(self) -> bool {
        matches!(self, LoadStrategy::CloudOriginal | LoadStrategy::CloudLcd)
    }

    /// Whether this step applies to an asset at `location`.
    ///
    /// Pure-cloud assets have no local original; local-only assets have no
    /// cloud copy. Existing derivative files are always eligible.
    pub fn applies_to(self, location: AssetLocation) -> bool {
        match self {
            LoadStrategy::LocalOriginal => location.has_local(),
            LoadStrategy::CloudOriginal | LoadStrategy::CloudLcd => location.has_cloud(),
            LoadStrategy::LocalThumb | LoadStrategy::LocalLcd | LoadStrategy::ExScratch => true,
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStrategy::LocalOriginal => "local-original",
            LoadStrategy::LocalThumb => "local-thumb",
            LoadStrategy::LocalLcd => "local-lcd",
            LoadStrategy::CloudOriginal => "cloud-original",
            LoadStrategy::CloudLcd => "cloud-lcd",
            LoadStrategy::ExScratch => "ex-scratch",
        };
        f.write_str(name)
    }
}

/// Named, ordered strategy lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadLadder {
    Local,
    LocalLcd,
    Existing,
    Cloud,
    CloudLcd,
    All,
    /// Originals only, local then cloud
    Originals,
}

impl LoadLadder {
    pub fn strategies(self) -> &'static [LoadStrategy] {
        use LoadStrategy::*;
        match self {
            LoadLadder::Local => &[LocalOriginal],
            LoadLadder::LocalLcd => &[LocalLcd, LocalOriginal],
            LoadLadder::Existing => &[LocalThumb, LocalLcd],
            LoadLadder::Cloud => &[CloudOriginal],
            LoadLadder::CloudLcd => &[CloudLcd, CloudOriginal],
            LoadLadder::All => &[LocalOriginal, LocalLcd, CloudOriginal],
            LoadLadder::Originals => &[LocalOriginal, CloudOriginal],
        }
    }

    /// Ladder for a full decode of `location`.
    pub fn full_decode(location: AssetLocation) -> Self {
        if location.is_pure_cloud() {
            LoadLadder::CloudLcd
        } else {
            LoadLadder::All
        }
    }

    /// Ladder for a THUMB reload. Existing LCDs are left out: a reload
    /// happens because the LCD is too small to serve THUMB.
    pub fn source_reload(location: AssetLocation) -> Self {
        if location.is_pure_cloud() {
            LoadLadder::Cloud
        } else {
            LoadLadder::Originals
        }
    }
}

/// Pixels and where they came from.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub pixels: RgbaImage,
    pub strategy: LoadStrategy,
}

impl LoadedSource {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.pixels.width(), self.pixels.height())
    }

    /// Pixels in display orientation.
    pub fn into_oriented(self, orientation: u32) -> RgbaImage {
        if self.strategy.is_raw() {
            apply_orientation(self.pixels, orientation)
        } else {
            self.pixels
        }
    }
}

/// Every step of a ladder failed.
#[derive(Debug, Error)]
#[error("no source for asset {asset_id}: {}", format_attempts(.attempts))]
pub struct LoadError {
    pub asset_id: AssetId,
    pub attempts: Vec<(LoadStrategy, String)>,
}

fn format_attempts(attempts: &[(LoadStrategy, String)]) -> String {
    if attempts.is_empty() {
        return "no applicable strategy".to_string();
    }
    attempts
        .iter()
        .map(|(s, e)| format!("{}: {}", s, e))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Produces decoded pixels for an asset by walking a strategy ladder.
pub struct SourceLoader {
    store: DerivativeStore,
    decoder: Arc<dyn ImageDecoder>,
    cloud: Arc<dyn CloudFetcher>,
    decodes: AtomicU64,
}

impl SourceLoader {
    pub fn new(
        store: DerivativeStore,
        decoder: Arc<dyn ImageDecoder>,
        cloud: Arc<dyn CloudFetcher>,
    ) -> Self {
        Self {
            store,
            decoder,
            cloud,
            decodes: AtomicU64::new(0),
        }
    }

    /// Number of decoder invocations so far.
    pub fn decode_count(&self) -> u64 {
        self.decodes.load(Ordering::Relaxed)
    }

    pub fn decoder(&self) -> &Arc<dyn ImageDecoder> {
        &self.decoder
    }

    pub fn load(
        &self,
        request: &AssetDerivativeRequest,
        ladder: LoadLadder,
    ) -> Result<LoadedSource, LoadError> {
        self.load_with(request, ladder.strategies())
    }

    /// Try each strategy in order; the first that yields pixels wins.
    pub fn load_with(
        &self,
        request: &AssetDerivativeRequest,
        strategies: &[LoadStrategy],
    ) -> Result<LoadedSource, LoadError> {
        let mut attempts = Vec::new();
        for &strategy in strategies {
            if !strategy.applies_to(request.location) {
                trace!(asset_id = request.asset_id, strategy = %strategy, "Strategy not applicable");
                continue;
            }
            match self.try_strategy(request, strategy) {
                Ok(pixels) => {
                    debug!(
                        asset_id = request.asset_id,
                        strategy = %strategy,
                        width = pixels.width(),
                        height = pixels.height(),
                        "Loaded source"
                    );
                    return Ok(LoadedSource { pixels, strategy });
                }
                Err(reason) => {
                    debug!(asset_id = request.asset_id, strategy = %strategy, reason = %reason, "Source strategy failed");
                    attempts.push((strategy, reason));
                }
            }
        }
        Err(LoadError {
            asset_id: request.asset_id,
            attempts,
        })
    }

    fn try_strategy(
        &self,
        request: &AssetDerivativeRequest,
        strategy: LoadStrategy,
    ) -> Result<RgbaImage, String> {
        match strategy {
            LoadStrategy::LocalOriginal => self.decode_path(&request.source_path),
            LoadStrategy::LocalThumb => self.decode_derivative(request, DerivativeKind::Thumb),
            LoadStrategy::LocalLcd => self.decode_derivative(request, DerivativeKind::Lcd),
            LoadStrategy::CloudOriginal => {
                let bytes = self.cloud.fetch_original(request).map_err(|e| e.to_string())?;
                self.decode_bytes(&bytes)
            }
            LoadStrategy::CloudLcd => {
                let bytes = self.cloud.fetch_lcd(request).map_err(|e| e.to_string())?;
                self.decode_bytes(&bytes)
            }
            LoadStrategy::ExScratch => {
                let bytes = self
                    .store
                    .read_ex(&request.source_path, DerivativeKind::Lcd)
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| "no THM_EX scratch LCD".to_string())?;
                self.decode_bytes(&bytes)
            }
        }
    }

    fn decode_derivative(
        &self,
        request: &AssetDerivativeRequest,
        kind: DerivativeKind,
    ) -> Result<RgbaImage, String> {
        let path = self
            .store
            .path_for(&request.source_path, kind)
            .map_err(|e| e.to_string())?;
        if !path.is_file() {
            return Err(format!("no {} derivative", kind));
        }
        self.decode_path(&path)
    }

    fn decode_path(&self, path: &std::path::Path) -> Result<RgbaImage, String> {
        if !path.is_file() {
            return Err(format!("{} does not exist", path.display()));
        }
        self.decodes.fetch_add(1, Ordering::Relaxed);
        self.decoder.decode(path).map_err(|e| e.to_string())
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Result<RgbaImage, String> {
        self.decodes.fetch_add(1, Ordering::Relaxed);
        self.decoder.decode_bytes(bytes).map_err(|e| e.to_string())
    }
}
