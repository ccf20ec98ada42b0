//! Generation operations.

use std::sync::atomic::Ordering;

use image::RgbaImage;
use tracing::{debug, trace, warn};

use crate::coordinator::ClaimOutcome;
use crate::derivative::{
    resize_thumb, AssetDerivativeRequest, AssetTable, DerivativeClass, DerivativeKey,
    DerivativeKind, Dimensions, MediaType, StorageMedium,
};
use crate::diagnostics::{DiagnosticRecord, OperationKind};
use crate::metadata::{ReadyUpdate, ThumbnailReady};
use crate::notify::NotifyType;
use crate::source::{apply_orientation, LoadLadder, LoadStrategy, LoadedSource};
use crate::store::tiny_key;
use crate::time::now_millis;

use super::error::PipelineError;
use super::scale::{dimensions_of, scale_lcd, scale_thumb, tiny_square};
use super::stage::{Stage, StageTracker};
use super::GenerationPipeline;

const TINY_KINDS: [DerivativeKind; 2] = [DerivativeKind::MonthTiny, DerivativeKind::YearTiny];

/// Result of [`GenerationPipeline::create_thumb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbOutcome {
    /// THUMB and its companions are stored and readiness is set
    Ok,
    /// The LCD is missing or too small; reissue with a full decode
    NeedsSourceReload,
    Failed,
}

impl ThumbOutcome {
    pub fn is_ok(self) -> bool {
        self == ThumbOutcome::Ok
    }
}

/// Internal result of a THUMB run that starts from the LCD.
enum ThumbRun {
    Done,
    NeedsSourceReload,
}

impl GenerationPipeline {
    /// Generate the LCD of an asset.
    ///
    /// Returns `true` when the LCD exists afterwards. An existing LCD only
    /// has its metadata refreshed.
    pub fn create_lcd(&self, request: &AssetDerivativeRequest) -> bool {
        let guard = match self.claim(request, DerivativeClass::Lcd) {
            ClaimOutcome::Claimed(guard) => guard,
            ClaimOutcome::WaitSuccess => return true,
            ClaimOutcome::WaitFailed => return false,
        };
        let mut tracker = StageTracker::new(request.asset_id, OperationKind::CreateLcd);
        let result = self.run_lcd(request, &mut tracker);
        let ok = self.finish(&mut tracker, request, result).is_some();
        guard.complete(ok);
        ok
    }

    /// Generate THUMB and its companions from the existing LCD.
    ///
    /// The claim is released with failure on `NeedsSourceReload`; callers
    /// that want the reload handled use [`create_thumb_or_reload`].
    ///
    /// [`create_thumb_or_reload`]: GenerationPipeline::create_thumb_or_reload
    pub fn create_thumb(&self, request: &AssetDerivativeRequest) -> ThumbOutcome {
        let guard = match self.claim(request, DerivativeClass::Thumb) {
            ClaimOutcome::Claimed(guard) => guard,
            ClaimOutcome::WaitSuccess => return ThumbOutcome::Ok,
            ClaimOutcome::WaitFailed => return ThumbOutcome::Failed,
        };
        let mut tracker = StageTracker::new(request.asset_id, OperationKind::CreateThumb);
        let result = self.run_thumb_from_lcd(request, &mut tracker);
        let outcome = match self.finish(&mut tracker, request, result) {
            Some(ThumbRun::Done) => ThumbOutcome::Ok,
            Some(ThumbRun::NeedsSourceReload) => ThumbOutcome::NeedsSourceReload,
            None => ThumbOutcome::Failed,
        };
        guard.complete(outcome.is_ok());
        outcome
    }

    /// Generate THUMB and its companions from a full decode of the source.
    pub fn create_thumb_from_source(&self, request: &AssetDerivativeRequest) -> bool {
        let guard = match self.claim(request, DerivativeClass::Thumb) {
            ClaimOutcome::Claimed(guard) => guard,
            ClaimOutcome::WaitSuccess => return true,
            ClaimOutcome::WaitFailed => return false,
        };
        let mut tracker =
            StageTracker::new(request.asset_id, OperationKind::CreateThumbFromSource);
        let result = self.run_thumb_from_source(request, &mut tracker);
        let ok = self.finish(&mut tracker, request, result).is_some();
        guard.complete(ok);
        ok
    }

    /// [`create_thumb`](GenerationPipeline::create_thumb), falling back to a
    /// full decode under the same claim when the LCD cannot serve.
    pub fn create_thumb_or_reload(&self, request: &AssetDerivativeRequest) -> bool {
        let guard = match self.claim(request, DerivativeClass::Thumb) {
            ClaimOutcome::Claimed(guard) => guard,
            ClaimOutcome::WaitSuccess => return true,
            ClaimOutcome::WaitFailed => return false,
        };
        let mut tracker = StageTracker::new(request.asset_id, OperationKind::CreateThumb);
        let result = match self.run_thumb_from_lcd(request, &mut tracker) {
            Ok(ThumbRun::NeedsSourceReload) => {
                debug!(asset_id = request.asset_id, "LCD cannot serve THUMB, reloading source");
                self.run_thumb_from_source(request, &mut tracker)
            }
            Ok(ThumbRun::Done) => Ok(()),
            Err(e) => Err(e),
        };
        let ok = self.finish(&mut tracker, request, result).is_some();
        guard.complete(ok);
        ok
    }

    /// Generate the LCD, then THUMB and its companions from the fresh LCD
    /// pixels without a second decode.
    pub fn create_lcd_and_thumb(&self, request: &AssetDerivativeRequest) -> bool {
        let lcd_guard = match self.claim(request, DerivativeClass::Lcd) {
            ClaimOutcome::Claimed(guard) => guard,
            ClaimOutcome::WaitSuccess => return self.create_thumb_or_reload(request),
            ClaimOutcome::WaitFailed => return false,
        };
        // Lock order is always LCD then THUMB.
        let (thumb_guard, thumb_waited) = match self.claim(request, DerivativeClass::Thumb) {
            ClaimOutcome::Claimed(guard) => (Some(guard), true),
            ClaimOutcome::WaitSuccess => (None, true),
            ClaimOutcome::WaitFailed => (None, false),
        };

        let mut tracker = StageTracker::new(request.asset_id, OperationKind::CreateLcdAndThumb);
        let mut thumb_tracker =
            StageTracker::new(request.asset_id, OperationKind::CreateLcdAndThumb);
        let result = self.run_lcd_and_thumb(
            request,
            thumb_guard.is_some(),
            &mut tracker,
            &mut thumb_tracker,
        );
        let ok = self.finish(&mut tracker, request, result).is_some();
        if let Some(guard) = thumb_guard {
            guard.complete(ok);
        }
        lcd_guard.complete(ok);
        ok && thumb_waited
    }

    /// Rebuild THUMB, THUMB_COMPRESSED and the tiny kinds, preferring an
    /// existing THUMB or LCD file as the source.
    pub fn create_compressed_from_existing(&self, request: &AssetDerivativeRequest) -> bool {
        let guard = match self.claim(request, DerivativeClass::Thumb) {
            ClaimOutcome::Claimed(guard) => guard,
            ClaimOutcome::WaitSuccess => return true,
            ClaimOutcome::WaitFailed => return false,
        };
        let mut tracker = StageTracker::new(request.asset_id, OperationKind::CreateCompressed);
        let result = self.run_compressed_from_existing(request, &mut tracker);
        let ok = self.finish(&mut tracker, request, result).is_some();
        guard.complete(ok);
        ok
    }

    /// Rebuild LCD, THUMB and companions from the unrotated THM_EX scratch
    /// LCD, then drop the scratch directory.
    pub fn create_compressed_from_existing_ex(&self, request: &AssetDerivativeRequest) -> bool {
        let guard = match self.claim(request, DerivativeClass::CloudRead) {
            ClaimOutcome::Claimed(guard) => guard,
            ClaimOutcome::WaitSuccess => return true,
            ClaimOutcome::WaitFailed => return false,
        };
        let mut tracker = StageTracker::new(request.asset_id, OperationKind::CreateCompressedEx);
        let result = self.run_compressed_from_ex(request, &mut tracker);
        let ok = self.finish(&mut tracker, request, result).is_some();
        guard.complete(ok);
        ok
    }

    /// Remove both tiny entries of an asset. A pipeline without a
    /// key-value store has nothing to remove.
    pub fn delete_tiny(&self, request: &AssetDerivativeRequest) -> bool {
        let Some(kv) = self.kv.as_ref() else {
            return true;
        };
        let key = tiny_key(request.capture_time, request.asset_id);
        let mut ok = true;
        for kind in TINY_KINDS {
            if let Err(e) = kv.delete(kind, &key) {
                self.report(OperationKind::TinyMaintenance, request, &PipelineError::persist(kind, e));
                ok = false;
            }
        }
        ok
    }

    /// Re-key both tiny entries after the capture time changed.
    pub fn update_tiny_capture_time(&self, request: &AssetDerivativeRequest, new_time: i64) -> bool {
        if new_time == request.capture_time {
            return true;
        }
        match self.rekey_tiny(request, new_time) {
            Ok(moved) => {
                debug!(asset_id = request.asset_id, moved, "Re-keyed tiny derivatives");
                true
            }
            Err(e) => {
                self.report(OperationKind::TinyMaintenance, request, &e);
                false
            }
        }
    }

    /// Flag the asset for retry on the next backfill pass.
    pub fn mark_failed(&self, request: &AssetDerivativeRequest) -> bool {
        match self
            .metadata
            .set_ready_state(request.asset_id, ThumbnailReady::Retry)
        {
            Ok(()) => true,
            Err(e) => {
                self.report(OperationKind::CreateThumb, request, &PipelineError::from(e));
                false
            }
        }
    }

    fn run_lcd(
        &self,
        request: &AssetDerivativeRequest,
        tracker: &mut StageTracker,
    ) -> Result<u64, PipelineError> {
        if let Some(size) = self.store.dimensions(&request.source_path, DerivativeKind::Lcd) {
            trace!(asset_id = request.asset_id, "LCD exists, refreshing metadata");
            self.metadata.update_lcd(request.asset_id, size, now_millis())?;
            tracker.advance(Stage::MetadataUpdated)?;
            return Ok(0);
        }
        let loaded = self
            .loader
            .load(request, LoadLadder::full_decode(request.location))?;
        tracker.advance(Stage::SourceLoaded)?;
        let (written, _) = self.write_lcd(request, &loaded, tracker)?;
        Ok(written)
    }

    fn run_thumb_from_lcd(
        &self,
        request: &AssetDerivativeRequest,
        tracker: &mut StageTracker,
    ) -> Result<ThumbRun, PipelineError> {
        if self.thumb_outputs_complete(request) {
            trace!(asset_id = request.asset_id, "THUMB outputs exist");
            self.refresh_readiness(request, tracker)?;
            return Ok(ThumbRun::Done);
        }
        let Some(lcd) = self.store.dimensions(&request.source_path, DerivativeKind::Lcd) else {
            return Ok(ThumbRun::NeedsSourceReload);
        };
        if !lcd_can_serve_thumb(request, lcd) {
            return Ok(ThumbRun::NeedsSourceReload);
        }

        let existed = self.store.exists(&request.source_path, DerivativeKind::Thumb);
        let loaded = self.loader.load_with(request, &[LoadStrategy::LocalLcd])?;
        tracker.advance(Stage::SourceLoaded)?;
        let thumb = scale_thumb(&loaded.into_oriented(request.orientation));
        self.write_thumb_set(request, &thumb, true, tracker)?;
        self.complete_thumb_run(request, dimensions_of(&thumb), existed, tracker)?;
        Ok(ThumbRun::Done)
    }

    fn run_thumb_from_source(
        &self,
        request: &AssetDerivativeRequest,
        tracker: &mut StageTracker,
    ) -> Result<(), PipelineError> {
        let existed = self.store.exists(&request.source_path, DerivativeKind::Thumb);
        let loaded = self
            .loader
            .load(request, LoadLadder::source_reload(request.location))?;
        tracker.advance(Stage::SourceLoaded)?;
        let thumb = scale_thumb(&loaded.into_oriented(request.orientation));
        self.write_thumb_set(request, &thumb, true, tracker)?;
        self.complete_thumb_run(request, dimensions_of(&thumb), existed, tracker)
    }

    fn run_lcd_and_thumb(
        &self,
        request: &AssetDerivativeRequest,
        produce_thumb: bool,
        tracker: &mut StageTracker,
        thumb_tracker: &mut StageTracker,
    ) -> Result<(), PipelineError> {
        if self.store.exists(&request.source_path, DerivativeKind::Lcd) {
            self.run_lcd(request, tracker)?;
            if produce_thumb {
                if let ThumbRun::NeedsSourceReload = self.run_thumb_from_lcd(request, thumb_tracker)? {
                    self.run_thumb_from_source(request, thumb_tracker)?;
                }
            }
            return Ok(());
        }

        let existed = self.store.exists(&request.source_path, DerivativeKind::Thumb);
        let loaded = self
            .loader
            .load(request, LoadLadder::full_decode(request.location))?;
        tracker.advance(Stage::SourceLoaded)?;
        let (_, lcd) = self.write_lcd(request, &loaded, tracker)?;
        if !produce_thumb {
            return Ok(());
        }

        thumb_tracker.advance(Stage::SourceLoaded)?;
        let thumb = if lcd_can_serve_thumb(request, dimensions_of(&lcd)) {
            scale_thumb(&lcd)
        } else {
            scale_thumb(&loaded.into_oriented(request.orientation))
        };
        self.write_thumb_set(request, &thumb, true, thumb_tracker)?;
        self.complete_thumb_run(request, dimensions_of(&thumb), existed, thumb_tracker)
    }

    fn run_compressed_from_existing(
        &self,
        request: &AssetDerivativeRequest,
        tracker: &mut StageTracker,
    ) -> Result<(), PipelineError> {
        if self.thumb_outputs_complete(request) {
            trace!(asset_id = request.asset_id, "Compressed outputs exist");
            return self.refresh_readiness(request, tracker);
        }
        let existed = self.store.exists(&request.source_path, DerivativeKind::Thumb);
        let (thumb, write_thumb) = match self.loader.load(request, LoadLadder::Existing) {
            Ok(loaded) if loaded.strategy == LoadStrategy::LocalThumb => (loaded.pixels, false),
            Ok(loaded) => (scale_thumb(&loaded.into_oriented(request.orientation)), true),
            Err(e) => {
                debug!(asset_id = request.asset_id, error = %e, "No existing derivative, decoding source");
                let loaded = self
                    .loader
                    .load(request, LoadLadder::full_decode(request.location))?;
                (scale_thumb(&loaded.into_oriented(request.orientation)), true)
            }
        };
        tracker.advance(Stage::SourceLoaded)?;
        self.write_thumb_set(request, &thumb, write_thumb, tracker)?;
        self.complete_thumb_run(request, dimensions_of(&thumb), existed, tracker)
    }

    fn run_compressed_from_ex(
        &self,
        request: &AssetDerivativeRequest,
        tracker: &mut StageTracker,
    ) -> Result<(), PipelineError> {
        if !self.store.ex_exists(&request.source_path, DerivativeKind::Lcd) {
            return Err(PipelineError::SourceUnavailable(format!(
                "no THM_EX scratch for asset {}",
                request.asset_id
            )));
        }
        let existed = self.store.exists(&request.source_path, DerivativeKind::Thumb);
        let loaded = self.loader.load_with(request, &[LoadStrategy::ExScratch])?;
        tracker.advance(Stage::SourceLoaded)?;

        let lcd = scale_lcd(&loaded.into_oriented(request.orientation));
        self.write_derivative(request, DerivativeKind::Lcd, &lcd, tracker)?;
        self.metadata
            .update_lcd(request.asset_id, dimensions_of(&lcd), now_millis())?;

        let thumb = scale_thumb(&lcd);
        self.write_thumb_set(request, &thumb, true, tracker)?;
        if let Err(e) = self.store.delete_ex_dir(&request.source_path) {
            warn!(asset_id = request.asset_id, error = %e, "Failed to remove THM_EX scratch");
        }
        self.complete_thumb_run(request, dimensions_of(&thumb), existed, tracker)
    }

    fn rekey_tiny(&self, request: &AssetDerivativeRequest, new_time: i64) -> Result<usize, PipelineError> {
        let Some(kv) = self.kv.as_ref() else {
            return Ok(0);
        };
        let old_key = tiny_key(request.capture_time, request.asset_id);
        let new_key = tiny_key(new_time, request.asset_id);
        let mut moved = 0;
        for kind in TINY_KINDS {
            let bytes = kv
                .get(kind, &old_key)
                .map_err(|e| PipelineError::persist(kind, e))?;
            if let Some(bytes) = bytes {
                kv.put(kind, &new_key, &bytes)
                    .map_err(|e| PipelineError::persist(kind, e))?;
                kv.delete(kind, &old_key)
                    .map_err(|e| PipelineError::persist(kind, e))?;
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Scale, rotate and persist the LCD. Returns the bytes written and the
    /// LCD pixels in display orientation.
    fn write_lcd(
        &self,
        request: &AssetDerivativeRequest,
        loaded: &LoadedSource,
        tracker: &mut StageTracker,
    ) -> Result<(u64, RgbaImage), PipelineError> {
        let scaled = scale_lcd(&loaded.pixels);
        let rotate = loaded.strategy.is_raw() && request.orientation != 0;
        let (lcd, unrotated) = if rotate {
            (apply_orientation(scaled.clone(), request.orientation), Some(scaled))
        } else {
            (scaled, None)
        };

        let written = self.write_derivative(request, DerivativeKind::Lcd, &lcd, tracker)?;
        if let Some(unrotated) = unrotated {
            if request.location.has_local() {
                self.save_ex_copy(request, &unrotated);
            }
        }
        self.metadata
            .update_lcd(request.asset_id, dimensions_of(&lcd), now_millis())?;
        tracker.advance(Stage::MetadataUpdated)?;
        Ok((written, lcd))
    }

    /// Unrotated scratch LCD, kept so a later rotation change can be
    /// applied without decoding the original again.
    fn save_ex_copy(&self, request: &AssetDerivativeRequest, unrotated: &RgbaImage) {
        let result = self
            .encode(DerivativeKind::Lcd, unrotated)
            .and_then(|bytes| {
                self.store
                    .save_ex(&request.source_path, DerivativeKind::Lcd, &bytes)
                    .map_err(|e| PipelineError::persist(DerivativeKind::Lcd, e))
            });
        if let Err(e) = result {
            warn!(asset_id = request.asset_id, error = %e, "Failed to write THM_EX scratch LCD");
        }
    }

    /// Persist THUMB (unless the source already is the THUMB), the
    /// compressed THUMB, and the tiny kinds.
    fn write_thumb_set(
        &self,
        request: &AssetDerivativeRequest,
        thumb: &RgbaImage,
        write_thumb: bool,
        tracker: &mut StageTracker,
    ) -> Result<u64, PipelineError> {
        let mut written = 0;
        if write_thumb {
            written += self.write_derivative(request, DerivativeKind::Thumb, thumb, tracker)?;
        }
        if self.wants_compressed(request) {
            written +=
                self.write_derivative(request, DerivativeKind::ThumbCompressed, thumb, tracker)?;
        }
        if request.wants_tiny() {
            if self.kv.is_none() {
                trace!(asset_id = request.asset_id, "No key-value store, skipping tiny derivatives");
                return Ok(written);
            }
            for kind in TINY_KINDS {
                if let Some(side) = kind.tiny_side() {
                    let tiny = tiny_square(thumb, side);
                    written += self.write_derivative(request, kind, &tiny, tracker)?;
                }
            }
        }
        Ok(written)
    }

    /// One readiness update and one notification per completed THUMB run.
    fn complete_thumb_run(
        &self,
        request: &AssetDerivativeRequest,
        thumb_size: Dimensions,
        existed_before: bool,
        tracker: &mut StageTracker,
    ) -> Result<(), PipelineError> {
        self.metadata.mark_derivatives_ready(&ReadyUpdate {
            asset_id: request.asset_id,
            ready_at: now_millis(),
            thumb_size: Some(thumb_size),
            set_visible: request.table == AssetTable::Photos,
        })?;
        tracker.advance(Stage::MetadataUpdated)?;

        let kind = if existed_before {
            NotifyType::ThumbUpdate
        } else {
            NotifyType::ThumbAdd
        };
        self.notifier.notify(&request.uri(), kind);
        self.counters.notifications.fetch_add(1, Ordering::Relaxed);
        tracker.advance(Stage::Notified)
    }

    /// Set readiness for an asset whose outputs all exist but whose row
    /// was never marked ready.
    fn refresh_readiness(
        &self,
        request: &AssetDerivativeRequest,
        tracker: &mut StageTracker,
    ) -> Result<(), PipelineError> {
        let ready = self
            .metadata
            .record(request.asset_id)?
            .map(|record| record.thumbnail_ready.is_ready())
            .unwrap_or(false);
        if ready {
            return Ok(());
        }
        self.metadata.mark_derivatives_ready(&ReadyUpdate {
            asset_id: request.asset_id,
            ready_at: now_millis(),
            thumb_size: self.store.dimensions(&request.source_path, DerivativeKind::Thumb),
            set_visible: request.table == AssetTable::Photos,
        })?;
        tracker.advance(Stage::MetadataUpdated)
    }

    fn write_derivative(
        &self,
        request: &AssetDerivativeRequest,
        kind: DerivativeKind,
        image: &RgbaImage,
        tracker: &mut StageTracker,
    ) -> Result<u64, PipelineError> {
        let bytes = self.encode(kind, image)?;
        tracker.advance(Stage::Compressed)?;
        let written = self.persist(request, kind, &bytes)?;
        tracker.advance(Stage::Persisted)?;
        Ok(written)
    }

    fn encode(&self, kind: DerivativeKind, image: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
        let encoder = match kind {
            DerivativeKind::Lcd => &self.lcd_encoder,
            DerivativeKind::Thumb => &self.thumb_encoder,
            _ => &self.astc,
        };
        self.counters.encodes.fetch_add(1, Ordering::Relaxed);
        encoder
            .encode(image)
            .map_err(|source| PipelineError::CompressionFailure { kind, source })
    }

    fn persist(
        &self,
        request: &AssetDerivativeRequest,
        kind: DerivativeKind,
        bytes: &[u8],
    ) -> Result<u64, PipelineError> {
        match kind.storage() {
            StorageMedium::File => self
                .store
                .save(&request.source_path, kind, bytes)
                .map_err(|e| PipelineError::persist(kind, e)),
            StorageMedium::KeyValue => {
                let kv = self
                    .kv
                    .as_ref()
                    .ok_or_else(|| PipelineError::persist(kind, "no key-value store"))?;
                kv.put(kind, &tiny_key(request.capture_time, request.asset_id), bytes)
                    .map_err(|e| PipelineError::persist(kind, e))?;
                Ok(bytes.len() as u64)
            }
        }
    }

    fn wants_compressed(&self, request: &AssetDerivativeRequest) -> bool {
        self.supports_compressed && request.media_type != MediaType::Audio
    }

    /// Every output a THUMB run would produce is already stored.
    fn thumb_outputs_complete(&self, request: &AssetDerivativeRequest) -> bool {
        let source = request.source_path.as_path();
        if !self.store.exists(source, DerivativeKind::Thumb) {
            return false;
        }
        if self.wants_compressed(request)
            && !self.store.exists(source, DerivativeKind::ThumbCompressed)
        {
            return false;
        }
        match (&self.kv, request.wants_tiny()) {
            (Some(kv), true) => {
                let key = tiny_key(request.capture_time, request.asset_id);
                TINY_KINDS
                    .iter()
                    .all(|&kind| matches!(kv.get(kind, &key), Ok(Some(_))))
            }
            _ => true,
        }
    }

    fn claim(&self, request: &AssetDerivativeRequest, class: DerivativeClass) -> ClaimOutcome<'_, DerivativeKey> {
        self.coordinator
            .claim(DerivativeKey::new(request.asset_id, class))
    }

    /// Close out a run: count it and, on failure, post a diagnostic.
    #[track_caller]
    fn finish<T>(
        &self,
        tracker: &mut StageTracker,
        request: &AssetDerivativeRequest,
        result: Result<T, PipelineError>,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                self.counters.runs_succeeded.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                tracker.fail();
                self.counters.runs_failed.fetch_add(1, Ordering::Relaxed);
                self.report(tracker.operation(), request, &e);
                None
            }
        }
    }

    #[track_caller]
    fn report(&self, operation: OperationKind, request: &AssetDerivativeRequest, error: &PipelineError) {
        self.diagnostics.report(DiagnosticRecord::new(
            operation,
            error.code(),
            request.source_path.as_path(),
            error.to_string(),
        ));
    }
}

/// An LCD of `lcd` size is large enough to scale THUMB from, given the
/// original dimensions when known.
fn lcd_can_serve_thumb(request: &AssetDerivativeRequest, lcd: Dimensions) -> bool {
    match request.display_dimensions() {
        Some(original) => lcd.short_side() >= resize_thumb(original).short_side(),
        None => !lcd.is_empty(),
    }
}
