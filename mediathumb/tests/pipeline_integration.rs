//! Integration tests for the generation pipeline.
//!
//! These tests drive the pipeline against real JPEG originals in a
//! temporary media root and check:
//! - Single-flight LCD generation across threads
//! - The full THUMB output set, readiness and notifications
//! - Idempotent re-runs
//! - Read-path fallbacks
//! - The THM_EX scratch round trip for rotated originals

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use image::{Rgb, RgbImage, RgbaImage};
use tempfile::TempDir;

use mediathumb::derivative::{
    AssetDerivativeRequest, AssetTable, DerivativeKind, Dimensions, MediaType,
};
use mediathumb::metadata::{AssetRecord, MetadataStore, SqliteMetadataStore};
use mediathumb::notify::{CollectingNotifier, NotifyType};
use mediathumb::pipeline::{GenerationPipeline, GenerationPipelineBuilder, ReadError, ThumbOutcome};
use mediathumb::source::{DecodeError, ImageCrateDecoder, ImageDecoder};
use mediathumb::store::{tiny_key, KvStore, MemoryKvStore};

// =============================================================================
// Test Helpers
// =============================================================================

/// Decoder that counts file decodes and holds each one briefly so
/// concurrent callers overlap.
struct CountingDecoder {
    inner: ImageCrateDecoder,
    decodes: AtomicUsize,
    delay: Duration,
}

impl CountingDecoder {
    fn new(delay: Duration) -> Self {
        Self {
            inner: ImageCrateDecoder::new(),
            decodes: AtomicUsize::new(0),
            delay,
        }
    }

    fn count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl ImageDecoder for CountingDecoder {
    fn decode(&self, path: &Path) -> Result<RgbaImage, DecodeError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.inner.decode(path)
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
        self.inner.decode_bytes(bytes)
    }
}

struct Fixture {
    temp: TempDir,
    metadata: Arc<SqliteMetadataStore>,
    kv: Arc<MemoryKvStore>,
    notifier: Arc<CollectingNotifier>,
    decoder: Arc<CountingDecoder>,
    pipeline: Arc<GenerationPipeline>,
}

impl Fixture {
    fn new() -> Self {
        Self::with(|builder| builder)
    }

    fn with(configure: impl FnOnce(GenerationPipelineBuilder) -> GenerationPipelineBuilder) -> Self {
        let temp = TempDir::new().unwrap();
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let kv = Arc::new(MemoryKvStore::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let decoder = Arc::new(CountingDecoder::new(Duration::from_millis(50)));

        let builder = GenerationPipelineBuilder::new(temp.path(), metadata.clone())
            .kv_store(kv.clone())
            .notifier(notifier.clone())
            .decoder(decoder.clone())
            .wait_timeout(Duration::from_secs(5));
        let pipeline = Arc::new(configure(builder).build());

        Self {
            temp,
            metadata,
            kv,
            notifier,
            decoder,
            pipeline,
        }
    }

    /// Write a JPEG original and its metadata row.
    fn add_asset(&self, id: i64, width: u32, height: u32) -> AssetDerivativeRequest {
        self.add_asset_with(id, width, height, |record| record)
    }

    fn add_asset_with(
        &self,
        id: i64,
        width: u32,
        height: u32,
        configure: impl FnOnce(AssetRecord) -> AssetRecord,
    ) -> AssetDerivativeRequest {
        let source = self.source_path(id);
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
            .save(&source)
            .unwrap();

        let mut record = AssetRecord::new(id, &source);
        record.capture_time = 1_700_000_000_000 + id;
        record.dimensions = Some(Dimensions::new(width, height));
        let record = configure(record);
        self.metadata.insert(&record).unwrap();
        record.to_request()
    }

    fn source_path(&self, id: i64) -> PathBuf {
        self.temp.path().join("Camera").join(format!("IMG_{:04}.jpg", id))
    }

    fn exists(&self, request: &AssetDerivativeRequest, kind: DerivativeKind) -> bool {
        self.pipeline.store().exists(&request.source_path, kind)
    }

    fn dimensions(&self, request: &AssetDerivativeRequest, kind: DerivativeKind) -> Dimensions {
        self.pipeline
            .store()
            .dimensions(&request.source_path, kind)
            .unwrap()
    }

    fn has_tiny(&self, request: &AssetDerivativeRequest, kind: DerivativeKind) -> bool {
        let key = tiny_key(request.capture_time, request.asset_id);
        self.kv.get(kind, &key).unwrap().is_some()
    }

    fn record(&self, id: i64) -> AssetRecord {
        self.metadata.record(id).unwrap().unwrap()
    }
}

// =============================================================================
// Single-flight
// =============================================================================

#[test]
fn test_concurrent_create_lcd_decodes_once() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(1, 2400, 1600);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let pipeline = Arc::clone(&fixture.pipeline);
            let request = request.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pipeline.create_lcd(&request)
            })
        })
        .collect();
    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results, vec![true, true]);
    assert_eq!(fixture.decoder.count(), 1);
    assert_eq!(fixture.dimensions(&request, DerivativeKind::Lcd), Dimensions::new(1920, 1280));
    assert!(fixture.record(1).has_lcd());
}

#[test]
fn test_missing_source_fails() {
    let fixture = Fixture::new();
    let request = AssetDerivativeRequest::new(9, fixture.source_path(9));
    fixture
        .metadata
        .insert(&AssetRecord::new(9, fixture.source_path(9)))
        .unwrap();

    assert!(!fixture.pipeline.create_lcd(&request));
    assert!(!fixture.exists(&request, DerivativeKind::Lcd));
    assert_eq!(fixture.pipeline.stats().runs_failed, 1);
}

// =============================================================================
// THUMB runs
// =============================================================================

#[test]
fn test_create_thumb_needs_lcd() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(2, 1200, 800);

    assert_eq!(
        fixture.pipeline.create_thumb(&request),
        ThumbOutcome::NeedsSourceReload
    );
    assert!(!fixture.exists(&request, DerivativeKind::Thumb));
    assert!(fixture.notifier.events().is_empty());
}

#[test]
fn test_create_thumb_from_lcd_produces_full_set() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(3, 2400, 1600);
    assert!(fixture.pipeline.create_lcd(&request));

    assert_eq!(fixture.pipeline.create_thumb(&request), ThumbOutcome::Ok);

    assert!(fixture.exists(&request, DerivativeKind::Thumb));
    assert!(fixture.exists(&request, DerivativeKind::ThumbCompressed));
    assert!(fixture.has_tiny(&request, DerivativeKind::MonthTiny));
    assert!(fixture.has_tiny(&request, DerivativeKind::YearTiny));

    let record = fixture.record(3);
    assert!(record.thumbnail_ready.is_ready());
    assert!(record.thumbnail_visible);
    assert_eq!(
        record.thumb_size,
        Some(fixture.dimensions(&request, DerivativeKind::Thumb))
    );
    assert_eq!(
        fixture.notifier.events_for(&request.uri()),
        vec![NotifyType::ThumbAdd]
    );
}

#[test]
fn test_create_thumb_or_reload_decodes_source() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(4, 1200, 900);

    assert!(fixture.pipeline.create_thumb_or_reload(&request));

    assert_eq!(fixture.decoder.count(), 1);
    assert!(!fixture.exists(&request, DerivativeKind::Lcd));
    assert!(fixture.exists(&request, DerivativeKind::ThumbCompressed));
    assert_eq!(fixture.notifier.events_for(&request.uri()).len(), 1);
}

#[test]
fn test_rerun_is_idempotent() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(5, 1600, 1200);
    assert!(fixture.pipeline.create_lcd_and_thumb(&request));
    let encodes = fixture.pipeline.stats().encodes;
    let decodes = fixture.decoder.count();

    assert!(fixture.pipeline.create_thumb_or_reload(&request));
    assert!(fixture.pipeline.create_lcd(&request));

    assert_eq!(fixture.pipeline.stats().encodes, encodes);
    assert_eq!(fixture.decoder.count(), decodes);
    assert_eq!(fixture.notifier.events_for(&request.uri()).len(), 1);
}

#[test]
fn test_create_lcd_and_thumb_single_decode() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(6, 3000, 2000);

    assert!(fixture.pipeline.create_lcd_and_thumb(&request));

    assert_eq!(fixture.decoder.count(), 1);
    for kind in [
        DerivativeKind::Lcd,
        DerivativeKind::Thumb,
        DerivativeKind::ThumbCompressed,
    ] {
        assert!(fixture.exists(&request, kind), "missing {}", kind);
    }
}

#[test]
fn test_regenerated_thumb_notifies_update() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(7, 1200, 800);
    assert!(fixture.pipeline.create_thumb_from_source(&request));
    assert!(fixture.pipeline.create_thumb_from_source(&request));

    assert_eq!(
        fixture.notifier.events_for(&request.uri()),
        vec![NotifyType::ThumbAdd, NotifyType::ThumbUpdate]
    );
}

#[test]
fn test_compressed_rerun_is_idempotent() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(18, 1600, 1200);
    assert!(fixture.pipeline.create_compressed_from_existing(&request));
    let encodes = fixture.pipeline.stats().encodes;
    let decodes = fixture.decoder.count();

    assert!(fixture.pipeline.create_compressed_from_existing(&request));

    assert_eq!(fixture.pipeline.stats().encodes, encodes);
    assert_eq!(fixture.decoder.count(), decodes);
    assert_eq!(
        fixture.notifier.events_for(&request.uri()),
        vec![NotifyType::ThumbAdd]
    );
    assert!(fixture.record(18).thumbnail_ready.is_ready());
}

#[test]
fn test_reload_ignores_undersized_lcd() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(19, 2400, 1600);
    let lcd_path = fixture
        .pipeline
        .store()
        .path_for(&request.source_path, DerivativeKind::Lcd)
        .unwrap();
    std::fs::create_dir_all(lcd_path.parent().unwrap()).unwrap();
    RgbImage::new(100, 60).save(&lcd_path).unwrap();
    std::fs::remove_file(&request.source_path).unwrap();

    assert!(!fixture.pipeline.create_thumb_or_reload(&request));

    assert!(!fixture.exists(&request, DerivativeKind::Thumb));
    assert!(!fixture.exists(&request, DerivativeKind::ThumbCompressed));
    assert!(fixture.notifier.events_for(&request.uri()).is_empty());
}

#[test]
fn test_audio_gets_thumb_only() {
    let fixture = Fixture::new();
    let request = fixture
        .add_asset_with(8, 800, 800, |mut record| {
            record.media_type = MediaType::Audio;
            record.table = AssetTable::Audios;
            record
        });

    assert!(fixture.pipeline.create_thumb_from_source(&request));

    assert!(fixture.exists(&request, DerivativeKind::Thumb));
    assert!(!fixture.exists(&request, DerivativeKind::ThumbCompressed));
    assert!(!fixture.has_tiny(&request, DerivativeKind::MonthTiny));
    let record = fixture.record(8);
    assert!(record.thumbnail_ready.is_ready());
    assert!(!record.thumbnail_visible);
}

#[test]
fn test_without_compressed_support() {
    let fixture = Fixture::with(|builder| builder.supports_compressed(false));
    let request = fixture.add_asset(10, 1200, 800);

    assert!(fixture.pipeline.create_thumb_from_source(&request));

    assert!(fixture.exists(&request, DerivativeKind::Thumb));
    assert!(!fixture.exists(&request, DerivativeKind::ThumbCompressed));
    assert!(fixture.has_tiny(&request, DerivativeKind::YearTiny));
}

// =============================================================================
// Tiny maintenance
// =============================================================================

#[test]
fn test_tiny_rekey_and_delete() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(11, 1000, 1000);
    assert!(fixture.pipeline.create_thumb_from_source(&request));

    let new_time = request.capture_time + 86_400_000;
    assert!(fixture.pipeline.update_tiny_capture_time(&request, new_time));
    assert!(!fixture.has_tiny(&request, DerivativeKind::MonthTiny));

    let moved = request.clone().with_capture_time(new_time);
    assert!(fixture.has_tiny(&moved, DerivativeKind::MonthTiny));
    assert!(fixture.has_tiny(&moved, DerivativeKind::YearTiny));

    assert!(fixture.pipeline.delete_tiny(&moved));
    assert!(!fixture.has_tiny(&moved, DerivativeKind::MonthTiny));
    assert!(!fixture.has_tiny(&moved, DerivativeKind::YearTiny));
}

// =============================================================================
// Read path
// =============================================================================

#[test]
fn test_get_derivative_generates_missing_lcd() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(12, 2000, 1000);

    let handle = fixture
        .pipeline
        .get_derivative(&request, DerivativeKind::Lcd)
        .unwrap();

    assert_eq!(handle.kind, DerivativeKind::Lcd);
    assert!(!handle.bytes.is_empty());
    assert!(handle.path.unwrap().ends_with("LCD.jpg"));
}

#[test]
fn test_compressed_read_falls_back_to_thumb() {
    let fixture = Fixture::with(|builder| builder.supports_compressed(false));
    let request = fixture.add_asset(13, 1200, 800);
    assert!(fixture.pipeline.create_thumb_from_source(&request));

    let handle = fixture
        .pipeline
        .get_derivative(&request, DerivativeKind::ThumbCompressed)
        .unwrap();

    assert_eq!(handle.kind, DerivativeKind::Thumb);
}

#[test]
fn test_tiny_read_builds_from_existing_thumb() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(14, 1200, 800);
    assert!(fixture.pipeline.create_thumb_from_source(&request));
    assert!(fixture.pipeline.delete_tiny(&request));
    let decodes = fixture.decoder.count();

    let handle = fixture
        .pipeline
        .get_derivative(&request, DerivativeKind::YearTiny)
        .unwrap();

    assert_eq!(handle.kind, DerivativeKind::YearTiny);
    assert!(handle.path.is_none());
    // One decode of the THUMB file
    assert_eq!(fixture.decoder.count(), decodes + 1);
    assert!(fixture.has_tiny(&request, DerivativeKind::MonthTiny));
}

#[test]
fn test_tiny_read_without_kv_store() {
    let temp = TempDir::new().unwrap();
    let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
    let pipeline = GenerationPipelineBuilder::new(temp.path(), metadata).build();
    let request = AssetDerivativeRequest::new(1, temp.path().join("a.jpg"));

    let err = pipeline
        .get_derivative(&request, DerivativeKind::MonthTiny)
        .unwrap_err();
    assert!(matches!(err, ReadError::KvUnavailable(DerivativeKind::MonthTiny)));
}

// =============================================================================
// THM_EX scratch
// =============================================================================

#[test]
fn test_rotated_lcd_keeps_unrotated_scratch() {
    let fixture = Fixture::new();
    let request = fixture.add_asset_with(15, 2400, 1600, |mut record| {
        record.orientation = 90;
        record
    });

    assert!(fixture.pipeline.create_lcd(&request));

    assert_eq!(fixture.dimensions(&request, DerivativeKind::Lcd), Dimensions::new(1280, 1920));
    assert!(fixture
        .pipeline
        .store()
        .ex_exists(&request.source_path, DerivativeKind::Lcd));
}

#[test]
fn test_ex_scratch_rebuilds_and_is_removed() {
    let fixture = Fixture::new();
    let request = fixture.add_asset_with(16, 2400, 1600, |mut record| {
        record.orientation = 90;
        record
    });
    assert!(fixture.pipeline.create_lcd(&request));
    let decodes = fixture.decoder.count();

    assert!(fixture.pipeline.create_compressed_from_existing_ex(&request));

    let store = fixture.pipeline.store();
    assert!(!store.ex_exists(&request.source_path, DerivativeKind::Lcd));
    assert!(fixture.exists(&request, DerivativeKind::Thumb));
    assert!(fixture.exists(&request, DerivativeKind::ThumbCompressed));
    assert!(fixture.dimensions(&request, DerivativeKind::Lcd).is_portrait());
    // The scratch is decoded from bytes, never from the original
    assert_eq!(fixture.decoder.count(), decodes);
}

#[test]
fn test_ex_without_scratch_fails() {
    let fixture = Fixture::new();
    let request = fixture.add_asset(17, 1200, 800);

    assert!(!fixture.pipeline.create_compressed_from_existing_ex(&request));
    assert!(!fixture.exists(&request, DerivativeKind::Thumb));
}
