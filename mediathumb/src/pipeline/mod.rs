//! Derivative generation pipeline.
//!
//! A [`GenerationPipeline`] turns an
//! [`AssetDerivativeRequest`](crate::derivative::AssetDerivativeRequest) into stored
//! derivatives. Every run moves through the same stages:
//!
//! ```text
//! NeedSource → SourceLoaded → Compressed → Persisted → MetadataUpdated → Notified
//!      └──────────────┴────────────┴────────────┴──────────────┴──→ Failed
//! ```
//!
//! Concurrent runs for the same asset and derivative class are collapsed by
//! the shared [`RequestCoordinator`]: the first caller generates, everyone
//! else blocks and mirrors its result.
//!
//! Generation calls never return errors. A failing stage posts a
//! [`DiagnosticRecord`](crate::diagnostics::DiagnosticRecord) and the call
//! returns `false`. The read path ([`GenerationPipeline::get_derivative`]) is
//! the only one that surfaces a [`ReadError`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediathumb::derivative::AssetDerivativeRequest;
//! use mediathumb::metadata::SqliteMetadataStore;
//! use mediathumb::pipeline::GenerationPipelineBuilder;
//!
//! let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
//! let pipeline = GenerationPipelineBuilder::new("/media", metadata).build();
//!
//! let request = AssetDerivativeRequest::new(1, "/media/DCIM/a.jpg");
//! if pipeline.create_lcd(&request) {
//!     println!("LCD ready");
//! }
//! ```

mod error;
mod generate;
mod reader;
mod scale;
mod stage;
mod task;

pub use error::{PipelineError, ReadError};
pub use generate::ThumbOutcome;
pub use reader::DerivativeHandle;
pub use scale::{center_crop, resize_to, scale_lcd, scale_thumb, tiny_square};
pub use stage::{Stage, StageTracker};
pub use task::{GenerateAction, GenerateTask};

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::coordinator::RequestCoordinator;
use crate::derivative::DerivativeKey;
use crate::diagnostics::{DiagnosticsSink, TracingDiagnostics};
use crate::encoder::{AstcEncoder, DerivativeEncoder, JpegEncoder, DEFAULT_JPEG_QUALITY};
use crate::metadata::MetadataStore;
use crate::notify::{ChangeNotifier, TracingNotifier};
use crate::source::{CloudFetcher, ImageCrateDecoder, ImageDecoder, NoCloud, SourceLoader};
use crate::store::{DerivativeStore, KvStore};

/// Default bound on how long a read waits for an in-flight generation.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Coordinator type shared by the pipeline, reader and aging job.
pub type DerivativeCoordinator = RequestCoordinator<DerivativeKey>;

/// Counters for one pipeline.
#[derive(Debug, Default)]
struct PipelineCounters {
    encodes: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
    notifications: AtomicU64,
}

/// Snapshot of pipeline activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Decoder invocations
    pub decodes: u64,
    /// Encoder invocations
    pub encodes: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub notifications: u64,
}

/// Generates, stores and serves derivatives.
pub struct GenerationPipeline {
    store: DerivativeStore,
    loader: SourceLoader,
    metadata: Arc<dyn MetadataStore>,
    kv: Option<Arc<dyn KvStore>>,
    notifier: Arc<dyn ChangeNotifier>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    coordinator: Arc<DerivativeCoordinator>,
    lcd_encoder: Arc<dyn DerivativeEncoder>,
    thumb_encoder: Arc<dyn DerivativeEncoder>,
    astc: Arc<dyn DerivativeEncoder>,
    supports_compressed: bool,
    wait_timeout: Duration,
    counters: PipelineCounters,
}

impl GenerationPipeline {
    pub fn store(&self) -> &DerivativeStore {
        &self.store
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn kv(&self) -> Option<&Arc<dyn KvStore>> {
        self.kv.as_ref()
    }

    pub fn coordinator(&self) -> &Arc<DerivativeCoordinator> {
        &self.coordinator
    }

    pub fn supports_compressed(&self) -> bool {
        self.supports_compressed
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            decodes: self.loader.decode_count(),
            encodes: self.counters.encodes.load(Ordering::Relaxed),
            runs_succeeded: self.counters.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.counters.runs_failed.load(Ordering::Relaxed),
            notifications: self.counters.notifications.load(Ordering::Relaxed),
        }
    }
}

/// Builder for [`GenerationPipeline`].
///
/// Only the media root and the metadata store are required. Everything
/// else defaults to the stock implementation: `image`-crate decoding, no
/// cloud, no key-value store, tracing-backed notifications and diagnostics.
pub struct GenerationPipelineBuilder {
    root: PathBuf,
    metadata: Arc<dyn MetadataStore>,
    kv: Option<Arc<dyn KvStore>>,
    decoder: Arc<dyn ImageDecoder>,
    cloud: Arc<dyn CloudFetcher>,
    notifier: Arc<dyn ChangeNotifier>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    coordinator: Option<Arc<DerivativeCoordinator>>,
    lcd_quality: u8,
    thumb_quality: u8,
    supports_compressed: bool,
    wait_timeout: Duration,
}

impl GenerationPipelineBuilder {
    pub fn new(root: impl Into<PathBuf>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            root: root.into(),
            metadata,
            kv: None,
            decoder: Arc::new(ImageCrateDecoder::new()),
            cloud: Arc::new(NoCloud),
            notifier: Arc::new(TracingNotifier),
            diagnostics: Arc::new(TracingDiagnostics),
            coordinator: None,
            lcd_quality: DEFAULT_JPEG_QUALITY,
            thumb_quality: DEFAULT_JPEG_QUALITY,
            supports_compressed: true,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    pub fn kv_store(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn cloud(mut self, cloud: Arc<dyn CloudFetcher>) -> Self {
        self.cloud = cloud;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Share a coordinator with other components (aging, other pipelines).
    pub fn coordinator(mut self, coordinator: Arc<DerivativeCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn lcd_quality(mut self, quality: u8) -> Self {
        self.lcd_quality = quality;
        self
    }

    pub fn thumb_quality(mut self, quality: u8) -> Self {
        self.thumb_quality = quality;
        self
    }

    pub fn supports_compressed(mut self, supported: bool) -> Self {
        self.supports_compressed = supported;
        self
    }

    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn build(self) -> GenerationPipeline {
        let store = DerivativeStore::new(self.root);
        let loader = SourceLoader::new(store.clone(), self.decoder, self.cloud);
        GenerationPipeline {
            store,
            loader,
            metadata: self.metadata,
            kv: self.kv,
            notifier: self.notifier,
            diagnostics: self.diagnostics,
            coordinator: self
                .coordinator
                .unwrap_or_else(|| Arc::new(RequestCoordinator::new())),
            lcd_encoder: Arc::new(JpegEncoder::new(self.lcd_quality)),
            thumb_encoder: Arc::new(JpegEncoder::new(self.thumb_quality)),
            astc: Arc::new(AstcEncoder::new()),
            supports_compressed: self.supports_compressed,
            wait_timeout: self.wait_timeout,
            counters: PipelineCounters::default(),
        }
    }
}
