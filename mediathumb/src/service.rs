//! Service object owning every component of a running instance.
//!
//! A [`ThumbnailService`] is built once at process start and shared by `Arc`.
//! It wires the metadata and key-value stores into the generation pipeline,
//! owns the worker pools and the background jobs, and optionally drives the
//! aging daemon on a private tokio runtime.
//!
//! ```no_run
//! use mediathumb::config::ConfigFile;
//! use mediathumb::service::ThumbnailService;
//!
//! let config = ConfigFile::load()?;
//! let service = ThumbnailService::from_config(config)?;
//! service.start_aging_daemon()?;
//! // ...
//! service.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aging::{run_aging_daemon, AgingEvictionManager, AgingResult};
use crate::background::{BackfillKind, BackgroundError, BackgroundJobs};
use crate::config::ConfigFile;
use crate::derivative::{batch_uri, AssetDerivativeRequest, BatchId, DerivativeKind};
use crate::diagnostics::DiagnosticsSink;
use crate::metadata::{MetadataError, MetadataStore, SqliteMetadataStore};
use crate::notify::{ChangeNotifier, NotifyType, TracingNotifier};
use crate::pipeline::{
    DerivativeCoordinator, DerivativeHandle, GenerateTask, GenerationPipeline,
    GenerationPipelineBuilder, PipelineStats, ReadError,
};
use crate::source::{CloudFetcher, ImageDecoder};
use crate::store::{KvError, KvStore, SqliteKvStore};
use crate::worker::{BatchHook, WorkerCategory, WorkerPoolManager};

/// How long shutdown waits for the aging daemon to stop.
const DAEMON_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while building or running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("metadata store: {0}")]
    Metadata(#[from] MetadataError),

    #[error("tiny derivative store: {0}")]
    Kv(#[from] KvError),

    #[error("failed to start aging runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("service has been shut down")]
    ShutDown,
}

/// Snapshot of service state for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub lcd_count: u64,
    pub queued_tasks: usize,
    pub in_flight: usize,
    pub aging_daemon_running: bool,
    pub pipeline: PipelineStats,
}

struct AgingDaemon {
    runtime: Runtime,
    cancellation: CancellationToken,
}

/// Owner of the pipeline, pools, background jobs and aging.
pub struct ThumbnailService {
    config: ConfigFile,
    pipeline: Arc<GenerationPipeline>,
    pools: Arc<WorkerPoolManager<GenerateTask>>,
    background: BackgroundJobs,
    aging: Arc<AgingEvictionManager>,
    daemon: Mutex<Option<AgingDaemon>>,
    shut_down: AtomicBool,
}

impl ThumbnailService {
    /// Build a service with the stores named in `config`.
    pub fn from_config(config: ConfigFile) -> Result<Self, ServiceError> {
        ThumbnailServiceBuilder::new(config).build()
    }

    pub fn builder(config: ConfigFile) -> ThumbnailServiceBuilder {
        ThumbnailServiceBuilder::new(config)
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<GenerationPipeline> {
        &self.pipeline
    }

    pub fn pools(&self) -> &Arc<WorkerPoolManager<GenerateTask>> {
        &self.pools
    }

    pub fn background(&self) -> &BackgroundJobs {
        &self.background
    }

    pub fn aging(&self) -> &Arc<AgingEvictionManager> {
        &self.aging
    }

    /// Serve a derivative, generating it when absent.
    pub fn get_derivative(
        &self,
        request: &AssetDerivativeRequest,
        kind: DerivativeKind,
    ) -> Result<DerivativeHandle, ReadError> {
        self.pipeline.get_derivative(request, kind)
    }

    /// Queue one backfill pass on the background pool.
    pub fn backfill(&self, kind: BackfillKind) -> Result<usize, BackgroundError> {
        self.background.backfill(kind)
    }

    /// Queue compressed generation for a batch; a `ThumbAdd` on the batch
    /// uri follows once every task of the batch has run.
    pub fn generate_batch(
        &self,
        requests: Vec<AssetDerivativeRequest>,
        batch_id: BatchId,
    ) -> Result<usize, BackgroundError> {
        self.background.generate_batch(requests, batch_id)
    }

    pub fn cancel_batch(&self, batch_id: BatchId) {
        self.background.cancel_batch(batch_id);
    }

    /// Run one aging pass on the calling thread.
    pub fn run_aging(&self) -> Result<AgingResult, MetadataError> {
        self.aging.run()
    }

    /// Start the periodic aging daemon. Does nothing if it already runs.
    pub fn start_aging_daemon(&self) -> Result<(), ServiceError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(ServiceError::ShutDown);
        }
        let mut daemon = self.daemon.lock();
        if daemon.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("mediathumb-aging")
            .enable_time()
            .build()
            .map_err(ServiceError::Runtime)?;
        let cancellation = CancellationToken::new();
        runtime.spawn(run_aging_daemon(
            Arc::clone(&self.aging),
            self.config.aging_interval(),
            cancellation.clone(),
        ));

        *daemon = Some(AgingDaemon {
            runtime,
            cancellation,
        });
        Ok(())
    }

    pub fn status(&self) -> Result<ServiceStatus, MetadataError> {
        Ok(ServiceStatus {
            lcd_count: self.pipeline.metadata().lcd_count()?,
            queued_tasks: self.pools.queued_len(),
            in_flight: self.pipeline.coordinator().in_flight_count(),
            aging_daemon_running: self.daemon.lock().is_some(),
            pipeline: self.pipeline.stats(),
        })
    }

    /// Stop the aging daemon and join the worker threads.
    ///
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(daemon) = self.daemon.lock().take() {
            daemon.cancellation.cancel();
            daemon.runtime.shutdown_timeout(DAEMON_SHUTDOWN_TIMEOUT);
        }
        self.pools.shutdown();
        self.pipeline.coordinator().log_stats();
        info!("Thumbnail service stopped");
    }
}

impl Drop for ThumbnailService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for [`ThumbnailService`].
///
/// Stores not supplied explicitly are opened from the paths in the config.
pub struct ThumbnailServiceBuilder {
    config: ConfigFile,
    metadata: Option<Arc<dyn MetadataStore>>,
    kv: Option<Arc<dyn KvStore>>,
    decoder: Option<Arc<dyn ImageDecoder>>,
    cloud: Option<Arc<dyn CloudFetcher>>,
    notifier: Arc<dyn ChangeNotifier>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl ThumbnailServiceBuilder {
    pub fn new(config: ConfigFile) -> Self {
        Self {
            config,
            metadata: None,
            kv: None,
            decoder: None,
            cloud: None,
            notifier: Arc::new(TracingNotifier),
            diagnostics: None,
        }
    }

    pub fn metadata(mut self, metadata: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn kv_store(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn cloud(mut self, cloud: Arc<dyn CloudFetcher>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn build(self) -> Result<ThumbnailService, ServiceError> {
        let config = self.config;
        let metadata = match self.metadata {
            Some(metadata) => metadata,
            None => open_metadata(&config)?,
        };
        let kv = match self.kv {
            Some(kv) => Some(kv),
            None => open_kv(&config)?,
        };

        let coordinator = Arc::new(DerivativeCoordinator::new());
        let mut builder = GenerationPipelineBuilder::new(&config.storage.root, Arc::clone(&metadata))
            .coordinator(Arc::clone(&coordinator))
            .notifier(Arc::clone(&self.notifier))
            .lcd_quality(config.generation.lcd_quality)
            .thumb_quality(config.generation.thumb_quality)
            .supports_compressed(config.generation.supports_compressed)
            .wait_timeout(config.wait_timeout());
        if let Some(kv) = &kv {
            builder = builder.kv_store(Arc::clone(kv));
        }
        if let Some(decoder) = self.decoder {
            builder = builder.decoder(decoder);
        }
        if let Some(cloud) = self.cloud {
            builder = builder.cloud(cloud);
        }
        if let Some(diagnostics) = self.diagnostics {
            builder = builder.diagnostics(diagnostics);
        }
        let pipeline = Arc::new(builder.build());

        let notifier = Arc::clone(&self.notifier);
        let hook: BatchHook = Arc::new(move |batch_id| {
            notifier.notify(&batch_uri(batch_id), NotifyType::ThumbAdd);
        });
        let pools = Arc::new(WorkerPoolManager::with_batch_hook(
            config.pool_config(WorkerCategory::Foreground),
            config.pool_config(WorkerCategory::Background),
            hook,
        ));

        let background = BackgroundJobs::new(
            Arc::clone(&pipeline),
            Arc::clone(&pools),
            config.background.query_limit,
            config.aging.lcd_generate_threshold,
        );

        let mut aging = AgingEvictionManager::new(
            pipeline.store().clone(),
            metadata,
            coordinator,
            config.aging_policy(),
        );
        if let Some(kv) = kv {
            aging = aging.with_kv(kv);
        }

        info!(
            root = %config.storage.root.display(),
            foreground_threads = config.workers.foreground_threads,
            background_threads = config.workers.background_threads,
            supports_compressed = config.generation.supports_compressed,
            "Thumbnail service ready"
        );

        Ok(ThumbnailService {
            config,
            pipeline,
            pools,
            background,
            aging: Arc::new(aging),
            daemon: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        })
    }
}

fn open_metadata(config: &ConfigFile) -> Result<Arc<dyn MetadataStore>, ServiceError> {
    let store = SqliteMetadataStore::open(&config.storage.database)?;
    store.set_cache_size(config.storage.sqlite_cache_size)?;
    Ok(Arc::new(store))
}

fn open_kv(config: &ConfigFile) -> Result<Option<Arc<dyn KvStore>>, ServiceError> {
    let Some(path) = &config.storage.kv_database else {
        warn!("No tiny derivative database configured; MONTH_TINY and YEAR_TINY disabled");
        return Ok(None);
    };
    let store = SqliteKvStore::open(path)?;
    store.set_cache_size(config.storage.sqlite_cache_size)?;
    Ok(Some(Arc::new(store)))
}
