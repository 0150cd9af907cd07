//! Download orchestration: probe, plan, run, merge, report.
//!
//! `DownloadService` owns the package, the storage between runs, the
//! listeners, and the cancel flag. One service runs one download at a time;
//! `start` and `resume` block until the session completes, is cancelled, or
//! fails.

mod merge;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chunk::Chunk;
use crate::config::DownloadConfiguration;
use crate::control::CancelHandle;
use crate::error::DownloadError;
use crate::events::{CompletedEvent, DownloadEvent, DownloadListener, ProgressTracker, StartedEvent};
use crate::fetch_head::{self, Resolution};
use crate::package::Package;
use crate::retry::TransferError;
use crate::safe_resume::validate_for_resume;
use crate::scheduler::{run_chunks, ChunkContext, RunOutcome};
use crate::storage::{FileStorage, MemoryStorage, Storage, StorageMode};
use crate::throttle::BandwidthBudget;
use crate::url_model::derive_filename;

/// Where a completed download ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutput {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

/// Non-error end of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed(DownloadOutput),
    /// Stopped by [`DownloadService::cancel`]; the package keeps every cursor.
    Cancelled,
}

pub struct DownloadService {
    config: DownloadConfiguration,
    listeners: Vec<Arc<dyn DownloadListener>>,
    cancel: CancelHandle,
    package: Option<Package>,
    /// Chunk buffers of the last unfinished memory-mode session.
    parked: Option<ParkedBuffers>,
}

/// Memory buffers kept after a cancel or failure, with the layout they were
/// written for.
struct ParkedBuffers {
    source_url: String,
    layout: Vec<(u64, Option<u64>)>,
    buffers: MemoryStorage,
}

impl ParkedBuffers {
    fn new(package: &Package, buffers: MemoryStorage) -> Self {
        Self {
            source_url: package.source_url.clone(),
            layout: layout(package),
            buffers,
        }
    }

    /// True if `package` splits the same resource into the same ranges.
    fn fits(&self, package: &Package) -> bool {
        self.source_url == package.source_url && self.layout == layout(package)
    }
}

impl DownloadService {
    /// Validate `config` and build an idle service.
    pub fn new(config: DownloadConfiguration) -> Result<Self, DownloadError> {
        config.validate()?;
        Ok(Self {
            config,
            listeners: Vec::new(),
            cancel: CancelHandle::new(),
            package: None,
            parked: None,
        })
    }

    pub fn config(&self) -> &DownloadConfiguration {
        &self.config
    }

    /// Register a listener for every later event.
    pub fn subscribe<L: DownloadListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Arc::new(listener));
    }

    /// Handle that cancels the running session from any thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// State of the current or last session.
    pub fn package(&self) -> Option<&Package> {
        self.package.as_ref()
    }

    pub fn take_package(&mut self) -> Option<Package> {
        self.package.take()
    }

    /// Download `url`. With a destination the result is written there;
    /// without one it is kept in memory and returned.
    pub fn start(&mut self, url: &str, destination: Option<&Path>) -> Result<DownloadOutcome, DownloadError> {
        self.cancel.reset();
        let result = probe(url).and_then(|resolution| {
            self.start_resolved(url, destination.map(Path::to_path_buf), &resolution)
        });
        self.report(&result);
        result
    }

    /// Download `url` into `dir`, naming the file after the server's
    /// `Content-Disposition` or the URL path.
    pub fn start_in_dir(&mut self, url: &str, dir: &Path) -> Result<DownloadOutcome, DownloadError> {
        self.cancel.reset();
        let result = probe(url).and_then(|resolution| {
            fs::create_dir_all(dir).map_err(DownloadError::StorageWrite)?;
            let name = derive_filename(url, resolution.content_disposition.as_deref());
            self.start_resolved(url, Some(dir.join(name)), &resolution)
        });
        self.report(&result);
        result
    }

    /// Continue a package from an earlier (possibly cancelled or failed) session.
    ///
    /// The resource is probed again and must still match the package;
    /// otherwise the resume fails with `ResourceChanged` and nothing is
    /// written. The package's own storage mode is used.
    pub fn resume(&mut self, package: Package) -> Result<DownloadOutcome, DownloadError> {
        self.cancel.reset();
        let result = package
            .validate()
            .and_then(|()| probe(&package.source_url))
            .and_then(|resolution| {
                validate_for_resume(&package, &resolution)?;
                info!(
                    url = %package.source_url,
                    received = package.received_bytes(),
                    size = ?package.total_size,
                    "resuming download"
                );
                self.execute(package, true)
            });
        self.report(&result);
        result
    }

    fn start_resolved(
        &mut self,
        url: &str,
        destination: Option<PathBuf>,
        resolution: &Resolution,
    ) -> Result<DownloadOutcome, DownloadError> {
        let mode = if self.config.in_memory_storage || destination.is_none() {
            StorageMode::Memory
        } else {
            StorageMode::File
        };
        let mut package = Package::new(url, destination, mode);
        package.plan(resolution, self.config.chunk_count);
        info!(
            url,
            size = ?package.total_size,
            supports_range = package.supports_range,
            chunks = package.chunks.len(),
            storage = ?mode,
            "download started"
        );
        self.parked = None;
        self.execute(package, false)
    }

    fn execute(&mut self, mut package: Package, resuming: bool) -> Result<DownloadOutcome, DownloadError> {
        let budget = BandwidthBudget::new(self.config.bandwidth_limit()?);
        let listeners = self.listeners.clone();
        let url = package.source_url.clone();

        if !package.supports_range {
            package.rewind();
        }
        let mut storage = match self.prepare_storage(&mut package, resuming) {
            Ok(storage) => storage,
            Err(e) => {
                self.package = Some(package);
                return Err(e);
            }
        };
        for chunk in &mut package.chunks {
            chunk.prepare();
        }

        let started = DownloadEvent::Started(StartedEvent {
            url: url.clone(),
            total_bytes: package.total_size,
            supports_range: package.supports_range,
            chunk_count: package.chunks.len(),
            resumed_bytes: package.received_bytes(),
        });
        for listener in &listeners {
            listener.on_event(&started);
        }

        let mut downgraded = false;
        loop {
            let tracker = ProgressTracker::new(&listeners, package.total_size, package.received_bytes());
            let stop = CancelHandle::new();
            let ctx = ChunkContext {
                url: &url,
                total_size: package.total_size,
                supports_range: package.supports_range,
                config: &self.config,
                policy: self.config.retry_policy(),
                storage: &storage,
                budget: &budget,
                tracker: &tracker,
                cancel: &self.cancel,
                stop: &stop,
            };
            let outcome = run_chunks(&ctx, &mut package.chunks, self.config.parallel);
            debug!(?outcome, received = tracker.bytes_received(), "chunk run finished");

            match outcome {
                Ok(RunOutcome::Completed) => break,
                Ok(RunOutcome::Cancelled) => {
                    info!(url = %url, received = package.received_bytes(), "download cancelled");
                    self.park(package, storage);
                    return Ok(DownloadOutcome::Cancelled);
                }
                Ok(RunOutcome::RangeUnsupported) if !downgraded => {
                    warn!(url = %url, "server ignores ranges, restarting as a single chunk");
                    downgraded = true;
                    package.downgrade();
                    drop(storage);
                    self.parked = None;
                    storage = match self.prepare_storage(&mut package, false) {
                        Ok(storage) => storage,
                        Err(e) => {
                            self.package = Some(package);
                            return Err(e);
                        }
                    };
                }
                Ok(RunOutcome::RangeUnsupported) => {
                    let err = DownloadError::ChunkFailed {
                        chunk: 0,
                        source: TransferError::RangeIgnored,
                    };
                    self.park(package, storage);
                    return Err(err);
                }
                Err(e) => {
                    self.park(package, storage);
                    return Err(e);
                }
            }
        }

        package.settle_open_ended();
        let merged = merge::merge(storage, &package);
        self.package = Some(package);
        let output = merged?;
        info!(url = %url, "download complete");
        Ok(DownloadOutcome::Completed(output))
    }

    /// Storage for a run. Resumes reuse what the last run left behind when
    /// it still matches the package; otherwise chunks restart from their start.
    fn prepare_storage(&mut self, package: &mut Package, resuming: bool) -> Result<Storage, DownloadError> {
        match package.storage_mode {
            StorageMode::File => {
                let dest = package.destination.clone().ok_or_else(|| {
                    DownloadError::InvalidConfiguration("file storage needs a destination".to_string())
                })?;
                if resuming {
                    match FileStorage::open_existing(&dest) {
                        Ok(file) => return Ok(Storage::File(file)),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            debug!(path = %dest.display(), "temp file missing, restarting chunks");
                            package.rewind();
                        }
                        Err(e) => return Err(DownloadError::StorageWrite(e)),
                    }
                }
                let file = FileStorage::create(&dest, package.total_size).map_err(DownloadError::StorageWrite)?;
                Ok(Storage::File(file))
            }
            StorageMode::Memory => {
                let kept = self
                    .parked
                    .take()
                    .filter(|parked| resuming && parked.fits(package))
                    .map(|parked| parked.buffers);
                let mut memory = kept.unwrap_or_else(|| MemoryStorage::new(package.chunks.len()));
                memory.reconcile(&mut package.chunks);
                Ok(Storage::Memory(memory))
            }
        }
    }

    /// Keep an unfinished session for a later resume.
    fn park(&mut self, package: Package, storage: Storage) {
        if let Storage::Memory(memory) = storage {
            self.parked = Some(ParkedBuffers::new(&package, memory));
        }
        self.package = Some(package);
    }

    /// Emit the terminal event for a session.
    fn report(&self, result: &Result<DownloadOutcome, DownloadError>) {
        let event = match result {
            Ok(DownloadOutcome::Completed(output)) => CompletedEvent {
                cancelled: false,
                error: None,
                output: Some(output.clone()),
            },
            Ok(DownloadOutcome::Cancelled) => CompletedEvent {
                cancelled: true,
                error: None,
                output: None,
            },
            Err(e) => {
                warn!(error = %e.chain(), "download failed");
                CompletedEvent {
                    cancelled: false,
                    error: Some(e.chain()),
                    output: None,
                }
            }
        };
        let event = DownloadEvent::Completed(event);
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}

fn probe(url: &str) -> Result<Resolution, DownloadError> {
    fetch_head::resolve(url).map_err(|source| DownloadError::Probe {
        url: url.to_string(),
        source,
    })
}

fn layout(package: &Package) -> Vec<(u64, Option<u64>)> {
    package.chunks.iter().map(|c: &Chunk| (c.start, c.end)).collect()
}
