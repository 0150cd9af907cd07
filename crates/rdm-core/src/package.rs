//! Session state that survives cancellation and process restarts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::chunk::{plan_chunks, single_chunk, Chunk};
use crate::error::DownloadError;
use crate::fetch_head::Resolution;
use crate::storage::StorageMode;

/// Everything needed to continue a download: where it comes from, where it
/// goes, what the server said about it, and every chunk cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub source_url: String,
    /// Output file; `None` keeps the result in memory.
    pub destination: Option<PathBuf>,
    /// Size reported by the server, if any.
    pub total_size: Option<u64>,
    pub supports_range: bool,
    pub storage_mode: StorageMode,
    /// Ordered by `id`; ids are indices.
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl Package {
    /// Empty package; chunks are planned once the resource is resolved.
    pub fn new(source_url: &str, destination: Option<PathBuf>, storage_mode: StorageMode) -> Self {
        Self {
            source_url: source_url.to_string(),
            destination,
            total_size: None,
            supports_range: false,
            storage_mode,
            chunks: Vec::new(),
            etag: None,
            last_modified: None,
        }
    }

    /// Record what the resolver found and plan chunks for it.
    ///
    /// Ranged servers with a known size get `chunk_count` chunks; anything
    /// else gets one chunk.
    pub fn plan(&mut self, resolution: &Resolution, chunk_count: usize) {
        self.total_size = resolution.total_size;
        self.supports_range = resolution.supports_range && resolution.total_size.is_some();
        self.etag = resolution.etag.clone();
        self.last_modified = resolution.last_modified.clone();
        self.chunks = match resolution.total_size {
            Some(size) if self.supports_range => plan_chunks(size, chunk_count),
            size => single_chunk(size),
        };
        tracing::debug!(
            url = %self.source_url,
            size = ?self.total_size,
            supports_range = self.supports_range,
            chunks = self.chunks.len(),
            "planned chunks"
        );
    }

    /// Re-plan as one non-resumable chunk (the server ignored a Range header).
    pub fn downgrade(&mut self) {
        self.supports_range = false;
        self.chunks = single_chunk(self.total_size);
    }

    /// Restart every chunk from its start.
    pub fn rewind(&mut self) {
        for chunk in &mut self.chunks {
            chunk.rewind();
        }
    }

    /// Sum of bytes fetched across chunks.
    pub fn received_bytes(&self) -> u64 {
        self.chunks.iter().map(Chunk::received).sum()
    }

    /// True when every chunk is complete (vacuously true for an empty resource).
    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(Chunk::is_complete)
    }

    /// Close open-ended chunks once EOF has been reached, fixing the total size.
    pub(crate) fn settle_open_ended(&mut self) {
        if self.chunks.iter().all(|c| c.end.is_some()) {
            return;
        }
        let received = self.received_bytes();
        self.total_size = Some(received);
        if received == 0 {
            self.chunks.clear();
            return;
        }
        for chunk in &mut self.chunks {
            if chunk.end.is_none() {
                chunk.end = Some(chunk.position - 1);
            }
        }
    }

    /// Check the chunk layout: ids are indices, chunks tile `[0, total_size)`
    /// without gaps or overlaps, and every cursor lies in `[start, end + 1]`.
    /// Only the last chunk of a resource of unknown size may be open-ended.
    pub fn validate(&self) -> Result<(), DownloadError> {
        let invalid = |msg: String| Err(DownloadError::InvalidPackage(msg));
        if !self.supports_range && self.chunks.len() > 1 {
            return invalid(format!("{} chunks without range support", self.chunks.len()));
        }
        let mut next = 0u64;
        for (i, chunk) in self.chunks.iter().enumerate() {
            if chunk.id != i {
                return invalid(format!("chunk at index {} has id {}", i, chunk.id));
            }
            if chunk.start != next {
                return invalid(format!("chunk {} starts at {}, expected {}", i, chunk.start, next));
            }
            if chunk.position < chunk.start {
                return invalid(format!("chunk {} cursor {} is before its start {}", i, chunk.position, chunk.start));
            }
            match chunk.end {
                Some(end) => {
                    if end < chunk.start {
                        return invalid(format!("chunk {} ends at {} before its start {}", i, end, chunk.start));
                    }
                    if chunk.position > end + 1 {
                        return invalid(format!("chunk {} cursor {} is past its end {}", i, chunk.position, end));
                    }
                    next = end + 1;
                }
                None if i + 1 == self.chunks.len() && self.total_size.is_none() => {}
                None => return invalid(format!("chunk {} is open-ended", i)),
            }
        }
        match (self.total_size, self.chunks.last()) {
            (Some(size), Some(last)) if last.end.is_some() && next != size => {
                invalid(format!("chunks cover {} bytes of {}", next, size))
            }
            (Some(size), None) if size > 0 => invalid(format!("no chunks for {} bytes", size)),
            _ => Ok(()),
        }
    }

    /// Write the package as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), DownloadError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(DownloadError::PackageIo)?;
        }
        fs::write(path, json).map_err(DownloadError::PackageIo)?;
        tracing::debug!(path = %path.display(), "package saved");
        Ok(())
    }

    /// Read a package written by [`Package::save`]. The chunk layout is
    /// validated before the package is handed out.
    pub fn load(path: &Path) -> Result<Self, DownloadError> {
        let data = fs::read_to_string(path).map_err(DownloadError::PackageIo)?;
        let mut package: Package = serde_json::from_str(&data)?;
        package.validate()?;
        for chunk in &mut package.chunks {
            chunk.prepare();
        }
        Ok(package)
    }
}
