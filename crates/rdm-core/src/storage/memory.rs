//! Per-chunk in-memory buffers.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use crate::chunk::Chunk;

/// One growable buffer per chunk. Buffers never alias, so each lock is only
/// ever taken by the worker that owns the chunk (and by the merge).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buffers: Vec<Mutex<Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new(chunk_count: usize) -> Self {
        Self {
            buffers: (0..chunk_count).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.buffers.len()
    }

    /// Write `data` at `relative` bytes into the chunk's buffer. Writing
    /// before the current end (a restart) drops everything after `relative`
    /// first; writing past it would leave a gap and is an error.
    pub fn write(&self, chunk: usize, relative: u64, data: &[u8]) -> io::Result<()> {
        let slot = self.buffers.get(chunk).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("no buffer for chunk {}", chunk))
        })?;
        let mut buf = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let relative = usize::try_from(relative)
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "chunk too large for memory"))?;
        if relative > buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write at {} would leave a gap in chunk {} (buffered {})",
                    relative,
                    chunk,
                    buf.len()
                ),
            ));
        }
        buf.truncate(relative);
        buf.try_reserve(data.len())
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        buf.extend_from_slice(data);
        Ok(())
    }

    /// Bytes buffered for `chunk`.
    pub fn buffered(&self, chunk: usize) -> u64 {
        self.buffers
            .get(chunk)
            .map(|b| b.lock().unwrap_or_else(PoisonError::into_inner).len() as u64)
            .unwrap_or(0)
    }

    /// Line cursors and buffers up before a resume: a chunk can only resume
    /// from bytes that are actually buffered. Chunks ahead of their buffer
    /// fall back to the buffered length; buffers ahead of their chunk are cut.
    pub fn reconcile(&mut self, chunks: &mut [Chunk]) {
        if self.buffers.len() != chunks.len() {
            *self = MemoryStorage::new(chunks.len());
        }
        for (slot, chunk) in self.buffers.iter_mut().zip(chunks.iter_mut()) {
            let buf = slot.get_mut().unwrap_or_else(PoisonError::into_inner);
            let kept = chunk.received().min(buf.len() as u64);
            if kept < chunk.received() {
                tracing::debug!(chunk = chunk.id, from = chunk.position, to = chunk.start + kept, "memory buffer behind cursor, rewinding");
            }
            buf.truncate(kept as usize);
            chunk.position = chunk.start + kept;
        }
    }

    /// Total buffered bytes across chunks.
    pub fn total_len(&self) -> u64 {
        (0..self.buffers.len()).map(|i| self.buffered(i)).sum()
    }

    /// Concatenate buffers in chunk order into `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<u64> {
        let mut written = 0u64;
        for slot in &self.buffers {
            let buf = slot.lock().unwrap_or_else(PoisonError::into_inner);
            out.write_all(&buf)?;
            written += buf.len() as u64;
        }
        Ok(written)
    }

    /// Concatenate buffers in chunk order, consuming the storage.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len() as usize);
        for slot in self.buffers {
            out.extend(slot.into_inner().unwrap_or_else(PoisonError::into_inner));
        }
        out
    }
}
