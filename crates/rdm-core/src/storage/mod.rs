//! Chunk storage backends.
//!
//! `File` writes every chunk straight into one shared temp file at its
//! absolute offset (positional writes, no lock, ranges never overlap) and
//! renames it into place at the end. `Memory` keeps one private buffer per
//! chunk and concatenates them at merge time.

mod file;
mod memory;

pub use file::{temp_path, FileStorage, TEMP_SUFFIX};
pub use memory::MemoryStorage;

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

use crate::chunk::Chunk;

/// Which backend a package was downloaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Memory,
    #[default]
    File,
}

/// Storage owned by the download service for one session.
#[derive(Debug)]
pub enum Storage {
    File(FileStorage),
    Memory(MemoryStorage),
}

impl Storage {
    pub fn mode(&self) -> StorageMode {
        match self {
            Storage::File(_) => StorageMode::File,
            Storage::Memory(_) => StorageMode::Memory,
        }
    }

    /// Writer for one chunk, positioned at the chunk's cursor.
    pub fn writer(&self, chunk: &Chunk) -> ChunkWriter<'_> {
        ChunkWriter {
            storage: self,
            chunk: chunk.id,
            chunk_start: chunk.start,
            offset: chunk.position,
        }
    }

    fn write_at(&self, chunk: usize, chunk_start: u64, offset: u64, data: &[u8]) -> io::Result<()> {
        match self {
            Storage::File(f) => f.write_at(offset, data),
            Storage::Memory(m) => m.write(chunk, offset - chunk_start, data),
        }
    }
}

/// `Write` adapter that lands bytes at a chunk's absolute offsets.
///
/// Each successful write advances the offset by the bytes written, so the
/// writer's offset tracks the chunk cursor as long as the worker keeps them
/// in step.
#[derive(Debug)]
pub struct ChunkWriter<'a> {
    storage: &'a Storage,
    chunk: usize,
    chunk_start: u64,
    offset: u64,
}

impl ChunkWriter<'_> {
    /// Absolute offset of the next write.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reposition (e.g. after a non-resumable restart from the chunk start).
    pub fn seek(&mut self, offset: u64) {
        self.offset = offset;
    }
}

impl Write for ChunkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.storage
            .write_at(self.chunk, self.chunk_start, self.offset, buf)?;
        self.offset += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
