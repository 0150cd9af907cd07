//! Final assembly of a completed download.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use super::DownloadOutput;
use crate::error::DownloadError;
use crate::package::Package;
use crate::storage::{temp_path, MemoryStorage, Storage};

/// Turn finished storage into the session output. Runs once, after every
/// chunk is complete.
pub(super) fn merge(storage: Storage, package: &Package) -> Result<DownloadOutput, DownloadError> {
    match storage {
        Storage::File(file) => {
            let dest = destination(package)?;
            file.finalize(dest).map_err(DownloadError::Merge)?;
            Ok(DownloadOutput::File(dest.to_path_buf()))
        }
        Storage::Memory(memory) => {
            check_length(memory.total_len(), package.total_size)?;
            match &package.destination {
                Some(dest) => {
                    write_buffers(&memory, dest).map_err(DownloadError::Merge)?;
                    Ok(DownloadOutput::File(dest.clone()))
                }
                None => Ok(DownloadOutput::Memory(Arc::from(memory.into_bytes()))),
            }
        }
    }
}

fn destination(package: &Package) -> Result<&Path, DownloadError> {
    package.destination.as_deref().ok_or_else(|| {
        DownloadError::Merge(io::Error::new(
            io::ErrorKind::InvalidInput,
            "file storage without a destination",
        ))
    })
}

fn check_length(merged: u64, expected: Option<u64>) -> Result<(), DownloadError> {
    match expected {
        Some(expected) if expected != merged => Err(DownloadError::Merge(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("merged {} bytes, expected {}", merged, expected),
        ))),
        _ => Ok(()),
    }
}

/// Concatenate chunk buffers into `<dest>.part`, then rename over `dest`.
fn write_buffers(memory: &MemoryStorage, dest: &Path) -> io::Result<()> {
    let part = temp_path(dest);
    let mut out = BufWriter::new(File::create(&part)?);
    let written = memory.write_to(&mut out)?;
    out.flush()?;
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);
    fs::rename(&part, dest)?;
    tracing::debug!(path = %dest.display(), bytes = written, "merged memory buffers");
    Ok(())
}
