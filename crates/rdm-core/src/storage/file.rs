//! Shared destination temp file written at absolute offsets.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Temporary file suffix used before the atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (`file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Handle on the `.part` file. Clones share one descriptor; every write is
/// positional, so concurrent chunk workers need no lock as long as their
/// ranges are disjoint.
#[derive(Debug, Clone)]
pub struct FileStorage {
    file: Arc<File>,
    temp_path: PathBuf,
}

impl FileStorage {
    /// Create (or truncate) the temp file for `final_path` and preallocate
    /// `size` bytes when the size is known.
    pub fn create(final_path: &Path, size: Option<u64>) -> io::Result<Self> {
        let temp_path = temp_path(final_path);
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        if let Some(size) = size {
            preallocate(&file, size)?;
        }
        tracing::debug!(path = %temp_path.display(), ?size, "created temp file");
        Ok(Self {
            file: Arc::new(file),
            temp_path,
        })
    }

    /// Reopen the temp file of an interrupted download without truncating it.
    pub fn open_existing(final_path: &Path) -> io::Result<Self> {
        let temp_path = temp_path(final_path);
        let file = File::options().read(true).write(true).open(&temp_path)?;
        tracing::debug!(path = %temp_path.display(), "reopened temp file");
        Ok(Self {
            file: Arc::new(file),
            temp_path,
        })
    }

    /// Write all of `data` at `offset` without moving any shared cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.write_all_at(data, offset)
    }

    #[cfg(windows)]
    pub fn write_at(&self, mut offset: u64, mut data: &[u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !data.is_empty() {
            let n = self.file.seek_write(data, offset)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "short positional write"));
            }
            data = &data[n..];
            offset += n as u64;
        }
        Ok(())
    }

    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Sync, close, and atomically rename the temp file to `final_path`.
    pub fn finalize(self, final_path: &Path) -> io::Result<()> {
        self.sync()?;
        let temp_path = self.temp_path.clone();
        drop(self.file);
        std::fs::rename(&temp_path, final_path)?;
        tracing::debug!(path = %final_path.display(), "finalized download");
        Ok(())
    }
}

/// Reserve `size` bytes. On Unix tries `posix_fallocate` for real block
/// allocation; falls back to `set_len` on failure or elsewhere.
fn preallocate(file: &File, size: u64) -> io::Result<()> {
    if size == 0 {
        return Ok(());
    }
    #[cfg(unix)]
    {
        let r = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, size as libc::off_t) };
        if r == 0 {
            return Ok(());
        }
        tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
    }
    file.set_len(size)
}
