//! CLI command handlers. Each command is in its own file.

mod download;
mod resume;

pub use download::run_download;
pub use resume::run_resume;

use anyhow::{Context, Result};
use rdm_core::{CancelHandle, DownloadOutcome, DownloadOutput, DownloadService, Package};
use std::path::{Path, PathBuf};

use crate::cli::progress::ProgressPrinter;

/// Service with the terminal progress line attached.
fn service_with_progress(config: rdm_core::DownloadConfiguration) -> Result<DownloadService> {
    let mut service = DownloadService::new(config)?;
    service.subscribe(ProgressPrinter::new());
    Ok(service)
}

/// Cancel the session when the user presses Enter.
///
/// The reader thread is detached; it stays blocked on stdin once the
/// session ends and goes away with the process.
fn cancel_on_enter(cancel: CancelHandle) {
    let spawned = std::thread::Builder::new()
        .name("rdm-stdin".into())
        .spawn(move || {
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_ok_and(|n| n > 0) {
                tracing::info!("stop requested from terminal");
                cancel.cancel();
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("no stdin watcher, Enter will not stop the download: {}", e);
    }
}

/// Default package location: `<package_dir>/<file>.rdm.json` when a
/// package directory is configured, else next to the destination.
pub(crate) fn default_package_path(package_dir: Option<&Path>, destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "download".into());
    name.push(".rdm.json");
    match package_dir {
        Some(dir) => dir.join(name),
        None => destination.with_file_name(name),
    }
}

/// Write the package so `rdm resume` can pick it up.
fn save_package(package: &Package, path: &Path) -> Result<()> {
    package
        .save(path)
        .with_context(|| format!("saving package to {}", path.display()))?;
    if package.storage_mode == rdm_core::storage::StorageMode::Memory {
        println!("Note: in-memory data is not kept on disk; resuming restarts unfinished chunks.");
    }
    println!("Saved progress to {}", path.display());
    println!("Resume with: rdm resume {}", path.display());
    Ok(())
}

fn report_completed(outcome: &DownloadOutcome) {
    match outcome {
        DownloadOutcome::Completed(DownloadOutput::File(path)) => {
            println!("Saved {}", path.display());
        }
        DownloadOutcome::Completed(DownloadOutput::Memory(bytes)) => {
            println!("Received {} bytes", bytes.len());
        }
        DownloadOutcome::Cancelled => println!("Stopped."),
    }
}
