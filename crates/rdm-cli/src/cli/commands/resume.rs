//! `rdm resume <package>`: continue a saved download.

use anyhow::{Context, Result};
use rdm_core::{DownloadConfiguration, DownloadOutcome, Package};
use std::path::Path;

use super::{cancel_on_enter, report_completed, save_package, service_with_progress};

pub fn run_resume(download: DownloadConfiguration, package_path: &Path) -> Result<()> {
    let package = Package::load(package_path)
        .with_context(|| format!("loading package {}", package_path.display()))?;
    println!(
        "Resuming {} ({} bytes already received, press Enter to stop)",
        package.source_url,
        package.received_bytes()
    );

    let mut service = service_with_progress(download)?;
    cancel_on_enter(service.cancel_handle());
    let result = service.resume(package);

    match result {
        Ok(DownloadOutcome::Cancelled) => {
            report_completed(&DownloadOutcome::Cancelled);
            if let Some(package) = service.package() {
                save_package(package, package_path)?;
            }
            Ok(())
        }
        Ok(outcome) => {
            report_completed(&outcome);
            if let Err(e) = std::fs::remove_file(package_path) {
                tracing::warn!("could not remove finished package {}: {}", package_path.display(), e);
            }
            Ok(())
        }
        Err(err) => {
            // Keep whatever progress this run made; a changed resource leaves the file as it was.
            if let Some(package) = service.package() {
                save_package(package, package_path)?;
            }
            Err(err).context("resume failed")
        }
    }
}
