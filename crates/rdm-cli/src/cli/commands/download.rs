//! `rdm download <url>`: fetch a URL, saving a package if it is stopped or fails.

use anyhow::{Context, Result};
use rdm_core::config::RdmConfig;
use rdm_core::{DownloadConfiguration, DownloadOutcome};
use std::path::Path;

use super::{cancel_on_enter, default_package_path, report_completed, save_package, service_with_progress};

pub fn run_download(
    cfg: &RdmConfig,
    download: DownloadConfiguration,
    url: &str,
    output: Option<&Path>,
    dir: Option<&Path>,
    package_path: Option<&Path>,
) -> Result<()> {
    let mut service = service_with_progress(download)?;
    cancel_on_enter(service.cancel_handle());
    println!("Downloading {} (press Enter to stop)", url);

    let result = match output {
        Some(path) => service.start(url, Some(path)),
        None => {
            let dir = match dir {
                Some(d) => d.to_path_buf(),
                None => std::env::current_dir().context("resolving current directory")?,
            };
            service.start_in_dir(url, &dir)
        }
    };

    let keep = |service: &rdm_core::DownloadService| -> Result<()> {
        let Some(package) = service.package() else {
            return Ok(());
        };
        let path = match (package_path, package.destination.as_deref()) {
            (Some(p), _) => p.to_path_buf(),
            (None, Some(dest)) => default_package_path(cfg.package_dir.as_deref(), dest),
            (None, None) => return Ok(()),
        };
        save_package(package, &path)
    };

    match result {
        Ok(outcome) => {
            report_completed(&outcome);
            if outcome == DownloadOutcome::Cancelled {
                keep(&service)?;
            }
            Ok(())
        }
        Err(err) => {
            if service.package().is_some_and(|p| p.received_bytes() > 0) {
                keep(&service)?;
            }
            Err(err).with_context(|| format!("downloading {}", url))
        }
    }
}
