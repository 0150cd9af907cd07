//! Tests for progress formatting and package placement.

use crate::cli::commands::default_package_path;
use crate::cli::progress::{human_bytes, progress_line};
use rdm_core::ProgressEvent;
use std::path::Path;

#[test]
fn human_bytes_units() {
    assert_eq!(human_bytes(0), "0 B");
    assert_eq!(human_bytes(1023), "1023 B");
    assert_eq!(human_bytes(1024), "1.0 KiB");
    assert_eq!(human_bytes(1536), "1.5 KiB");
    assert_eq!(human_bytes(10 * 1024 * 1024), "10.0 MiB");
    assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
}

fn event(received: u64, total: Option<u64>, rate: f64) -> ProgressEvent {
    ProgressEvent {
        chunk_id: 0,
        chunk_position: received,
        bytes_received: received,
        total_bytes: total,
        received: Vec::new(),
        bytes_per_second: rate,
    }
}

#[test]
fn progress_line_with_known_size() {
    let line = progress_line(&event(512 * 1024, Some(1024 * 1024), 256.0 * 1024.0));
    assert_eq!(line, "512.0 KiB / 1.0 MiB (50.0%)  256.0 KiB/s  ETA 2s");
}

#[test]
fn progress_line_without_size_or_rate() {
    assert_eq!(progress_line(&event(2048, None, 0.0)), "2.0 KiB  0 B/s");
    let line = progress_line(&event(0, Some(4096), 0.0));
    assert!(line.ends_with("ETA ?"), "{}", line);
}

#[test]
fn package_lands_next_to_destination() {
    let path = default_package_path(None, Path::new("/data/file.iso"));
    assert_eq!(path, Path::new("/data/file.iso.rdm.json"));
}

#[test]
fn package_dir_overrides_location() {
    let path = default_package_path(Some(Path::new("/var/rdm")), Path::new("/data/file.iso"));
    assert_eq!(path, Path::new("/var/rdm/file.iso.rdm.json"));
}
