#![allow(dead_code)]

pub mod range_server;

use rdm_core::{DownloadConfiguration, DownloadEvent, DownloadService, RetryLimit};
use std::sync::{Arc, Mutex};

/// Deterministic body of `len` bytes.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Configuration with short backoff and read timeout so failure tests stay fast.
pub fn fast_config() -> DownloadConfiguration {
    DownloadConfiguration {
        buffer_block_size: 1024,
        read_timeout_ms: 500,
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 50,
        max_retries_per_chunk: RetryLimit::Finite(5),
        ..DownloadConfiguration::default()
    }
}

/// Record every event the service emits.
pub fn record_events(service: &mut DownloadService) -> Arc<Mutex<Vec<DownloadEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    service.subscribe(move |e: &DownloadEvent| sink.lock().unwrap().push(e.clone()));
    events
}

/// Progress events only, as (chunk_id, chunk_position, block length).
pub fn progress_of(events: &[DownloadEvent]) -> Vec<(usize, u64, usize)> {
    events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::Progress(p) => Some((p.chunk_id, p.chunk_position, p.received.len())),
            _ => None,
        })
        .collect()
}
