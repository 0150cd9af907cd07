//! Integration test: session bandwidth ceiling.

mod common;

use common::range_server;
use rdm_core::{DownloadConfiguration, DownloadError, DownloadOutcome, DownloadOutput, DownloadService};
use std::thread;
use std::time::{Duration, Instant};

fn memory_bytes(outcome: DownloadOutcome) -> Vec<u8> {
    match outcome {
        DownloadOutcome::Completed(DownloadOutput::Memory(bytes)) => bytes.to_vec(),
        other => panic!("expected in-memory output, got {:?}", other),
    }
}

#[test]
fn speed_limit_bounds_a_single_chunk() {
    let body = common::body(1024);
    let server = range_server::start(body.clone());

    let cfg = DownloadConfiguration {
        buffer_block_size: 128,
        max_bytes_per_second: 128,
        // Throttle sleeps happen inside the transfer; keep the idle timer out of the way.
        read_timeout_ms: 5000,
        ..common::fast_config()
    };
    let mut service = DownloadService::new(cfg).unwrap();
    let started = Instant::now();
    let outcome = service.start(&server.url("slow.bin"), None).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(memory_bytes(outcome), body);
    // 1024 bytes at 128 B/s is eight seconds of budget.
    assert!(elapsed >= Duration::from_secs(7), "finished in {:?}", elapsed);
}

#[test]
fn speed_limit_is_shared_by_parallel_chunks() {
    let body = common::body(16 * 1024);
    let server = range_server::start(body.clone());

    let cfg = DownloadConfiguration {
        parallel: true,
        chunk_count: 4,
        buffer_block_size: 512,
        max_bytes_per_second: 8 * 1024,
        read_timeout_ms: 5000,
        ..common::fast_config()
    };
    let mut service = DownloadService::new(cfg).unwrap();
    let started = Instant::now();
    let outcome = service.start(&server.url("shared.bin"), None).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(memory_bytes(outcome), body);
    // 16 KiB at 8 KiB/s aggregate: two seconds, whatever the worker count.
    assert!(elapsed >= Duration::from_millis(1500), "finished in {:?}", elapsed);
}

#[test]
fn cancel_does_not_wait_out_the_throttle() {
    let body = common::body(64 * 1024);
    let server = range_server::start(body);

    let cfg = DownloadConfiguration {
        buffer_block_size: 8000,
        max_bytes_per_second: 1024,
        read_timeout_ms: 5000,
        ..common::fast_config()
    };
    let mut service = DownloadService::new(cfg).unwrap();
    let cancel = service.cancel_handle();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        cancel.cancel();
    });
    let started = Instant::now();
    let outcome = service.start(&server.url("crawl.bin"), None).unwrap();
    canceller.join().unwrap();

    assert_eq!(outcome, DownloadOutcome::Cancelled);
    // The first 8000-byte block alone is almost eight seconds of budget.
    assert!(started.elapsed() < Duration::from_secs(3), "cancel took {:?}", started.elapsed());
    assert!(service.package().unwrap().received_bytes() < 64 * 1024);
}

#[test]
fn zero_limit_is_unlimited() {
    let body = common::body(150 * 1024);
    let server = range_server::start(body.clone());

    let cfg = DownloadConfiguration {
        max_bytes_per_second: 0,
        ..common::fast_config()
    };
    let mut service = DownloadService::new(cfg).unwrap();
    let started = Instant::now();
    let outcome = service.start(&server.url("fast.bin"), None).unwrap();
    assert_eq!(memory_bytes(outcome), body);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn negative_limit_is_rejected_up_front() {
    let cfg = DownloadConfiguration {
        max_bytes_per_second: -128,
        ..common::fast_config()
    };
    assert!(matches!(
        DownloadService::new(cfg),
        Err(DownloadError::InvalidConfiguration(_))
    ));
}
