//! Stream wrapper that caps average throughput.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use super::{bandwidth_limit, UNLIMITED};
use crate::control::CancelHandle;
use crate::error::DownloadError;

/// Length of one accounting window.
const WINDOW: Duration = Duration::from_secs(1);

/// Granularity of interruptible throttle sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Wraps a reader or writer and sleeps after each call when the bytes moved
/// in the current window would exceed the ceiling.
///
/// The wrapper never touches the data: the same bytes reach the caller or the
/// inner writer in the same order, only later. A throttle sleep ends early
/// once any handle given to [`ThrottledStream::interruptible_by`] is cancelled;
/// the bytes of that call have already moved.
#[derive(Debug)]
pub struct ThrottledStream<S> {
    inner: S,
    limit: u64,
    window_start: Instant,
    window_bytes: u64,
    interrupts: Vec<CancelHandle>,
}

impl<S> ThrottledStream<S> {
    /// Wrap `inner` with a ceiling of `max_bytes_per_second`.
    ///
    /// Fails with `InvalidConfiguration` for negative values; `0` means unlimited.
    pub fn new(inner: S, max_bytes_per_second: i64) -> Result<Self, DownloadError> {
        Ok(Self::with_limit(inner, bandwidth_limit(max_bytes_per_second)?))
    }

    /// Wrap `inner` with an already-validated limit (`UNLIMITED` for none).
    pub fn with_limit(inner: S, limit: u64) -> Self {
        Self {
            inner,
            limit: if limit == 0 { UNLIMITED } else { limit },
            window_start: Instant::now(),
            window_bytes: 0,
            interrupts: Vec::new(),
        }
    }

    /// Cut throttle sleeps short when `handle` is cancelled.
    pub fn interruptible_by(mut self, handle: CancelHandle) -> Self {
        self.interrupts.push(handle);
        self
    }

    fn is_interrupted(&self) -> bool {
        self.interrupts.iter().any(CancelHandle::is_cancelled)
    }

    /// Current ceiling in bytes per second (`u64::MAX` when unlimited).
    pub fn bandwidth_limit(&self) -> u64 {
        self.limit
    }

    /// Change the ceiling. A change starts a fresh window so bytes counted
    /// under the old ceiling cannot be "caught up" in a burst.
    pub fn set_bandwidth_limit(&mut self, limit: u64) {
        let limit = if limit == 0 { UNLIMITED } else { limit };
        if limit != self.limit {
            self.limit = limit;
            self.reset_window();
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn reset_window(&mut self) {
        self.window_start = Instant::now();
        self.window_bytes = 0;
    }

    /// Account for `bytes` just moved and sleep until the window average is
    /// back under the ceiling.
    fn throttle(&mut self, bytes: usize) {
        if self.limit == UNLIMITED || bytes == 0 {
            return;
        }
        self.window_bytes = self.window_bytes.saturating_add(bytes as u64);
        let due = Duration::from_secs_f64(self.window_bytes as f64 / self.limit as f64);
        let deadline = self.window_start + due;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if self.is_interrupted() {
                return;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
        if self.window_start.elapsed() >= WINDOW {
            self.reset_window();
        }
    }
}

impl<S: Read> Read for ThrottledStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.throttle(n);
        Ok(n)
    }
}

impl<S: Write> Write for ThrottledStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.throttle(n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ordered_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn read_speed_is_capped() {
        let data = ordered_bytes(1024);
        let mut stream = ThrottledStream::new(Cursor::new(data), 256).unwrap();
        let mut buf = [0u8; 32];
        let started = Instant::now();
        while stream.read(&mut buf).unwrap() > 0 {}
        let elapsed = started.elapsed();
        // 1024 bytes at 256 B/s: about four seconds.
        assert!(elapsed >= Duration::from_millis(3000), "took {:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(5000), "took {:?}", elapsed);
    }

    #[test]
    fn write_speed_is_capped() {
        let data = ordered_bytes(1024);
        let mut stream = ThrottledStream::new(Vec::new(), 256).unwrap();
        let started = Instant::now();
        stream.write_all(&data).unwrap();
        assert!(started.elapsed() + Duration::from_millis(50) >= Duration::from_secs(4));
        assert_eq!(stream.into_inner(), data);
    }

    #[test]
    fn negative_bandwidth_is_rejected() {
        let r = ThrottledStream::new(Vec::<u8>::new(), -1);
        assert!(matches!(r, Err(DownloadError::InvalidConfiguration(_))));
    }

    #[test]
    fn zero_bandwidth_is_unlimited() {
        let stream = ThrottledStream::new(Vec::<u8>::new(), 0).unwrap();
        assert_eq!(stream.bandwidth_limit(), u64::MAX);
    }

    fn assert_integrity(size: usize, limit: i64) {
        let data = ordered_bytes(size);
        let mut writer = ThrottledStream::new(Vec::new(), limit).unwrap();
        writer.write_all(&data).unwrap();
        let written = writer.into_inner();

        let mut reader = ThrottledStream::new(Cursor::new(written), limit).unwrap();
        let mut copied = Vec::new();
        reader.read_to_end(&mut copied).unwrap();
        assert_eq!(copied, data);
    }

    #[test]
    fn integrity_with_speed_above_size() {
        assert_integrity(500, 1024);
    }

    #[test]
    fn integrity_with_speed_below_size() {
        assert_integrity(247, 500);
    }

    #[test]
    fn integrity_unlimited_is_fast() {
        let started = Instant::now();
        assert_integrity(4096, 0);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn cancel_cuts_a_throttle_sleep_short() {
        let cancel = CancelHandle::new();
        let mut stream = ThrottledStream::with_limit(Vec::new(), 1024).interruptible_by(cancel.clone());
        let remote = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            remote.cancel();
        });
        let started = Instant::now();
        // 8000 bytes at 1 KiB/s would otherwise sleep for almost eight seconds.
        stream.write_all(&[7u8; 8000]).unwrap();
        canceller.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert_eq!(stream.into_inner(), vec![7u8; 8000]);
    }

    #[test]
    fn raising_the_limit_resets_the_window() {
        let mut stream = ThrottledStream::with_limit(Vec::new(), 100);
        stream.write_all(&[0u8; 10]).unwrap();
        stream.set_bandwidth_limit(10_000);
        assert_eq!(stream.bandwidth_limit(), 10_000);
        let started = Instant::now();
        stream.write_all(&[0u8; 100]).unwrap();
        // 100 bytes at 10 kB/s is 10 ms; no leftover debt from the slower window.
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
