//! Terminal progress line.

use rdm_core::{DownloadEvent, DownloadListener, ProgressEvent};
use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Prints a progress line at most every 500 ms, plus a final one.
#[derive(Default)]
pub struct ProgressPrinter {
    last_print: Mutex<Option<Instant>>,
}

impl ProgressPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    fn print_progress(&self, p: &ProgressEvent) {
        let done = p.total_bytes.is_some_and(|t| p.bytes_received >= t);
        let Ok(mut last) = self.last_print.lock() else {
            return;
        };
        let now = Instant::now();
        if !done && last.is_some_and(|t| now.duration_since(t) < PROGRESS_INTERVAL) {
            return;
        }
        *last = Some(now);
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r  {}  ", progress_line(p));
        let _ = err.flush();
    }
}

impl DownloadListener for ProgressPrinter {
    fn on_event(&self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Started(s) => {
                let size = s
                    .total_bytes
                    .map(human_bytes)
                    .unwrap_or_else(|| "unknown size".to_string());
                eprintln!(
                    "  {}, {} chunk(s){}",
                    size,
                    s.chunk_count,
                    if s.supports_range { "" } else { ", no range support" }
                );
            }
            DownloadEvent::Progress(p) => self.print_progress(p),
            DownloadEvent::Completed(_) => eprintln!(),
        }
    }
}

/// `1.5 MiB / 10.0 MiB (15.0%)  512.0 KiB/s  ETA 17s`
pub fn progress_line(p: &ProgressEvent) -> String {
    let rate = human_bytes(p.bytes_per_second as u64);
    match (p.total_bytes, p.fraction()) {
        (Some(total), Some(fraction)) => {
            let eta = p
                .eta_secs()
                .map(|s| format!("{:.0}s", s))
                .unwrap_or_else(|| "?".to_string());
            format!(
                "{} / {} ({:.1}%)  {}/s  ETA {}",
                human_bytes(p.bytes_received),
                human_bytes(total),
                fraction * 100.0,
                rate,
                eta
            )
        }
        _ => format!("{}  {}/s", human_bytes(p.bytes_received), rate),
    }
}

/// Binary-unit byte count: `512 B`, `1.5 KiB`, `3.0 GiB`.
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if n < 1024 {
        return format!("{} B", n);
    }
    let mut value = n as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
