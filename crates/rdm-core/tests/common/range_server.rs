//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves one body at any path. HEAD answers with Content-Length and (unless
//! disabled) `Accept-Ranges: bytes`; GET with a Range header answers 206.
//! Faults can be injected into the first N body-carrying GETs to exercise
//! retries; the `bytes=0-0` range probe is never faulted.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

/// What goes wrong with a faulted GET.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Send headers for the full range, then `after` bytes, then close.
    Truncate { after: usize },
    /// Send `after` bytes, then go silent for `pause` before closing.
    Stall { after: usize, pause: Duration },
    /// Answer with a header block the client cannot parse, then close.
    Garbled,
}

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` header even if ranges work.
    pub advertise_ranges: bool,
    /// Advertise ranges on HEAD but answer every GET with 200 and the full body.
    pub ignore_ranges_on_get: bool,
    /// If false, HEAD omits Content-Length (size unknown until EOF).
    pub send_length: bool,
    /// Fault applied to the first `faulty_gets` body GETs.
    pub fault: Option<Fault>,
    pub faulty_gets: usize,
    /// Answer every GET with this status and an empty body.
    pub get_status: Option<u16>,
    /// Write bodies in pieces of this size with a pause after each.
    pub slow_body: Option<(usize, Duration)>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            ignore_ranges_on_get: false,
            send_length: true,
            fault: None,
            faulty_gets: 0,
            get_status: None,
            slow_body: None,
        }
    }
}

/// A running server. Lives until the process exits.
#[derive(Clone)]
pub struct RangeServer {
    base: String,
    body: Arc<RwLock<Vec<u8>>>,
    gets: Arc<Mutex<Vec<Option<(u64, u64)>>>>,
}

impl RangeServer {
    /// URL of `path` on this server (e.g. `url("data/16KB.dat")`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    /// Replace the served body (simulates the resource changing upstream).
    pub fn set_body(&self, body: Vec<u8>) {
        *self.body.write().unwrap() = body;
    }

    /// Ranges requested by GETs so far, in arrival order (`None` = no Range header).
    pub fn get_ranges(&self) -> Vec<Option<(u64, u64)>> {
        self.gets.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread serving `body`.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Like `start` but allows customizing server behavior (HEAD blocked, ranges missing, faults...).
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = RangeServer {
        base: format!("http://127.0.0.1:{}/", port),
        body: Arc::new(RwLock::new(body)),
        gets: Arc::new(Mutex::new(Vec::new())),
    };
    let faults_left = Arc::new(AtomicUsize::new(opts.faulty_gets));
    let shared = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let server = shared.clone();
            let faults_left = Arc::clone(&faults_left);
            thread::spawn(move || handle(stream, &server, opts, &faults_left));
        }
    });
    server
}

fn handle(mut stream: TcpStream, server: &RangeServer, opts: RangeServerOptions, faults_left: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let (method, range) = parse_request(&request);
    let body = server.body.read().unwrap().clone();
    let total = body.len() as u64;
    let accept_ranges = if opts.advertise_ranges && (opts.support_ranges || opts.ignore_ranges_on_get) {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            return;
        }
        let length = if opts.send_length {
            format!("Content-Length: {}\r\n", total)
        } else {
            String::new()
        };
        let response = format!("HTTP/1.1 200 OK\r\n{}{}Connection: close\r\n\r\n", length, accept_ranges);
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    server.gets.lock().unwrap().push(range);
    if let Some(code) = opts.get_status {
        let response = format!("HTTP/1.1 {} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", code);
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let (status, content_range, slice) = match range.filter(|_| opts.support_ranges && !opts.ignore_ranges_on_get) {
        Some((start, end_incl)) => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if total == 0 || start > end_incl {
                ("416 Range Not Satisfiable", format!("Content-Range: bytes */{}\r\n", total), &body[0..0])
            } else {
                let slice = &body[start as usize..=end_incl as usize];
                (
                    "206 Partial Content",
                    format!("Content-Range: bytes {}-{}/{}\r\n", start, end_incl, total),
                    slice,
                )
            }
        }
        None => ("200 OK", String::new(), &body[..]),
    };

    let is_probe = range == Some((0, 0));
    let fault = match opts.fault {
        Some(f) if !is_probe && !slice.is_empty() => {
            let claimed = faults_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            claimed.ok().map(|_| f)
        }
        _ => None,
    };
    let length = if opts.send_length || status.starts_with("206") {
        format!("Content-Length: {}\r\n", slice.len())
    } else {
        String::new()
    };
    if let Some(Fault::Garbled) = fault {
        let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: nonsense\r\nConnection: close\r\n\r\n");
        return;
    }
    let head = format!(
        "HTTP/1.1 {}\r\n{}{}{}Connection: close\r\n\r\n",
        status, length, content_range, accept_ranges
    );
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }

    match fault {
        Some(Fault::Truncate { after }) => {
            let _ = stream.write_all(&slice[..after.min(slice.len())]);
            let _ = stream.flush();
        }
        Some(Fault::Stall { after, pause }) => {
            let _ = stream.write_all(&slice[..after.min(slice.len())]);
            let _ = stream.flush();
            thread::sleep(pause);
        }
        Some(Fault::Garbled) | None => write_body(&mut stream, slice, opts.slow_body),
    }
}

fn write_body(stream: &mut TcpStream, slice: &[u8], slow: Option<(usize, Duration)>) {
    match slow {
        Some((piece, pause)) => {
            for part in slice.chunks(piece.max(1)) {
                if stream.write_all(part).is_err() || stream.flush().is_err() {
                    return;
                }
                thread::sleep(pause);
            }
        }
        None => {
            let _ = stream.write_all(slice);
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
        if data.len() > 64 * 1024 {
            return None;
        }
    }
    String::from_utf8(data).ok()
}

/// Returns (method, optional (start, end_inclusive) for Range: bytes=X-Y).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if !name.trim().eq_ignore_ascii_case("range") {
                continue;
            }
            let value = value.trim();
            if let Some(part) = value.strip_prefix("bytes=") {
                if let Some((a, b)) = part.split_once('-') {
                    let start = a.trim().parse::<u64>().unwrap_or(0);
                    let end = b.trim();
                    let end_incl = if end.is_empty() {
                        u64::MAX
                    } else {
                        end.parse::<u64>().unwrap_or(0)
                    };
                    range = Some((start, end_incl));
                }
            }
        }
    }
    (method, range)
}
