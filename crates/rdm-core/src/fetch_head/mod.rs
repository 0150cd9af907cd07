//! Remote size and range-support discovery.
//!
//! Uses libcurl for a HEAD request first; when HEAD is refused or does not
//! tell us both the size and `Accept-Ranges: bytes`, falls back to a
//! `Range: bytes=0-0` GET and reads the answer from the status line and
//! `Content-Range`.

mod parse;

pub(crate) use parse::status_code;

use std::cell::Cell;
use std::str;
use std::time::Duration;

use crate::retry::TransferError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers of a probe response that matter for planning and resume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Final HTTP status (after redirects).
    pub status: u32,
    /// `Content-Length`, if present.
    pub content_length: Option<u64>,
    /// True if the server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// Complete length from `Content-Range: bytes a-b/N`, if present.
    pub content_range_total: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// `Content-Disposition`, used as a filename hint.
    pub content_disposition: Option<String>,
}

/// What the engine needs to know before planning chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Total size, if the server reports it.
    pub total_size: Option<u64>,
    /// True only when ranged requests are confirmed and the size is known.
    pub supports_range: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_disposition: Option<String>,
}

/// Performs a HEAD request and returns parsed metadata. Follows redirects.
pub fn probe(url: &str) -> Result<HeadResult, TransferError> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.timeout(PROBE_TIMEOUT)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            collect_header(&mut lines, data);
            true
        })?;
        transfer.perform()?;
    }

    let head = parse::parse_headers(&lines);
    if !(200..300).contains(&head.status) {
        return Err(TransferError::Http(head.status));
    }
    Ok(head)
}

/// Performs `GET` with `Range: bytes=0-0` and stops at the first body byte.
///
/// A server that honours ranges answers `206` with `Content-Range`; one that
/// does not answers `200` and would start sending the whole body, which is
/// why the transfer is cut as soon as data arrives.
pub fn probe_range(url: &str) -> Result<HeadResult, TransferError> {
    let mut lines: Vec<String> = Vec::new();
    let cut = Cell::new(false);

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.timeout(PROBE_TIMEOUT)?;
    easy.range("0-0")?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            collect_header(&mut lines, data);
            true
        })?;
        transfer.write_function(|_| {
            cut.set(true);
            Ok(0)
        })?;
        transfer.perform()
    };
    match performed {
        Ok(()) => {}
        Err(e) if cut.get() && e.is_write_error() => {}
        Err(e) => return Err(e.into()),
    }

    let head = parse::parse_headers(&lines);
    if !(200..300).contains(&head.status) {
        return Err(TransferError::Http(head.status));
    }
    Ok(head)
}

/// Discover `(total_size, supports_range)` for `url`.
///
/// Fails only when neither probe gets a usable answer; that is a
/// download-start failure.
pub fn resolve(url: &str) -> Result<Resolution, TransferError> {
    let head = match probe(url) {
        Ok(head) if head.accept_ranges && head.content_length.is_some() => {
            tracing::debug!(url, size = ?head.content_length, "HEAD confirms range support");
            return Ok(Resolution {
                total_size: head.content_length,
                supports_range: true,
                etag: head.etag,
                last_modified: head.last_modified,
                content_disposition: head.content_disposition,
            });
        }
        Ok(head) => {
            tracing::debug!(url, "HEAD inconclusive, probing with a ranged GET");
            Some(head)
        }
        Err(e) => {
            tracing::debug!(url, error = %e, "HEAD failed, probing with a ranged GET");
            None
        }
    };

    let ranged = probe_range(url)?;
    let supports_range = ranged.status == 206 && ranged.content_range_total.is_some();
    let total_size = if supports_range {
        ranged.content_range_total
    } else {
        // A 200 answer carries the full length; otherwise trust HEAD.
        ranged
            .content_length
            .filter(|_| ranged.status == 200)
            .or_else(|| head.as_ref().and_then(|h| h.content_length))
    };
    let pick = |get: fn(&HeadResult) -> &Option<String>| {
        get(&ranged)
            .clone()
            .or_else(|| head.as_ref().and_then(|h| get(h).clone()))
    };

    let resolution = Resolution {
        total_size,
        supports_range,
        etag: pick(|h| &h.etag),
        last_modified: pick(|h| &h.last_modified),
        content_disposition: pick(|h| &h.content_disposition),
    };
    tracing::debug!(url, size = ?resolution.total_size, supports_range, "resolved via ranged GET");
    Ok(resolution)
}

fn collect_header(lines: &mut Vec<String>, data: &[u8]) {
    if let Ok(s) = str::from_utf8(data) {
        lines.push(s.trim_end().to_string());
    }
}
