//! Parse HTTP response header lines into HeadResult.

use super::HeadResult;

/// Status code of an `HTTP/x.y NNN reason` line.
pub(crate) fn status_code(line: &str) -> Option<u32> {
    let line = line.trim();
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Complete length from a `Content-Range` value such as `bytes 0-0/1234`.
fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Parse collected header lines. With redirects curl reports one header block
/// per response; a status line starts a new block, so only the last one counts.
pub(crate) fn parse_headers(lines: &[String]) -> HeadResult {
    let mut out = HeadResult::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(code) = status_code(line) {
            out = HeadResult {
                status: code,
                ..HeadResult::default()
            };
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            out.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            out.accept_ranges = value.eq_ignore_ascii_case("bytes");
        } else if name.eq_ignore_ascii_case("content-range") {
            out.content_range_total = content_range_total(value);
        } else if name.eq_ignore_ascii_case("etag") {
            out.etag = Some(value.trim_matches('"').to_string());
        } else if name.eq_ignore_ascii_case("last-modified") {
            out.last_modified = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-disposition") {
            out.content_disposition = Some(value.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn content_length_and_ranges() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 200 OK",
            "Content-Length: 12345",
            "Accept-Ranges: bytes",
        ]));
        assert_eq!(r.status, 200);
        assert_eq!(r.content_length, Some(12345));
        assert!(r.accept_ranges);
        assert!(r.etag.is_none());
    }

    #[test]
    fn partial_content_total() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 206 Partial Content",
            "Content-Length: 1",
            "Content-Range: bytes 0-0/153600",
        ]));
        assert_eq!(r.status, 206);
        assert_eq!(r.content_length, Some(1));
        assert_eq!(r.content_range_total, Some(153600));
    }

    #[test]
    fn unknown_total_in_content_range() {
        let r = parse_headers(&lines(&["HTTP/1.1 206 Partial Content", "Content-Range: bytes 0-0/*"]));
        assert_eq!(r.content_range_total, None);
    }

    #[test]
    fn etag_and_last_modified() {
        let r = parse_headers(&lines(&[
            "ETag: \"abc-123\"",
            "Last-Modified: Wed, 21 Oct 2015 07:28:00 GMT",
        ]));
        assert_eq!(r.etag.as_deref(), Some("abc-123"));
        assert_eq!(
            r.last_modified.as_deref(),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn no_ranges() {
        let r = parse_headers(&lines(&["Content-Length: 999", "Accept-Ranges: none"]));
        assert_eq!(r.content_length, Some(999));
        assert!(!r.accept_ranges);
    }

    #[test]
    fn last_block_wins_after_redirect() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 302 Found",
            "Location: /elsewhere",
            "Content-Length: 0",
            "",
            "HTTP/1.1 200 OK",
            "Content-Length: 64",
        ]));
        assert_eq!(r.status, 200);
        assert_eq!(r.content_length, Some(64));
    }

    #[test]
    fn status_line_parsing() {
        assert_eq!(status_code("HTTP/1.1 206 Partial Content\r\n"), Some(206));
        assert_eq!(status_code("HTTP/2 200"), Some(200));
        assert_eq!(status_code("Content-Length: 5"), None);
    }
}
