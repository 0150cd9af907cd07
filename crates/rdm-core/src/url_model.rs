//! Output file names for downloads saved into a directory.

const DEFAULT_FILENAME: &str = "download.bin";
const NAME_MAX: usize = 255;

/// Pick a safe file name for `url`.
///
/// A `Content-Disposition` filename wins over the last URL path segment;
/// with neither, or if sanitizing leaves nothing usable, `download.bin`.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    let raw = content_disposition
        .and_then(content_disposition_filename)
        .or_else(|| filename_from_url_path(url));
    match raw.map(|name| sanitize(&name)) {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name,
        _ => DEFAULT_FILENAME.to_string(),
    }
}

/// Last non-empty path segment of `url`, percent-decoded.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(percent_decode(segment))
}

/// `filename*=UTF-8''...` (preferred) or `filename=...` from a header value.
pub fn content_disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';') {
        let Some((name, v)) = param.split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let v = v.trim();
        if name == "filename*" {
            let lower = v.to_ascii_lowercase();
            if lower.starts_with("utf-8''") {
                let decoded = percent_decode(&v["utf-8''".len()..]);
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        } else if name == "filename" {
            let v = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .map(|s| s.replace("\\\"", "\"").replace("\\\\", "\\"))
                .unwrap_or_else(|| v.to_string());
            if !v.is_empty() {
                plain = Some(v);
            }
        }
    }
    plain
}

/// Replace separators, control characters and whitespace with `_` (collapsed),
/// strip leading/trailing dots and underscores, cap at 255 bytes.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let bad = c == '/' || c == '\\' || c.is_control() || c.is_whitespace();
        if bad {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }
    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
