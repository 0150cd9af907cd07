//! Compares a persisted package with a fresh probe.

use crate::fetch_head::Resolution;
use crate::package::Package;
use std::fmt;

/// The remote resource no longer matches what a package was downloaded from.
#[derive(Debug)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
}

#[derive(Debug)]
pub enum ValidationErrorKind {
    RemoteChanged {
        size_changed: bool,
        range_support_changed: bool,
        etag_changed: bool,
        last_modified_changed: bool,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValidationErrorKind::RemoteChanged {
                size_changed,
                range_support_changed,
                etag_changed,
                last_modified_changed,
            } => {
                let what: Vec<&str> = [
                    (*size_changed, "size"),
                    (*range_support_changed, "range support"),
                    (*etag_changed, "ETag"),
                    (*last_modified_changed, "Last-Modified"),
                ]
                .into_iter()
                .filter_map(|(changed, name)| changed.then_some(name))
                .collect();
                write!(f, "remote resource changed ({})", what.join(", "))
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Returns Ok(()) if `package` can continue against `current`.
///
/// Size and range support must match exactly. ETag and Last-Modified are
/// only compared when both sides have one, since many servers send them
/// inconsistently between HEAD and ranged GET.
pub fn validate_for_resume(package: &Package, current: &Resolution) -> Result<(), ValidationError> {
    let size_changed = match (package.total_size, current.total_size) {
        // An open-ended chunk that was never settled: size was unknown at start.
        (_, _) if package.chunks.iter().any(|c| c.end.is_none()) => false,
        (a, b) => a != b,
    };
    let range_support_changed = package.supports_range
        != (current.supports_range && current.total_size.is_some());
    let differs = |a: &Option<String>, b: &Option<String>| matches!((a, b), (Some(a), Some(b)) if a != b);
    let etag_changed = differs(&package.etag, &current.etag);
    let last_modified_changed = differs(&package.last_modified, &current.last_modified);

    if size_changed || range_support_changed || etag_changed || last_modified_changed {
        return Err(ValidationError {
            kind: ValidationErrorKind::RemoteChanged {
                size_changed,
                range_support_changed,
                etag_changed,
                last_modified_changed,
            },
        });
    }
    Ok(())
}
