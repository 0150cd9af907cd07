//! Classify HTTP status and curl errors into retry policy error kinds.

use super::error::TransferError;
use super::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
///
/// Transport failures are opaque: anything curl reports is transient.
/// Timeouts are told apart only for logging.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        ErrorKind::Timeout
    } else {
        ErrorKind::Connection
    }
}

/// Classify a transfer error into an `ErrorKind`.
///
/// Storage failures and ignored ranges are `Other`: the first is fatal, the
/// second is handled by the service as a capability downgrade.
pub fn classify(e: &TransferError) -> ErrorKind {
    match e {
        TransferError::Curl(ce) => classify_curl_error(ce),
        TransferError::Http(code) => classify_http_status(*code),
        TransferError::PartialTransfer { .. } => ErrorKind::Connection,
        TransferError::ReadTimeout(_) => ErrorKind::Timeout,
        TransferError::RangeIgnored | TransferError::Storage(_) => ErrorKind::Other,
    }
}
