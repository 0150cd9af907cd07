pub mod config;
pub mod logging;

pub mod chunk;
pub mod control;
pub mod error;
pub mod events;
pub mod fetch_head;
pub mod package;
pub mod retry;
pub mod safe_resume;
mod scheduler;
pub mod service;
pub mod storage;
pub mod throttle;
pub mod url_model;

pub use config::DownloadConfiguration;
pub use control::CancelHandle;
pub use error::DownloadError;
pub use events::{CompletedEvent, DownloadEvent, DownloadListener, ProgressEvent, StartedEvent};
pub use package::Package;
pub use retry::RetryLimit;
pub use service::{DownloadOutcome, DownloadOutput, DownloadService};
pub use throttle::ThrottledStream;
