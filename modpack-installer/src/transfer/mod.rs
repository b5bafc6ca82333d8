//! File transfer: retry policy, HTTP downloader and progress accounting.

pub mod downloader;
pub mod progress;
pub mod progress_stream;
pub mod retry;

pub use downloader::{build_client, normalize_url, Downloader, FetchReport};
pub use progress::{format_bytes, format_duration, format_speed, ProgressTracker, RunProgress};
pub use progress_stream::{ByteCallback, ProgressStream};
pub use retry::{AttemptOutcome, RetryError, RetryPolicy};
