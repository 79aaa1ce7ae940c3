//! Batch downloader that turns `path<TAB>url` intake rows into files on disk,
//! asking a link-resolution service for the direct download link of each url.

pub mod api;
pub mod application;
pub mod domain;
pub mod logging;
pub mod utils;

pub use api::{ApiClient, ApiConfig};
pub use application::{parse_intake, DownloadOrchestrator, RunEvent, RunHandle};
pub use domain::{AggregateStats, AppError, DownloadResult, RunError, RunReport, WorkItem};
pub use utils::{sanitize_path, SanitizedPath};
