pub mod error;
pub mod model;

pub use error::{AppError, RunError};
pub use model::{AggregateStats, DownloadResult, FailedLink, RunReport, WorkItem};
