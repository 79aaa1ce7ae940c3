use std::path::PathBuf;

use serde::Serialize;

use super::AppError;

/// One (path, url) row of the intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    /// 1-based position in the parsed intake.
    pub index: usize,
    pub requested_path: String,
    pub source_url: String,
}

#[derive(Debug, Clone)]
pub enum DownloadResult {
    Success {
        item: WorkItem,
        path: PathBuf,
        bytes: u64,
    },
    Failure {
        item: WorkItem,
        error: AppError,
    },
}

impl DownloadResult {
    pub fn item(&self) -> &WorkItem {
        match self {
            DownloadResult::Success { item, .. } | DownloadResult::Failure { item, .. } => item,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DownloadResult::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl AggregateStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    /// Fraction of items attempted, in [0.0, 1.0].
    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.finished() as f32 / self.total as f32).min(1.0)
    }

    pub(crate) fn record(&mut self, result: &DownloadResult) {
        if result.is_success() {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// A failed item as it is written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedLink {
    pub requested_path: String,
    pub source_url: String,
    pub reason: String,
}

/// Final outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stats: AggregateStats,
    pub failures: Vec<FailedLink>,
    /// Where the ledger was written, if there were failures and the write succeeded.
    pub ledger_path: Option<PathBuf>,
    pub ledger_error: Option<String>,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> WorkItem {
        WorkItem {
            index: 1,
            requested_path: "a".to_string(),
            source_url: "http://example.com/a".to_string(),
        }
    }

    #[test]
    fn progress_counts_failures_too() {
        let mut stats = AggregateStats::new(4);
        stats.record(&DownloadResult::Success {
            item: item(),
            path: PathBuf::from("a"),
            bytes: 1,
        });
        stats.record(&DownloadResult::Failure {
            item: item(),
            error: AppError::LinkNotFound,
        });
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert!((stats.progress() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_run_is_complete() {
        assert_eq!(AggregateStats::new(0).progress(), 1.0);
    }
}
