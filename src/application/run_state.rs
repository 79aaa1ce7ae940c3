use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::UnboundedSender;

use super::orchestrator::RunEvent;
use crate::domain::{AggregateStats, DownloadResult};
use crate::utils::log_timestamp;

/// Number of log lines kept when nothing else is configured.
pub const DEFAULT_LOG_HISTORY: usize = 50;

#[derive(Debug, Default)]
struct Inner {
    stats: AggregateStats,
    log: VecDeque<String>,
}

/// Progress and log of one run.
///
/// Stats are only changed by the aggregating loop through [`RunState::record`];
/// any worker may append log lines. Callers read snapshots.
#[derive(Debug)]
pub struct RunState {
    inner: Mutex<Inner>,
    running: AtomicBool,
    log_history: usize,
    events: Option<UnboundedSender<RunEvent>>,
}

impl RunState {
    pub fn new(log_history: usize, events: Option<UnboundedSender<RunEvent>>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            running: AtomicBool::new(true),
            log_history: log_history.max(1),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> AggregateStats {
        self.lock().stats
    }

    /// Most recent log lines, oldest first.
    pub fn log_lines(&self) -> Vec<String> {
        self.lock().log.iter().cloned().collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Append a timestamped line, dropping the oldest once the history is full.
    pub fn log(&self, message: impl AsRef<str>) {
        let line = format!("[{}] {}", log_timestamp(), message.as_ref());
        {
            let mut inner = self.lock();
            if inner.log.len() == self.log_history {
                inner.log.pop_front();
            }
            inner.log.push_back(line.clone());
        }
        self.emit(RunEvent::Log(line));
    }

    pub(crate) fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            // A caller that stopped listening does not affect the run.
            let _ = tx.send(event);
        }
    }

    pub(crate) fn begin(&self, total: usize) {
        self.lock().stats = AggregateStats::new(total);
    }

    pub(crate) fn record(&self, result: &DownloadResult) -> AggregateStats {
        let mut inner = self.lock();
        inner.stats.record(result);
        inner.stats
    }

    pub(crate) fn finish(&self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppError, WorkItem};

    #[test]
    fn test_log_history_is_bounded() {
        let state = RunState::new(3, None);
        for i in 0..5 {
            state.log(format!("line {i}"));
        }
        let lines = state.log_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("line 2"));
        assert!(lines[2].ends_with("line 4"));
        assert!(lines[0].starts_with('['));
    }

    #[test]
    fn test_log_lines_are_sent_as_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let state = RunState::new(DEFAULT_LOG_HISTORY, Some(tx));
        state.log("hello");
        match rx.try_recv().unwrap() {
            RunEvent::Log(line) => assert!(line.ends_with("] hello")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_record_updates_snapshot() {
        let state = RunState::new(DEFAULT_LOG_HISTORY, None);
        state.begin(2);
        let stats = state.record(&DownloadResult::Failure {
            item: WorkItem {
                index: 1,
                requested_path: "a".to_string(),
                source_url: "http://example.com/a".to_string(),
            },
            error: AppError::LinkNotFound,
        });
        assert_eq!(stats.failed, 1);
        assert_eq!(state.stats(), stats);
        assert!(state.is_running());
        state.finish();
        assert!(!state.is_running());
    }
}
