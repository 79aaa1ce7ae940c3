use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{stream, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    fetcher::fetch_to_file,
    intake::{parse_intake, ParsedIntake},
    ledger::{write_failed_links, LEDGER_FILE_NAME},
    run_state::{RunState, DEFAULT_LOG_HISTORY},
};
use crate::{
    api::{ApiClient, ApiError},
    domain::{AggregateStats, AppError, DownloadResult, FailedLink, RunError, RunReport, WorkItem},
    utils::sanitize_path,
};

const SEPARATOR: &str = "--------------------------------------------------";

#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A line that was appended to the run log.
    Log(String),
    /// Sent once per work item, after the stats were updated.
    ItemFinished {
        /// Intake position of the finished item.
        index: usize,
        result: DownloadResult,
        stats: AggregateStats,
    },
}

#[derive(Clone)]
pub struct DownloadOrchestrator {
    api_client: ApiClient,
    log_history: usize,
    events: Option<UnboundedSender<RunEvent>>,
}

impl DownloadOrchestrator {
    pub fn new(api_client: ApiClient) -> Self {
        Self {
            api_client,
            log_history: DEFAULT_LOG_HISTORY,
            events: None,
        }
    }

    /// Number of log lines a [`RunHandle`] keeps.
    pub fn with_log_history(mut self, lines: usize) -> Self {
        self.log_history = lines;
        self
    }

    /// Also push every log line and finished item to `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Parse `intake_text` and download it below `destination_root` on a
    /// background task. Must be called from within a tokio runtime.
    pub fn start_run(
        &self,
        intake_text: &str,
        destination_root: impl Into<PathBuf>,
        concurrency: usize,
    ) -> RunHandle {
        let state = Arc::new(RunState::new(self.log_history, self.events.clone()));
        let token = CancellationToken::new();
        let parsed = parse_intake(intake_text);
        let root = destination_root.into();
        state.begin(parsed.items.len());

        let task = tokio::spawn({
            let api = self.api_client.clone();
            let state = Arc::clone(&state);
            let token = token.clone();
            async move { execute(&api, &state, parsed, &root, concurrency, &token).await }
        });

        RunHandle { state, token, task }
    }

    /// Download already parsed items and wait for the report.
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        destination_root: &Path,
        concurrency: usize,
    ) -> Result<RunReport, RunError> {
        let state = Arc::new(RunState::new(self.log_history, self.events.clone()));
        state.begin(items.len());
        let parsed = ParsedIntake {
            items,
            warnings: Vec::new(),
        };
        execute(
            &self.api_client,
            &state,
            parsed,
            destination_root,
            concurrency,
            &CancellationToken::new(),
        )
        .await
    }
}

/// Caller side of a run started with [`DownloadOrchestrator::start_run`].
pub struct RunHandle {
    state: Arc<RunState>,
    token: CancellationToken,
    task: JoinHandle<Result<RunReport, RunError>>,
}

impl RunHandle {
    pub fn progress(&self) -> AggregateStats {
        self.state.stats()
    }

    pub fn log(&self) -> Vec<String> {
        self.state.log_lines()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Stop dispatching new items. Items already in flight run to the end;
    /// the rest are reported as cancelled failures.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token behind [`RunHandle::cancel`], for callers that give up the handle to `wait`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn wait(self) -> Result<RunReport, RunError> {
        self.task.await?
    }
}

/// Marks the run finished when dropped, also when the run task unwinds.
struct FinishOnDrop<'a>(&'a RunState);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

async fn execute(
    api: &ApiClient,
    state: &Arc<RunState>,
    parsed: ParsedIntake,
    root: &Path,
    concurrency: usize,
    token: &CancellationToken,
) -> Result<RunReport, RunError> {
    let _finish = FinishOnDrop(state);
    let result = run_batch(api, state, parsed, root, concurrency, token).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "run aborted before dispatch");
        state.log(format!("error: {e}"));
    }
    result
}

async fn run_batch(
    api: &ApiClient,
    state: &Arc<RunState>,
    parsed: ParsedIntake,
    root: &Path,
    concurrency: usize,
    token: &CancellationToken,
) -> Result<RunReport, RunError> {
    for warning in &parsed.warnings {
        state.log(format!("warning: {warning}"));
    }

    let items = parsed.items;
    if items.is_empty() {
        return Err(RunError::EmptyIntake);
    }

    tokio::fs::create_dir_all(root)
        .await
        .map_err(|source| RunError::Destination {
            path: root.display().to_string(),
            source,
        })?;

    let total = items.len();
    let concurrency = concurrency.max(1);
    state.begin(total);
    state.log(format!("found {total} link(s)"));
    state.log(format!("using {concurrency} worker(s)"));
    state.log(SEPARATOR);
    tracing::info!(total, concurrency, root = %root.display(), "run started");

    let mut results = stream::iter(items)
        .map(|item| {
            let api = api.clone();
            let state = Arc::clone(state);
            let root = root.to_path_buf();
            let token = token.clone();
            async move {
                if token.is_cancelled() {
                    return DownloadResult::Failure {
                        item,
                        error: AppError::Cancelled,
                    };
                }
                process_item(&api, &state, &root, item).await
            }
        })
        .buffer_unordered(concurrency);

    let mut failures = Vec::new();
    let mut cancelled = false;
    while let Some(result) = results.next().await {
        let stats = state.record(&result);
        if let DownloadResult::Failure { item, error } = &result {
            cancelled |= *error == AppError::Cancelled;
            failures.push(FailedLink {
                requested_path: item.requested_path.clone(),
                source_url: item.source_url.clone(),
                reason: error.to_string(),
            });
        }
        state.log(format!("progress: {}/{}", stats.finished(), stats.total));
        let index = result.item().index;
        state.emit(RunEvent::ItemFinished {
            index,
            result,
            stats,
        });
    }

    let stats = state.stats();
    state.log(SEPARATOR);
    if cancelled {
        state.log("run cancelled; undispatched items were recorded as failed");
    }
    state.log(format!("completed: {}/{}", stats.completed, stats.total));

    let mut ledger_path = None;
    let mut ledger_error = None;
    if failures.is_empty() {
        state.log("all files downloaded");
    } else {
        state.log(format!("failed: {}", failures.len()));
        match write_failed_links(&failures, root).await {
            Ok(path) => {
                state.log(format!(
                    "wrote {} failed link(s) to {LEDGER_FILE_NAME}",
                    failures.len()
                ));
                ledger_path = path;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failure ledger not written");
                state.log(format!("error: {e}"));
                ledger_error = Some(e.to_string());
            }
        }
    }

    tracing::info!(
        completed = stats.completed,
        failed = stats.failed,
        cancelled,
        "run finished"
    );

    Ok(RunReport {
        stats,
        failures,
        ledger_path,
        ledger_error,
        cancelled,
    })
}

async fn process_item(
    api: &ApiClient,
    state: &RunState,
    root: &Path,
    item: WorkItem,
) -> DownloadResult {
    let sanitized = sanitize_path(&item.requested_path);
    if sanitized.as_string() != item.requested_path {
        state.log(format!(
            "path adjusted: \"{}\" -> \"{sanitized}\"",
            item.requested_path
        ));
    }
    state.log(format!("processing: {}", item.requested_path));

    let destination = sanitized.under(root);
    match download_item(api, state, &item, &destination).await {
        Ok(bytes) => {
            state.log(format!("completed: {}", item.requested_path));
            DownloadResult::Success {
                item,
                path: destination,
                bytes,
            }
        }
        Err(error) => {
            tracing::warn!(
                index = item.index,
                url = %item.source_url,
                error = %error,
                "item failed"
            );
            state.log(format!("error: {} - {error}", item.requested_path));
            DownloadResult::Failure { item, error }
        }
    }
}

async fn download_item(
    api: &ApiClient,
    state: &RunState,
    item: &WorkItem,
    destination: &Path,
) -> Result<u64, AppError> {
    let session = api.session().map_err(ApiError::into_resolution)?;

    let resolved = session
        .resolve(&item.source_url)
        .await
        .map_err(ApiError::into_resolution)?;
    tracing::debug!(index = item.index, resolved = %resolved, "link resolved");
    state.log(format!("resolved: {}", item.requested_path));

    state.log(format!("downloading: {}", item.requested_path));
    fetch_to_file(&session, &resolved, destination).await
}
