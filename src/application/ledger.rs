use std::path::{Path, PathBuf};

use super::intake::quote_field;
use crate::domain::{AppError, FailedLink};

pub const LEDGER_FILE_NAME: &str = "failed_links.tsv";

/// Render failures as `path<TAB>url` rows, the same shape the intake parser reads.
/// Fields containing `"` are quoted so they read back unchanged.
pub fn render_ledger(failures: &[FailedLink]) -> String {
    failures
        .iter()
        .map(|failed| {
            format!(
                "{}\t{}\n",
                quote_field(&failed.requested_path),
                quote_field(&failed.source_url)
            )
        })
        .collect()
}

/// Write `failed_links.tsv` under `root`, replacing any previous ledger.
///
/// Returns `Ok(None)` without touching the disk when there is nothing to record.
pub async fn write_failed_links(
    failures: &[FailedLink],
    root: &Path,
) -> Result<Option<PathBuf>, AppError> {
    if failures.is_empty() {
        return Ok(None);
    }

    let path = root.join(LEDGER_FILE_NAME);
    tokio::fs::write(&path, render_ledger(failures))
        .await
        .map_err(|e| AppError::LedgerWrite(format!("{}: {e}", path.display())))?;

    tracing::info!(path = %path.display(), rows = failures.len(), "failure ledger written");
    Ok(Some(path))
}
