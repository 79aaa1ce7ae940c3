use std::borrow::Cow;
use std::fmt;

use crate::domain::WorkItem;

/// A malformed intake row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number in the intake text.
    pub line: usize,
    pub fields: usize,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {} has {} field(s), expected path<TAB>url; skipped",
            self.line, self.fields
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedIntake {
    pub items: Vec<WorkItem>,
    pub warnings: Vec<ParseWarning>,
}

/// Strip one surrounding pair of double quotes and undouble `""` inside it,
/// the way spreadsheet exports quote a cell. Unquoted fields pass through.
fn unquote_field(field: &str) -> Cow<'_, str> {
    match field
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => Cow::Owned(inner.replace("\"\"", "\"")),
        None => Cow::Borrowed(field),
    }
}

/// Inverse of the intake unquoting: fields holding a `"` are wrapped and doubled.
pub(crate) fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains('"') {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Parse tab separated intake text into work items.
///
/// The last two columns of a row are taken as path and url, so leading columns
/// such as spreadsheet row numbers are ignored. Rows with a single field produce
/// a warning. Quoted cells are unquoted. Rows whose path is empty or whose url
/// does not start with `http` are dropped without one.
pub fn parse_intake(text: &str) -> ParsedIntake {
    let mut parsed = ParsedIntake::default();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            let warning = ParseWarning {
                line: line_no,
                fields: fields.len(),
            };
            tracing::warn!(line = line_no, "malformed intake row skipped");
            parsed.warnings.push(warning);
            continue;
        }

        let path = unquote_field(fields[fields.len() - 2].trim());
        let url = unquote_field(fields[fields.len() - 1].trim());
        let (path, url) = (path.trim(), url.trim());
        if path.is_empty() || !url.starts_with("http") {
            tracing::debug!(line = line_no, "intake row without usable path/url dropped");
            continue;
        }

        parsed.items.push(WorkItem {
            index: parsed.items.len() + 1,
            requested_path: path.to_string(),
            source_url: url.to_string(),
        });
    }

    parsed
}
