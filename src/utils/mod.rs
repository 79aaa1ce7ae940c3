use std::fmt;
use std::path::{Path, PathBuf};

/// Name used when nothing usable survives sanitization.
pub const FALLBACK_FILE_NAME: &str = "default_file";

/// Current local wall-clock time for log lines, e.g. `14:03:59`
pub fn log_timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// A relative path that is safe to create below a destination root.
///
/// Holds its segments so the canonical `/`-joined form stays stable no matter
/// which platform separator `to_path` produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedPath {
    segments: Vec<String>,
}

impl SanitizedPath {
    pub fn as_string(&self) -> String {
        self.segments.join("/")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Platform path relative to the destination root.
    pub fn to_path(&self) -> PathBuf {
        self.segments.iter().collect()
    }

    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(self.to_path())
    }
}

impl fmt::Display for SanitizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

fn replace_illegal(c: char) -> char {
    match c {
        ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\\' | '[' | ']' => '_',
        c if c.is_control() && !c.is_whitespace() => '_',
        _ => c,
    }
}

/// Sanitize a user supplied path into a relative, filesystem-safe path.
///
/// Illegal characters become `_`, `/` separates segments, segments are trimmed
/// and empty, `.` and `..` segments are dropped. Never fails and never returns an
/// empty path.
pub fn sanitize_path(raw: &str) -> SanitizedPath {
    let replaced: String = raw.chars().map(replace_illegal).collect();

    let segments: Vec<String> = replaced
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(str::to_string)
        .collect();

    if segments.is_empty() {
        return SanitizedPath {
            segments: vec![FALLBACK_FILE_NAME.to_string()],
        };
    }

    SanitizedPath { segments }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ILLEGAL: [char; 10] = [':', '*', '?', '"', '<', '>', '|', '\\', '[', ']'];

    #[test]
    fn test_log_timestamp() {
        let ts = log_timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.matches(':').count(), 2);
    }

    #[test]
    fn test_replaces_illegal_characters() {
        assert_eq!(sanitize_path("A:B*C").as_string(), "A_B_C");
        assert_eq!(sanitize_path("x?\"<>|y").as_string(), "x_____y");
        assert_eq!(sanitize_path("[draft] notes").as_string(), "_draft_ notes");
    }

    #[test]
    fn test_backslash_is_replaced_not_split() {
        assert_eq!(sanitize_path("a\\b/c").as_string(), "a_b/c");
    }

    #[test]
    fn test_trims_and_drops_empty_segments() {
        let path = sanitize_path(" /Reports//  Q1 / summary.pdf ");
        assert_eq!(path.segments(), ["Reports", "Q1", "summary.pdf"]);
    }

    #[test]
    fn test_drops_traversal_segments() {
        assert_eq!(sanitize_path("../../etc/passwd").as_string(), "etc/passwd");
        assert_eq!(sanitize_path("a/./b/..").as_string(), "a/b");
    }

    #[test]
    fn test_fallback_name() {
        assert_eq!(sanitize_path("").as_string(), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_path(" / // ").as_string(), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_path("..").as_string(), FALLBACK_FILE_NAME);
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(sanitize_path("file\u{0}name").as_string(), "file_name");
    }

    #[test]
    fn test_idempotent_and_clean() {
        let inputs = [
            "A:B*C",
            "Reports/Q1",
            " a / b \\ c ",
            "..\\..\\x",
            "[1] <draft>?.docx",
            "////",
            "dir/ . /file",
            "Tài liệu/Chương 1: Giới thiệu.pdf",
        ];
        for input in inputs {
            let once = sanitize_path(input);
            let twice = sanitize_path(&once.as_string());
            assert_eq!(once, twice, "not idempotent for {input:?}");

            let rendered = once.as_string();
            assert!(!rendered.is_empty());
            assert!(!rendered.contains(&ILLEGAL[..]), "illegal char left in {rendered:?}");
        }
    }

    #[test]
    fn test_joins_below_root() {
        let root = Path::new("/tmp/out");
        let path = sanitize_path("Reports/Q1");
        assert_eq!(path.under(root), root.join("Reports").join("Q1"));
    }
}
