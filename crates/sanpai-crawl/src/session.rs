//! Crawl session state: which URLs are done, what was extracted, what failed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use sanpai_core::{CancelToken, ExtractedRecord, SourceLink};
use sanpai_extract::ExtractFailure;
use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

/// One completed batch or manual upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub record_count: usize,
    pub records: Vec<ExtractedRecord>,
}

impl HistoryEntry {
    /// Stamps `records` with the current time.
    #[must_use]
    pub fn new(label: impl Into<String>, records: Vec<ExtractedRecord>) -> Self {
        Self {
            timestamp: Utc::now(),
            label: label.into(),
            record_count: records.len(),
            records,
        }
    }
}

/// Why one source yielded nothing, with the filename it was saved under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub filename: String,
    #[serde(flatten)]
    pub failure: ExtractFailure,
}

/// Everything a crawl accumulates, passed by `&mut` to the loop and saved
/// between CLI invocations.
///
/// The processed set only grows; [`CrawlSession::reset`] is the one way to
/// clear it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlSession {
    #[serde(default)]
    processed: BTreeSet<String>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    /// Keyed by source: the link URL, or the local path of a manual upload.
    #[serde(default)]
    failures: BTreeMap<String, FailedFile>,
    #[serde(skip)]
    cancel: CancelToken,
}

impl CrawlSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a session from `path`, or starts a fresh one if the file does
    /// not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] if the file exists but cannot be read, or
    /// [`CrawlError::Json`] if it is not a valid session.
    pub fn load(path: &Path) -> Result<Self, CrawlError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no session file; starting fresh");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(CrawlError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| CrawlError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Writes the session as pretty JSON, creating parent directories.
    ///
    /// The file is written next to `path` and renamed into place so an
    /// interrupted save leaves the previous session intact.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] on any filesystem failure.
    pub fn save(&self, path: &Path) -> Result<(), CrawlError> {
        let io_err = |source| CrawlError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| CrawlError::Json {
            path: path.display().to_string(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)
    }

    /// Links whose URL has not been downloaded yet, in `links` order.
    #[must_use]
    pub fn pending<'a>(&self, links: &'a [SourceLink]) -> Vec<&'a SourceLink> {
        links
            .iter()
            .filter(|link| !self.processed.contains(&link.url))
            .collect()
    }

    #[must_use]
    pub fn is_processed(&self, url: &str) -> bool {
        self.processed.contains(url)
    }

    pub fn mark_processed(&mut self, url: &str) {
        self.processed.insert(url.to_owned());
    }

    #[must_use]
    pub fn processed(&self) -> &BTreeSet<String> {
        &self.processed
    }

    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Remembers why `source` (saved as `filename`) yielded nothing. A
    /// later successful extraction of the same source clears it via
    /// [`Self::clear_failure`]; other sources sharing the filename keep
    /// theirs.
    pub fn record_failure(&mut self, source: &str, filename: &str, failure: ExtractFailure) {
        self.failures.insert(
            source.to_owned(),
            FailedFile {
                filename: filename.to_owned(),
                failure,
            },
        );
    }

    pub fn clear_failure(&mut self, source: &str) {
        self.failures.remove(source);
    }

    #[must_use]
    pub fn failure(&self, source: &str) -> Option<&ExtractFailure> {
        self.failures.get(source).map(|f| &f.failure)
    }

    #[must_use]
    pub fn failures(&self) -> &BTreeMap<String, FailedFile> {
        &self.failures
    }

    /// Every record across all history entries, oldest first.
    pub fn all_records(&self) -> impl Iterator<Item = &ExtractedRecord> {
        self.history.iter().flat_map(|entry| entry.records.iter())
    }

    /// Shared cancellation flag for the crawl loop.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Clears processed URLs, history and failures, and lowers the
    /// cancellation flag.
    pub fn reset(&mut self) {
        self.processed.clear();
        self.history.clear();
        self.failures.clear();
        self.cancel.reset();
    }
}

#[cfg(test)]
mod tests {
    use sanpai_core::ReportField;
    use sanpai_extract::FailureKind;

    use super::*;

    fn link(name: &str) -> SourceLink {
        SourceLink::new(name, &format!("https://ex.test/{name}"))
    }

    #[test]
    fn pending_subtracts_processed_and_keeps_order() {
        let links = vec![link("06c.pdf"), link("06a.pdf"), link("06b.pdf")];
        let mut session = CrawlSession::new();
        session.mark_processed("https://ex.test/06a.pdf");

        let pending: Vec<&str> = session
            .pending(&links)
            .into_iter()
            .map(|l| l.filename.as_str())
            .collect();
        assert_eq!(pending, vec!["06c.pdf", "06b.pdf"]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = CrawlSession::new();
        session.mark_processed("https://ex.test/06a.pdf");
        session.push_history(HistoryEntry::new("手動", vec![ExtractedRecord::new()]));
        session.record_failure(
            "https://ex.test/06a.pdf",
            "06a.pdf",
            ExtractFailure {
                kind: FailureKind::Parse,
                reason: "bad".to_string(),
            },
        );
        session.cancel_token().cancel();

        session.reset();

        assert!(session.processed().is_empty());
        assert!(session.history().is_empty());
        assert!(session.failures().is_empty());
        assert!(!session.cancel_token().is_cancelled());
    }

    #[test]
    fn save_then_load_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut session = CrawlSession::new();
        session.mark_processed("https://ex.test/06a.pdf");
        session.push_history(HistoryEntry::new(
            "バッチ 1 (1 件)",
            vec![ExtractedRecord::new()
                .with(ReportField::FileName, "06a.pdf")
                .with(ReportField::TotalConsigned, 1.5)],
        ));
        session.record_failure(
            "https://ex.test/06b.pdf",
            "06b.pdf",
            ExtractFailure {
                kind: FailureKind::RemoteService,
                reason: "timeout".to_string(),
            },
        );
        session.save(&path).unwrap();

        let loaded = CrawlSession::load(&path).unwrap();
        assert_eq!(loaded.processed(), session.processed());
        assert_eq!(loaded.history(), session.history());
        assert_eq!(loaded.failures(), session.failures());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_file_loads_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let session = CrawlSession::load(&dir.path().join("absent.json")).unwrap();
        assert!(session.processed().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            CrawlSession::load(&path),
            Err(CrawlError::Json { .. })
        ));
    }

    #[test]
    fn failures_sharing_a_filename_are_tracked_per_source() {
        let mut session = CrawlSession::new();
        let failure = ExtractFailure {
            kind: FailureKind::Parse,
            reason: "bad".to_string(),
        };
        session.record_failure("https://ex.test/a/06.pdf", "06.pdf", failure.clone());
        session.record_failure("https://ex.test/b/06.pdf", "06.pdf", failure.clone());

        session.clear_failure("https://ex.test/b/06.pdf");

        assert_eq!(session.failure("https://ex.test/a/06.pdf"), Some(&failure));
        assert_eq!(session.failure("https://ex.test/b/06.pdf"), None);
        assert_eq!(session.failures()["https://ex.test/a/06.pdf"].filename, "06.pdf");
    }

    #[test]
    fn all_records_flattens_history() {
        let mut session = CrawlSession::new();
        let a = ExtractedRecord::new().with(ReportField::FileName, "a.pdf");
        let b = ExtractedRecord::new().with(ReportField::FileName, "b.pdf");
        session.push_history(HistoryEntry::new("1", vec![a.clone()]));
        session.push_history(HistoryEntry::new("2", vec![b.clone()]));

        let all: Vec<&ExtractedRecord> = session.all_records().collect();
        assert_eq!(all, vec![&a, &b]);
    }
}
