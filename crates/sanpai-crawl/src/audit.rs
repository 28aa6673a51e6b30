//! Coverage audit: which discovered files actually produced records.

use std::collections::{BTreeMap, HashMap, HashSet};

use sanpai_core::SourceLink;
use sanpai_extract::ExtractFailure;

use crate::session::CrawlSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStatus {
    /// At least one record carries this filename.
    Matched(usize),
    /// Downloaded and read, with no records in it.
    NoRecords,
    /// Downloaded, but extraction failed.
    Failed(ExtractFailure),
    /// Not downloaded yet.
    Pending,
}

impl AuditStatus {
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self, AuditStatus::Matched(_))
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        match self {
            AuditStatus::Matched(count) => *count,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub filename: String,
    pub status: AuditStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub matched: usize,
    pub unmatched: usize,
    /// Unmatched entries first, then by filename.
    pub entries: Vec<AuditEntry>,
}

impl AuditReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.len()
    }
}

/// Classifies every distinct discovered filename against the records
/// accumulated in `session`.
///
/// A filename matches when any record's file-name field equals it.
/// Failures are stored per source and folded to the filename here: a
/// failure on any of the filename's URLs counts, and a failure recorded
/// under a source outside `discovered` (a manual upload) counts when none
/// of its URLs has one. `matched + unmatched` always equals the number of
/// distinct filenames.
#[must_use]
pub fn reconcile(discovered: &[SourceLink], session: &CrawlSession) -> AuditReport {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for filename in session.all_records().filter_map(|r| r.filename()) {
        *counts.entry(filename).or_default() += 1;
    }

    let mut files: BTreeMap<&str, FileState<'_>> = BTreeMap::new();
    for link in discovered {
        let state = files.entry(link.filename.as_str()).or_default();
        state.downloaded |= session.is_processed(&link.url);
        if state.failure.is_none() {
            state.failure = session.failure(&link.url);
        }
    }

    let urls: HashSet<&str> = discovered.iter().map(|l| l.url.as_str()).collect();
    let mut elsewhere: HashMap<&str, &ExtractFailure> = HashMap::new();
    for (source, failed) in session.failures() {
        if !urls.contains(source.as_str()) {
            elsewhere.entry(failed.filename.as_str()).or_insert(&failed.failure);
        }
    }

    let mut entries: Vec<AuditEntry> = files
        .into_iter()
        .map(|(filename, state)| {
            let failure = state.failure.or_else(|| elsewhere.get(filename).copied());
            let status = match counts.get(filename) {
                Some(&count) if count > 0 => AuditStatus::Matched(count),
                _ => match failure {
                    Some(failure) => AuditStatus::Failed(failure.clone()),
                    None if state.downloaded => AuditStatus::NoRecords,
                    None => AuditStatus::Pending,
                },
            };
            AuditEntry {
                filename: filename.to_owned(),
                status,
            }
        })
        .collect();

    // BTreeMap iteration already ordered by filename; the sort is stable.
    entries.sort_by_key(|e| e.status.is_matched());

    let matched = entries.iter().filter(|e| e.status.is_matched()).count();
    AuditReport {
        matched,
        unmatched: entries.len() - matched,
        entries,
    }
}

#[derive(Default)]
struct FileState<'a> {
    downloaded: bool,
    failure: Option<&'a ExtractFailure>,
}

#[cfg(test)]
mod tests {
    use sanpai_core::{ExtractedRecord, ReportField};
    use sanpai_extract::FailureKind;

    use super::*;
    use crate::session::HistoryEntry;

    fn link(name: &str) -> SourceLink {
        SourceLink::new(name, format!("https://ex.test/{name}"))
    }

    fn rec(filename: &str) -> ExtractedRecord {
        ExtractedRecord::new().with(ReportField::FileName, filename)
    }

    #[test]
    fn classifies_and_sorts_unmatched_first() {
        let discovered = vec![
            link("06a.pdf"),
            link("06b.pdf"),
            link("06c.xlsx"),
            link("06d.pdf"),
        ];
        let mut session = CrawlSession::new();
        for l in &discovered[..3] {
            session.mark_processed(&l.url);
        }
        session.push_history(HistoryEntry::new(
            "1",
            vec![rec("06a.pdf"), rec("06a.pdf"), rec("unrelated.pdf")],
        ));
        let failure = ExtractFailure {
            kind: FailureKind::RemoteService,
            reason: "poll exhausted".to_string(),
        };
        session.record_failure(&discovered[1].url, "06b.pdf", failure.clone());

        let report = reconcile(&discovered, &session);

        assert_eq!(report.matched, 1);
        assert_eq!(report.unmatched, 3);
        assert_eq!(report.total(), 4);
        let statuses: Vec<(&str, &AuditStatus)> = report
            .entries
            .iter()
            .map(|e| (e.filename.as_str(), &e.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("06b.pdf", &AuditStatus::Failed(failure)),
                ("06c.xlsx", &AuditStatus::NoRecords),
                ("06d.pdf", &AuditStatus::Pending),
                ("06a.pdf", &AuditStatus::Matched(2)),
            ]
        );
    }

    #[test]
    fn duplicate_filenames_count_once() {
        let discovered = vec![
            SourceLink::new("06a.pdf", "https://ex.test/x/06a.pdf"),
            SourceLink::new("06a.pdf", "https://ex.test/y/06a.pdf"),
        ];
        let mut session = CrawlSession::new();
        session.mark_processed("https://ex.test/y/06a.pdf");

        let report = reconcile(&discovered, &session);

        assert_eq!(report.total(), 1);
        assert_eq!(report.entries[0].status, AuditStatus::NoRecords);
        assert_eq!(report.matched + report.unmatched, 1);
    }

    #[test]
    fn records_win_over_stale_failures() {
        let discovered = vec![link("06a.pdf")];
        let mut session = CrawlSession::new();
        session.record_failure(
            &discovered[0].url,
            "06a.pdf",
            ExtractFailure {
                kind: FailureKind::Parse,
                reason: "old".to_string(),
            },
        );
        session.push_history(HistoryEntry::new("manual", vec![rec("06a.pdf")]));

        let report = reconcile(&discovered, &session);
        assert_eq!(report.entries[0].status.record_count(), 1);
    }

    #[test]
    fn failure_on_one_url_survives_success_on_another_with_the_same_name() {
        let discovered = vec![
            SourceLink::new("06a.pdf", "https://ex.test/x/06a.pdf"),
            SourceLink::new("06a.pdf", "https://ex.test/y/06a.pdf"),
        ];
        let failure = ExtractFailure {
            kind: FailureKind::RemoteService,
            reason: "poll exhausted".to_string(),
        };
        let mut session = CrawlSession::new();
        for l in &discovered {
            session.mark_processed(&l.url);
        }
        session.record_failure(&discovered[0].url, "06a.pdf", failure.clone());
        // y read cleanly but held no rows
        session.clear_failure(&discovered[1].url);

        let report = reconcile(&discovered, &session);

        assert_eq!(report.total(), 1);
        assert_eq!(report.entries[0].status, AuditStatus::Failed(failure));
    }

    #[test]
    fn manual_upload_failure_describes_an_undownloaded_filename() {
        let discovered = vec![link("06a.pdf")];
        let failure = ExtractFailure {
            kind: FailureKind::Parse,
            reason: "not a record array".to_string(),
        };
        let mut session = CrawlSession::new();
        session.record_failure("/tmp/uploads/06a.pdf", "06a.pdf", failure.clone());

        let report = reconcile(&discovered, &session);
        assert_eq!(report.entries[0].status, AuditStatus::Failed(failure));
    }

    #[test]
    fn empty_discovery_gives_empty_report() {
        let report = reconcile(&[], &CrawlSession::new());
        assert_eq!((report.matched, report.unmatched, report.total()), (0, 0, 0));
    }
}
