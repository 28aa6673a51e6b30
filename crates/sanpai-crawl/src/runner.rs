//! The batch/resume crawl loop.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sanpai_core::SourceLink;
use sanpai_extract::{ExtractionOutcome, Extractor};
use sanpai_scraper::{ReportClient, ScraperError};

use crate::error::CrawlError;
use crate::session::{CrawlSession, HistoryEntry};

/// Fetches one link into a directory.
#[allow(async_fn_in_trait)]
pub trait Downloader {
    async fn download(&self, link: &SourceLink, dir: &Path) -> Result<PathBuf, ScraperError>;
}

impl Downloader for ReportClient {
    async fn download(&self, link: &SourceLink, dir: &Path) -> Result<PathBuf, ScraperError> {
        ReportClient::download(self, link, dir).await
    }
}

/// Turns one downloaded file into records.
#[allow(async_fn_in_trait)]
pub trait FileExtractor {
    async fn extract(&self, path: &Path, filename: &str) -> ExtractionOutcome;
}

impl FileExtractor for Extractor {
    async fn extract(&self, path: &Path, filename: &str) -> ExtractionOutcome {
        Extractor::extract(self, path, filename).await
    }
}

/// Optional progress sink for the loop. Every hook defaults to a no-op.
pub trait Progress {
    fn batch_started(&mut self, _batch: usize, _size: usize, _remaining: usize) {}
    fn downloaded(&mut self, _link: &SourceLink) {}
    fn download_failed(&mut self, _link: &SourceLink, _error: &ScraperError) {}
    fn extracted(&mut self, _filename: &str, _outcome: &ExtractionOutcome) {}
    /// Called once the batch has been folded into `session`.
    fn batch_finished(&mut self, _batch: usize, _session: &CrawlSession) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}

#[derive(Debug, Clone, Copy)]
pub struct CrawlOptions {
    /// Links per batch; values below 1 are treated as 1.
    pub batch_size: usize,
    pub inter_batch_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every link was already processed when the run started.
    NothingToDo,
    /// The remaining-work set became empty.
    Completed,
    /// The cancellation flag was seen before a batch.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub batches: usize,
    pub downloaded: usize,
    pub download_failures: usize,
    pub records: usize,
    pub extraction_failures: usize,
    /// Downloads whose extraction the cancel flag cut short. They stay
    /// pending.
    pub interrupted: usize,
    pub stop: StopReason,
}

/// Drives batches of downloads and extractions over a link set until the
/// work runs out or the session's cancel flag is raised.
pub struct CrawlLoop<'a, D, E> {
    downloader: &'a D,
    extractor: &'a E,
    options: CrawlOptions,
    state: CrawlState,
}

impl<'a, D: Downloader, E: FileExtractor> CrawlLoop<'a, D, E> {
    #[must_use]
    pub fn new(downloader: &'a D, extractor: &'a E, options: CrawlOptions) -> Self {
        Self {
            downloader,
            extractor,
            options,
            state: CrawlState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Runs batches over `links` until none are pending.
    ///
    /// A link enters the processed set once it is downloaded and its
    /// extraction reached a verdict. A link whose download failed is
    /// skipped for the rest of this run but stays pending for the next one.
    /// The cancel flag is checked before each batch. A batch in flight runs
    /// to its end, but an extraction interrupted by the flag leaves its link
    /// pending and records no failure for it.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] if a batch's temporary directory cannot be
    /// created. Session state from completed batches is kept.
    pub async fn run(
        &mut self,
        session: &mut CrawlSession,
        links: &[SourceLink],
        progress: &mut dyn Progress,
    ) -> Result<CrawlSummary, CrawlError> {
        let batch_size = self.options.batch_size.max(1);
        let mut failed_this_run: HashSet<String> = HashSet::new();
        let mut summary = CrawlSummary {
            batches: 0,
            downloaded: 0,
            download_failures: 0,
            records: 0,
            extraction_failures: 0,
            interrupted: 0,
            stop: StopReason::NothingToDo,
        };

        let mut pending = remaining(session, links, &failed_this_run);
        if pending.is_empty() {
            tracing::info!(links = links.len(), "nothing to crawl");
            return Ok(summary);
        }
        self.state = CrawlState::Running;

        while self.state == CrawlState::Running {
            if session.cancel_token().is_cancelled() {
                tracing::info!(batches = summary.batches, "crawl cancelled");
                summary.stop = StopReason::Cancelled;
                self.state = CrawlState::Idle;
                break;
            }

            let batch: Vec<SourceLink> = pending.iter().take(batch_size).cloned().collect();
            summary.batches += 1;
            let batch_no = summary.batches;
            progress.batch_started(batch_no, batch.len(), pending.len());
            tracing::info!(batch = batch_no, size = batch.len(), remaining = pending.len(), "starting batch");

            let outcome = self.run_batch(session, &batch, &mut failed_this_run, progress).await;
            let batch_result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    self.state = CrawlState::Idle;
                    return Err(e);
                }
            };
            summary.downloaded += batch_result.downloaded;
            summary.download_failures += batch_result.download_failures;
            summary.extraction_failures += batch_result.extraction_failures;
            summary.records += batch_result.records;
            summary.interrupted += batch_result.interrupted;

            progress.batch_finished(batch_no, session);

            pending = remaining(session, links, &failed_this_run);
            if pending.is_empty() {
                summary.stop = StopReason::Completed;
                self.state = CrawlState::Idle;
            } else if self.options.inter_batch_delay_ms > 0
                && !session.cancel_token().is_cancelled()
            {
                tokio::time::sleep(Duration::from_millis(self.options.inter_batch_delay_ms)).await;
            }
        }

        tracing::info!(
            batches = summary.batches,
            downloaded = summary.downloaded,
            records = summary.records,
            stop = ?summary.stop,
            "crawl finished"
        );
        Ok(summary)
    }

    async fn run_batch(
        &self,
        session: &mut CrawlSession,
        batch: &[SourceLink],
        failed_this_run: &mut HashSet<String>,
        progress: &mut dyn Progress,
    ) -> Result<BatchResult, CrawlError> {
        // Removed with its contents when dropped at the end of the batch.
        let workdir = tempfile::tempdir().map_err(|source| CrawlError::Io {
            path: std::env::temp_dir().display().to_string(),
            source,
        })?;

        let mut result = BatchResult::default();
        let mut records = Vec::new();

        for link in batch {
            let path = match self.downloader.download(link, workdir.path()).await {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(filename = %link.filename, error = %e, "download failed");
                    progress.download_failed(link, &e);
                    failed_this_run.insert(link.url.clone());
                    result.download_failures += 1;
                    continue;
                }
            };
            progress.downloaded(link);

            let outcome = self.extractor.extract(&path, &link.filename).await;
            progress.extracted(&link.filename, &outcome);
            if outcome.is_cancelled() {
                tracing::info!(filename = %link.filename, "extraction interrupted; link stays pending");
                result.interrupted += 1;
                continue;
            }

            session.mark_processed(&link.url);
            result.downloaded += 1;
            match outcome {
                ExtractionOutcome::Records(found) => {
                    session.clear_failure(&link.url);
                    records.extend(found);
                }
                ExtractionOutcome::Failed(failure) => {
                    session.record_failure(&link.url, &link.filename, failure);
                    result.extraction_failures += 1;
                }
            }
        }

        result.records = records.len();
        if !records.is_empty() {
            let label = format!("バッチ {} ({} 件)", session.history().len() + 1, records.len());
            session.push_history(HistoryEntry::new(label, records));
        }
        Ok(result)
    }
}

#[derive(Debug, Default)]
struct BatchResult {
    downloaded: usize,
    download_failures: usize,
    extraction_failures: usize,
    interrupted: usize,
    records: usize,
}

fn remaining(
    session: &CrawlSession,
    links: &[SourceLink],
    failed_this_run: &HashSet<String>,
) -> Vec<SourceLink> {
    session
        .pending(links)
        .into_iter()
        .filter(|link| !failed_this_run.contains(&link.url))
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
