//! Handlers that touch the network: link listing, crawling and manual
//! extraction.

use std::path::{Path, PathBuf};

use anyhow::Context;
use sanpai_core::{AppConfig, CancelToken, SourceLink};
use sanpai_crawl::{
    CrawlError, CrawlLoop, CrawlOptions, CrawlSession, HistoryEntry, LedgerTable, Progress,
    StopReason,
};
use sanpai_extract::{ExtractionOutcome, Extractor, GeminiClient};
use sanpai_scraper::{LinkCollector, ReportClient, ScraperError};

use crate::TargetArgs;

pub(crate) fn build_client(config: &AppConfig) -> anyhow::Result<ReportClient> {
    ReportClient::new(config.request_timeout_secs, &config.user_agent)
        .context("failed to build HTTP client")
}

/// Builds the extraction dispatcher. Without an API key only the
/// spreadsheet table locator is available.
fn build_extractor(
    config: &AppConfig,
    cli_key: Option<&str>,
    cancel: CancelToken,
) -> anyhow::Result<Extractor> {
    let remote = match config.resolve_api_key(cli_key) {
        Some(key) => Some(
            GeminiClient::new(&key, &config.gemini_model, &config.gemini_base_url, config.poll)
                .context("failed to build Gemini client")?,
        ),
        None => {
            tracing::warn!("no Gemini API key; PDFs and unreadable spreadsheets will fail");
            None
        }
    };
    Ok(Extractor::new(remote, config.sheet_text_max_chars, cancel))
}

pub(crate) async fn discover(
    config: &AppConfig,
    target: &TargetArgs,
) -> anyhow::Result<Vec<SourceLink>> {
    let url = target.url.as_deref().unwrap_or(&config.target_url);
    let keyword = target.keyword.as_deref().unwrap_or(&config.keyword);
    let collector = LinkCollector::new(build_client(config)?);
    let links = collector.collect(url, keyword).await;
    tracing::info!(url, keyword, links = links.len(), "link discovery finished");
    Ok(links)
}

pub(crate) fn load_session(path: &Path) -> anyhow::Result<CrawlSession> {
    CrawlSession::load(path).with_context(|| format!("failed to load session {}", path.display()))
}

pub(crate) fn save_session(session: &CrawlSession, path: &Path) -> anyhow::Result<()> {
    session
        .save(path)
        .with_context(|| format!("failed to save session {}", path.display()))
}

pub(crate) async fn run_links(config: &AppConfig, target: &TargetArgs) -> anyhow::Result<()> {
    let links = discover(config, target).await?;
    if links.is_empty() {
        println!("no matching links found");
        return Ok(());
    }
    for link in &links {
        println!("{:<48}{}", link.filename, link.url);
    }
    println!("{} link(s)", links.len());
    Ok(())
}

/// Prints per-item lines and saves the session after every batch.
struct CliProgress {
    session_path: PathBuf,
    save_error: Option<CrawlError>,
}

impl Progress for CliProgress {
    fn batch_started(&mut self, batch: usize, size: usize, remaining: usize) {
        println!("batch {batch}: {size} file(s), {remaining} remaining");
    }

    fn download_failed(&mut self, link: &SourceLink, error: &ScraperError) {
        println!("  ✗ {} (download: {error})", link.filename);
    }

    fn extracted(&mut self, filename: &str, outcome: &ExtractionOutcome) {
        match outcome {
            ExtractionOutcome::Records(records) => {
                println!("  ✓ {filename}: {} record(s)", records.len());
            }
            ExtractionOutcome::Failed(failure) => {
                println!("  ✗ {filename} ({}: {})", failure.kind, failure.reason);
            }
        }
    }

    fn batch_finished(&mut self, batch: usize, session: &CrawlSession) {
        if let Err(e) = session.save(&self.session_path) {
            tracing::error!(batch, error = %e, "failed to save session");
            if self.save_error.is_none() {
                self.save_error = Some(e);
            }
        }
    }
}

pub(crate) async fn run_crawl(
    config: &AppConfig,
    session_path: &Path,
    target: &TargetArgs,
    batch_size: Option<usize>,
    api_key: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut session = load_session(session_path)?;
    let links = discover(config, target).await?;
    if links.is_empty() {
        println!("no matching links found; nothing to crawl");
        return Ok(());
    }

    let client = build_client(config)?;
    let extractor = build_extractor(config, api_key, session.cancel_token().clone())?;

    let token = session.cancel_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current batch");
            token.cancel();
        }
    });

    let options = CrawlOptions {
        batch_size: batch_size.unwrap_or(config.batch_size),
        inter_batch_delay_ms: config.inter_batch_delay_ms,
    };
    let mut progress = CliProgress {
        session_path: session_path.to_path_buf(),
        save_error: None,
    };

    let summary = CrawlLoop::new(&client, &extractor, options)
        .run(&mut session, &links, &mut progress)
        .await
        .context("crawl aborted")?;
    save_session(&session, session_path)?;
    if let Some(e) = progress.save_error {
        tracing::warn!(error = %e, "a mid-crawl save failed; final save succeeded");
    }

    let stop = match summary.stop {
        StopReason::NothingToDo => "every link was already processed",
        StopReason::Completed => "completed",
        StopReason::Cancelled => "cancelled",
    };
    println!(
        "{stop}: {} batch(es), {} downloaded, {} download failure(s), {} extraction failure(s), {} record(s)",
        summary.batches,
        summary.downloaded,
        summary.download_failures,
        summary.extraction_failures,
        summary.records
    );
    if summary.interrupted > 0 {
        println!("{} interrupted file(s) left for the next run", summary.interrupted);
    }
    println!(
        "{} of {} link(s) processed",
        links.len() - session.pending(&links).len(),
        links.len()
    );

    if let Some(output) = output {
        crate::ledger::export(&session, output)?;
    }
    Ok(())
}

pub(crate) async fn run_extract(
    config: &AppConfig,
    session_path: &Path,
    files: &[PathBuf],
    api_key: Option<&str>,
) -> anyhow::Result<()> {
    let mut session = load_session(session_path)?;
    let extractor = build_extractor(config, api_key, session.cancel_token().clone())?;

    for path in files {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("not a file path: {}", path.display()))?;
        let source = path.display().to_string();

        match extractor.extract(path, filename).await {
            ExtractionOutcome::Records(records) if records.is_empty() => {
                session.clear_failure(&source);
                println!("{filename}: no records");
            }
            ExtractionOutcome::Records(records) => {
                println!("{filename}: {} record(s)", records.len());
                session.clear_failure(&source);
                session.push_history(HistoryEntry::new(format!("手動: {filename}"), records));
            }
            ExtractionOutcome::Failed(failure) => {
                println!("{filename}: failed ({}: {})", failure.kind, failure.reason);
                session.record_failure(&source, filename, failure);
            }
        }
    }

    save_session(&session, session_path)?;
    let preview = LedgerTable::from_history(session.history());
    if !preview.is_empty() {
        print!("{}", preview.render_preview(10));
    }
    Ok(())
}
