//! Handlers over the saved session: export, audit, status and reset.

use std::path::Path;

use anyhow::Context;
use sanpai_core::AppConfig;
use sanpai_crawl::{reconcile, AuditStatus, CrawlSession, LedgerTable};

use crate::crawl::{discover, load_session, save_session};
use crate::TargetArgs;

pub(crate) fn export(session: &CrawlSession, output: &Path) -> anyhow::Result<()> {
    let table = LedgerTable::from_history(session.history());
    if table.is_empty() {
        println!("no records to export");
        return Ok(());
    }
    table
        .write_xlsx(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("wrote {} row(s) to {}", table.rows().len(), output.display());
    Ok(())
}

pub(crate) fn run_export(session_path: &Path, output: &Path) -> anyhow::Result<()> {
    let session = load_session(session_path)?;
    export(&session, output)
}

/// Re-runs discovery and reconciles it against the session's records.
pub(crate) async fn run_audit(
    config: &AppConfig,
    session_path: &Path,
    target: &TargetArgs,
) -> anyhow::Result<()> {
    let session = load_session(session_path)?;
    let links = discover(config, target).await?;
    let report = reconcile(&links, &session);

    println!(
        "matched {} / unmatched {} / total {}",
        report.matched,
        report.unmatched,
        report.total()
    );
    println!("{:<48}{:>8}  STATUS", "FILE", "RECORDS");
    for entry in &report.entries {
        let status = match &entry.status {
            AuditStatus::Matched(_) => "matched".to_string(),
            AuditStatus::NoRecords => "no records".to_string(),
            AuditStatus::Failed(f) => format!("failed ({}: {})", f.kind, f.reason),
            AuditStatus::Pending => "not downloaded".to_string(),
        };
        println!(
            "{:<48}{:>8}  {status}",
            entry.filename,
            entry.status.record_count()
        );
    }
    Ok(())
}

pub(crate) fn run_status(session_path: &Path) -> anyhow::Result<()> {
    let session = load_session(session_path)?;
    println!("session: {}", session_path.display());
    println!("processed links: {}", session.processed().len());
    println!("failed extractions: {}", session.failures().len());
    println!("history entries: {}", session.history().len());
    for entry in session.history() {
        println!(
            "  {}  {:<24}{:>6} record(s)",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.label,
            entry.record_count
        );
    }
    Ok(())
}

pub(crate) fn run_reset(session_path: &Path) -> anyhow::Result<()> {
    let mut session = load_session(session_path)?;
    session.reset();
    save_session(&session, session_path)?;
    println!("session reset: {}", session_path.display());
    Ok(())
}
