//! Resumable batch crawling of report links, plus ledger assembly and the
//! coverage audit over everything extracted so far.

pub mod assemble;
pub mod audit;
pub mod error;
pub mod runner;
pub mod session;

pub use assemble::LedgerTable;
pub use audit::{reconcile, AuditEntry, AuditReport, AuditStatus};
pub use error::CrawlError;
pub use runner::{
    CrawlLoop, CrawlOptions, CrawlState, CrawlSummary, Downloader, FileExtractor, NullProgress,
    Progress, StopReason,
};
pub use session::{CrawlSession, FailedFile, HistoryEntry};
