//! Routes a downloaded file to the right extraction path.

use std::fmt;
use std::path::Path;

use sanpai_core::link::{file_extension, file_stem};
use sanpai_core::{CancelToken, ExtractedRecord, ReportField};
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::gemini::{mime_type_for, GeminiClient};
use crate::prompt::{spreadsheet_prompt, EXTRACTION_PROMPT};
use crate::response::parse_record_array;
use crate::table::{locate_in_sheets, read_workbook, render_sheets_text};

/// Why a file produced no usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Parse,
    RemoteService,
    Unsupported,
    /// The session's cancel flag interrupted the extraction; the file was
    /// not judged either way.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Transport => "transport",
            FailureKind::Parse => "parse",
            FailureKind::RemoteService => "remote_service",
            FailureKind::Unsupported => "unsupported",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl From<&ExtractError> for ExtractFailure {
    fn from(err: &ExtractError) -> Self {
        Self {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

/// Result of extracting one file.
///
/// `Records(vec![])` means the file was read and genuinely holds no data;
/// a failure is always reported as `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Records(Vec<ExtractedRecord>),
    Failed(ExtractFailure),
}

impl ExtractionOutcome {
    #[must_use]
    pub fn records(&self) -> &[ExtractedRecord] {
        match self {
            ExtractionOutcome::Records(records) => records,
            ExtractionOutcome::Failed(_) => &[],
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, ExtractionOutcome::Failed(_))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractionOutcome::Failed(f) if f.kind == FailureKind::Cancelled)
    }
}

/// Extraction dispatcher.
///
/// Without a [`GeminiClient`] only the spreadsheet heuristic is available;
/// every path that needs the model fails with [`ExtractError::NotConfigured`].
#[derive(Debug)]
pub struct Extractor {
    remote: Option<GeminiClient>,
    sheet_text_max_chars: usize,
    cancel: CancelToken,
}

impl Extractor {
    #[must_use]
    pub fn new(remote: Option<GeminiClient>, sheet_text_max_chars: usize, cancel: CancelToken) -> Self {
        Self {
            remote,
            sheet_text_max_chars,
            cancel,
        }
    }

    /// Extracts records from the file at `path`, downloaded as `filename`.
    ///
    /// Never fails: every error is logged and returned as
    /// [`ExtractionOutcome::Failed`].
    pub async fn extract(&self, path: &Path, filename: &str) -> ExtractionOutcome {
        let result = match file_extension(filename).as_deref() {
            Some("xlsx" | "xls") => self.extract_spreadsheet(path, filename).await,
            Some("pdf") => self.extract_pdf(path, filename).await,
            other => Err(ExtractError::UnsupportedFileType(
                other.unwrap_or("(none)").to_string(),
            )),
        };

        match result {
            Ok(records) => {
                tracing::info!(filename, records = records.len(), "extracted records");
                ExtractionOutcome::Records(records)
            }
            Err(e) => {
                tracing::warn!(filename, kind = %e.kind(), error = %e, "extraction failed");
                ExtractionOutcome::Failed(ExtractFailure::from(&e))
            }
        }
    }

    async fn extract_spreadsheet(
        &self,
        path: &Path,
        filename: &str,
    ) -> Result<Vec<ExtractedRecord>, ExtractError> {
        let sheets = read_workbook(path)?;

        let located = locate_in_sheets(&sheets);
        if !located.is_empty() {
            let operator = file_stem(filename);
            return Ok(located
                .into_iter()
                .map(|mut record| {
                    record.set(ReportField::FileName, filename);
                    record.set_if_missing(ReportField::OperatorName, operator.as_str());
                    record
                })
                .collect());
        }

        tracing::debug!(filename, "table locator found nothing; falling back to model");
        let remote = self.remote.as_ref().ok_or(ExtractError::NotConfigured)?;
        let text = render_sheets_text(&sheets, self.sheet_text_max_chars);
        let response = remote.generate_from_text(&spreadsheet_prompt(&text)).await?;

        Ok(parse_record_array(&response)?
            .into_iter()
            .map(|mut record| {
                record.set(ReportField::FileName, filename);
                record.set_if_missing(ReportField::TotalConsigned, 0.0);
                record
            })
            .collect())
    }

    async fn extract_pdf(
        &self,
        path: &Path,
        filename: &str,
    ) -> Result<Vec<ExtractedRecord>, ExtractError> {
        let remote = self.remote.as_ref().ok_or(ExtractError::NotConfigured)?;

        let uploaded = remote.upload_file(path, mime_type_for("pdf")).await?;
        let ready = remote.wait_until_active(uploaded, &self.cancel).await?;
        let response = remote.generate_from_file(&ready, EXTRACTION_PROMPT).await?;

        Ok(parse_record_array(&response)?
            .into_iter()
            .map(|mut record| {
                record.set(ReportField::FileName, filename);
                record
            })
            .collect())
    }
}
