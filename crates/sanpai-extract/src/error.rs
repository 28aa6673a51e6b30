use thiserror::Error;

use crate::dispatch::FailureKind;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    InvalidResponse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("remote processing failed for {name}")]
    FileProcessingFailed { name: String },

    #[error("{name} still processing after {attempts} polls")]
    PollExhausted { name: String, attempts: u32 },

    #[error("cancelled while waiting for {name}")]
    Cancelled { name: String },

    #[error("Gemini API key not configured")]
    NotConfigured,

    #[error("model output is not a JSON record array: {0}")]
    RecordParse(String),

    #[error("failed to read workbook {path}: {reason}")]
    Workbook { path: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
}

impl ExtractError {
    /// Coarse classification used by the crawl session and audit.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::Io { .. } => FailureKind::Transport,
            ExtractError::RecordParse(_) | ExtractError::Workbook { .. } => FailureKind::Parse,
            ExtractError::UnsupportedFileType(_) => FailureKind::Unsupported,
            ExtractError::Cancelled { .. } => FailureKind::Cancelled,
            ExtractError::Http(_)
            | ExtractError::UnexpectedStatus { .. }
            | ExtractError::InvalidResponse { .. }
            | ExtractError::EmptyResponse
            | ExtractError::FileProcessingFailed { .. }
            | ExtractError::PollExhausted { .. }
            | ExtractError::NotConfigured => FailureKind::RemoteService,
        }
    }
}
