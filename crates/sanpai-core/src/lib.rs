//! Shared domain types and configuration for the sanpai workspace.

pub mod app_config;
pub mod cancel;
pub mod config;
pub mod link;
pub mod record;

use thiserror::Error;

pub use app_config::{AppConfig, PollSettings};
pub use cancel::CancelToken;
pub use config::{load_app_config, load_app_config_from_env};
pub use link::SourceLink;
pub use record::{ExtractedRecord, ReportField, Scalar};

/// Every setting has a default, so only a malformed value is an error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
