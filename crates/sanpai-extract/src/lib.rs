//! Structured waste-report extraction from downloaded attachments.
//!
//! Spreadsheets go through a heuristic table locator first; PDFs, and
//! spreadsheets the locator cannot read, are sent to the Gemini API with a
//! fixed extraction instruction. Both paths produce [`ExtractedRecord`]s.
//!
//! [`ExtractedRecord`]: sanpai_core::ExtractedRecord

pub mod dispatch;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod response;
pub mod table;

pub use dispatch::{ExtractFailure, ExtractionOutcome, Extractor, FailureKind};
pub use error::ExtractError;
pub use gemini::GeminiClient;
pub use response::parse_record_array;
pub use table::{locate_in_grid, locate_tables, read_workbook, render_sheets_text, Worksheet};
