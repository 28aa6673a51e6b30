//! Link discovery and file download for municipal waste-report listing pages.

pub mod client;
pub mod error;
pub mod links;

pub use client::ReportClient;
pub use error::ScraperError;
pub use links::{parse_links, LinkCollector};
