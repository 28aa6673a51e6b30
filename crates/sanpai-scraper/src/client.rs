//! HTTP client for listing pages and report attachments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use sanpai_core::SourceLink;

use crate::error::ScraperError;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "ja,en-US;q=0.9,en;q=0.8";
const REFERER: &str = "https://www.google.com/";

/// HTTP client that presents a browser-like header set.
///
/// Municipal sites frequently reject default library user agents, so every
/// request carries `User-Agent`, `Accept-Language` and `Referer` values a
/// desktop browser would send. Non-2xx responses surface as
/// [`ScraperError::UnexpectedStatus`]. Nothing is retried.
#[derive(Debug, Clone)]
pub struct ReportClient {
    client: Client,
}

impl ReportClient {
    /// Creates a `ReportClient` with the given request timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches a page and decodes its body using the response charset.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx status.
    /// - [`ScraperError::Http`] on network, timeout or decode failure.
    pub async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        let response = self.send(url).await?;
        Ok(response.text().await?)
    }

    /// Downloads `link` into `dir`, returning the written path.
    ///
    /// The file keeps the link's filename with path separators replaced, so a
    /// decoded `%2F` cannot escape `dir`.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx status.
    /// - [`ScraperError::Http`] on network or timeout failure.
    /// - [`ScraperError::Io`] if the file cannot be written.
    pub async fn download(&self, link: &SourceLink, dir: &Path) -> Result<PathBuf, ScraperError> {
        let response = self.send(&link.url).await?;
        let bytes = response.bytes().await?;

        let path = dir.join(safe_file_name(&link.filename));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| ScraperError::Io {
                path: path.display().to_string(),
                source,
            })?;

        tracing::debug!(url = %link.url, bytes = bytes.len(), path = %path.display(), "downloaded file");
        Ok(path)
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .header(reqwest::header::REFERER, REFERER)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }
        Ok(response)
    }
}

fn safe_file_name(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "download".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_file_name_replaces_separators() {
        assert_eq!(safe_file_name("a/b\\c.pdf"), "a_b_c.pdf");
    }

    #[test]
    fn safe_file_name_rejects_dot_names() {
        assert_eq!(safe_file_name(".."), "download");
        assert_eq!(safe_file_name("  "), "download");
    }

    #[test]
    fn safe_file_name_keeps_japanese_names() {
        assert_eq!(safe_file_name("06報告書.pdf"), "06報告書.pdf");
    }
}
