//! Attachment link discovery on listing pages.

use std::collections::BTreeSet;

use percent_encoding::percent_decode_str;
use reqwest::Url;
use sanpai_core::SourceLink;
use scraper::{Html, Selector};

use crate::client::ReportClient;
use crate::error::ScraperError;

/// Path suffixes (lowercased) that mark a downloadable report attachment.
pub const ATTACHMENT_EXTENSIONS: [&str; 3] = [".pdf", ".xlsx", ".xls"];

/// Extracts attachment links from `html`.
///
/// Every `<a href>` is resolved against `base_url`; links whose lowercased
/// path ends in one of [`ATTACHMENT_EXTENSIONS`] are kept when their decoded
/// filename contains `keyword` (an empty keyword keeps all). The result is
/// de-duplicated on `(filename, url)`; callers must not rely on its order.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] if `base_url` is not an absolute URL.
pub fn parse_links(
    html: &str,
    base_url: &str,
    keyword: &str,
) -> Result<Vec<SourceLink>, ScraperError> {
    let base = Url::parse(base_url).map_err(|e| ScraperError::InvalidUrl {
        url: base_url.to_owned(),
        reason: e.to_string(),
    })?;

    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("valid anchor selector");

    let links: BTreeSet<SourceLink> = document
        .select(&anchors)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| attachment_link(&base, href.trim()))
        .filter(|link| keyword.is_empty() || link.filename.contains(keyword))
        .collect();

    Ok(links.into_iter().collect())
}

fn attachment_link(base: &Url, href: &str) -> Option<SourceLink> {
    if href.is_empty() {
        return None;
    }
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);

    let lower_path = url.path().to_lowercase();
    if !ATTACHMENT_EXTENSIONS
        .iter()
        .any(|ext| lower_path.ends_with(ext))
    {
        return None;
    }

    let segment = url.path().rsplit('/').next()?;
    let filename = percent_decode_str(segment).decode_utf8_lossy().into_owned();
    if filename.is_empty() {
        return None;
    }

    Some(SourceLink::new(filename, url.to_string()))
}

/// Fetches a listing page and collects its attachment links.
#[derive(Debug, Clone)]
pub struct LinkCollector {
    client: ReportClient,
}

impl LinkCollector {
    #[must_use]
    pub fn new(client: ReportClient) -> Self {
        Self { client }
    }

    /// Fetches `page_url` and returns its attachment links.
    ///
    /// # Errors
    ///
    /// Propagates fetch failures from [`ReportClient::fetch_page`] and
    /// [`ScraperError::InvalidUrl`] from [`parse_links`]. No partial list is
    /// ever returned.
    pub async fn try_collect(
        &self,
        page_url: &str,
        keyword: &str,
    ) -> Result<Vec<SourceLink>, ScraperError> {
        let html = self.client.fetch_page(page_url).await?;
        let links = parse_links(&html, page_url, keyword)?;
        tracing::info!(page_url, keyword, found = links.len(), "collected attachment links");
        Ok(links)
    }

    /// Like [`Self::try_collect`], but reports a failure and returns an empty list.
    pub async fn collect(&self, page_url: &str, keyword: &str) -> Vec<SourceLink> {
        match self.try_collect(page_url, keyword).await {
            Ok(links) => links,
            Err(e) => {
                tracing::error!(page_url, error = %e, "failed to collect attachment links");
                Vec::new()
            }
        }
    }
}
