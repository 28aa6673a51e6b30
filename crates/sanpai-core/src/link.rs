use serde::{Deserialize, Serialize};

/// A downloadable attachment discovered on a listing page.
///
/// Ordering and equality cover both fields, so a set of links de-duplicates
/// on the `(filename, url)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLink {
    /// Percent-decoded last path segment of `url`.
    pub filename: String,
    /// Absolute URL of the file.
    pub url: String,
}

impl SourceLink {
    #[must_use]
    pub fn new(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
        }
    }

    /// Lowercased extension of the filename, without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.filename)
    }
}

/// Lowercased extension of `filename`, without the dot.
#[must_use]
pub fn file_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// `filename` without its final extension.
#[must_use]
pub fn file_stem(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename)
        .to_string()
}
