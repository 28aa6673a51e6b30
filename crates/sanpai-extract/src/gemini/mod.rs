//! Gemini REST client for document extraction.

mod poll;
pub mod types;

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use sanpai_core::PollSettings;

use crate::error::ExtractError;
use types::{
    Content, FileData, GenerateRequest, GenerateResponse, GenerationConfig, Part, UploadResponse,
};

pub use poll::backoff_delay_ms;
pub use types::{FileState, RemoteFile};

/// Generation can take minutes on long PDFs.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Gemini REST client: file upload, state polling and `generateContent`.
///
/// The API key travels in the `x-goog-api-key` header and never appears in
/// URLs or `Debug` output.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    poll: PollSettings,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client against `base_url` (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: &str,
        poll: PollSettings,
    ) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            poll,
        })
    }

    /// Uploads a local file with the raw upload protocol.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::Io`] if the file cannot be read.
    /// - [`ExtractError::UnexpectedStatus`] / [`ExtractError::Http`] on request failure.
    /// - [`ExtractError::InvalidResponse`] if the response is not a file resource.
    pub async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile, ExtractError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let url = format!("{}/upload/v1beta/files", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "raw")
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?;

        let body = read_success_body(response, &url).await?;
        let uploaded: UploadResponse =
            serde_json::from_str(&body).map_err(|e| ExtractError::InvalidResponse {
                context: format!("upload of {}", path.display()),
                source: e,
            })?;

        tracing::debug!(name = %uploaded.file.name, state = ?uploaded.file.state, "uploaded file");
        Ok(uploaded.file)
    }

    /// Fetches the current metadata of an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns request or decoding errors as in [`Self::upload_file`].
    pub async fn get_file(&self, name: &str) -> Result<RemoteFile, ExtractError> {
        let url = format!("{}/v1beta/{name}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        let body = read_success_body(response, &url).await?;
        serde_json::from_str(&body).map_err(|e| ExtractError::InvalidResponse {
            context: format!("file {name}"),
            source: e,
        })
    }

    /// Asks the model about an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns request or decoding errors, or [`ExtractError::EmptyResponse`]
    /// if the model produced no text.
    pub async fn generate_from_file(
        &self,
        file: &RemoteFile,
        prompt: &str,
    ) -> Result<String, ExtractError> {
        let mime_type = if file.mime_type.is_empty() {
            "application/octet-stream"
        } else {
            file.mime_type.as_str()
        };
        let parts = vec![
            Part::File {
                file_data: FileData {
                    mime_type,
                    file_uri: &file.uri,
                },
            },
            Part::Text { text: prompt },
        ];
        self.generate(parts).await
    }

    /// Asks the model about inline text.
    ///
    /// # Errors
    ///
    /// As [`Self::generate_from_file`].
    pub async fn generate_from_text(&self, prompt: &str) -> Result<String, ExtractError> {
        self.generate(vec![Part::Text { text: prompt }]).await
    }

    async fn generate(&self, parts: Vec<Part<'_>>) -> Result<String, ExtractError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.1,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let body = read_success_body(response, &url).await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| ExtractError::InvalidResponse {
                context: format!("generateContent ({})", self.model),
                source: e,
            })?;

        parsed.text().ok_or(ExtractError::EmptyResponse)
    }
}

async fn read_success_body(response: reqwest::Response, url: &str) -> Result<String, ExtractError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ExtractError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
            body: body.chars().take(300).collect(),
        });
    }
    Ok(body)
}

/// MIME type sent for an uploaded attachment.
#[must_use]
pub fn mime_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}
