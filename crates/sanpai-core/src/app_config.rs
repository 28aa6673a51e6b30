use std::path::PathBuf;

/// Back-off policy for polling the remote file-processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone)]
pub struct AppConfig {
    pub target_url: String,
    pub keyword: String,
    pub batch_size: usize,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub inter_batch_delay_ms: u64,
    pub poll: PollSettings,
    pub sheet_text_max_chars: usize,
    pub session_path: PathBuf,
    pub log_level: String,
}

impl AppConfig {
    /// Resolves the API key to use: the configured secret wins over a
    /// key typed on the command line.
    #[must_use]
    pub fn resolve_api_key(&self, cli_key: Option<&str>) -> Option<String> {
        self.gemini_api_key
            .clone()
            .or_else(|| cli_key.map(str::trim).filter(|k| !k.is_empty()).map(str::to_owned))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("target_url", &self.target_url)
            .field("keyword", &self.keyword)
            .field("batch_size", &self.batch_size)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("inter_batch_delay_ms", &self.inter_batch_delay_ms)
            .field("poll", &self.poll)
            .field("sheet_text_max_chars", &self.sheet_text_max_chars)
            .field("session_path", &self.session_path)
            .field("log_level", &self.log_level)
            .finish()
    }
}
