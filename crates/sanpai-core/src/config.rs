use crate::app_config::{AppConfig, PollSettings};
use crate::ConfigError;

pub const DEFAULT_TARGET_URL: &str = "https://www.city.fukuoka.lg.jp/kankyo/sanhai/hp/sangyouhaikibutu/haisyutujigyousya/taryoukouhyou.html";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Reads the crawler configuration, loading a `.env` file first if present.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Reads the crawler configuration from the process environment only.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Every `SANPAI_*` variable is optional; `lookup` stands in for
/// `std::env::var` in tests.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let target_url = or_default("SANPAI_TARGET_URL", DEFAULT_TARGET_URL);
    let keyword = or_default("SANPAI_KEYWORD", "06");

    let batch_size = parse_usize("SANPAI_BATCH_SIZE", "5")?;
    if batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SANPAI_BATCH_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let gemini_api_key = lookup("GEMINI_API_KEY")
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());
    let gemini_model = or_default("SANPAI_GEMINI_MODEL", "gemini-2.5-flash");
    let gemini_base_url = or_default(
        "SANPAI_GEMINI_BASE_URL",
        "https://generativelanguage.googleapis.com",
    )
    .trim_end_matches('/')
    .to_string();

    let request_timeout_secs = parse_u64("SANPAI_REQUEST_TIMEOUT_SECS", "15")?;
    let user_agent = or_default("SANPAI_USER_AGENT", DEFAULT_USER_AGENT);
    let inter_batch_delay_ms = parse_u64("SANPAI_INTER_BATCH_DELAY_MS", "1000")?;

    let poll = PollSettings {
        max_attempts: parse_u32("SANPAI_POLL_MAX_ATTEMPTS", "30")?,
        initial_delay_ms: parse_u64("SANPAI_POLL_INITIAL_DELAY_MS", "1000")?,
        max_delay_ms: parse_u64("SANPAI_POLL_MAX_DELAY_MS", "8000")?,
    };

    let sheet_text_max_chars = parse_usize("SANPAI_SHEET_TEXT_MAX_CHARS", "30000")?;
    let session_path = PathBuf::from(or_default("SANPAI_SESSION_PATH", ".sanpai/session.json"));
    let log_level = or_default("SANPAI_LOG_LEVEL", "info");

    Ok(AppConfig {
        target_url,
        keyword,
        batch_size,
        gemini_api_key,
        gemini_model,
        gemini_base_url,
        request_timeout_secs,
        user_agent,
        inter_batch_delay_ms,
        poll,
        sheet_text_max_chars,
        session_path,
        log_level,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
