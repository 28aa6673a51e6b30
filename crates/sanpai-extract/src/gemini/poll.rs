//! Bounded exponential back-off while an uploaded file is processed.

use std::time::Duration;

use sanpai_core::{CancelToken, PollSettings};

use super::types::{FileState, RemoteFile};
use super::GeminiClient;
use crate::error::ExtractError;

/// Delay before poll number `attempt` (zero-based):
/// `initial_delay_ms * 2^attempt`, capped at `max_delay_ms`.
#[must_use]
pub fn backoff_delay_ms(settings: &PollSettings, attempt: u32) -> u64 {
    settings
        .initial_delay_ms
        .saturating_mul(1u64 << attempt.min(20))
        .min(settings.max_delay_ms)
}

impl GeminiClient {
    /// Polls `file` until it leaves the `PROCESSING` state.
    ///
    /// At most `poll.max_attempts` status requests are made. `cancel` is
    /// checked before every sleep.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::FileProcessingFailed`] if the service reports `FAILED`.
    /// - [`ExtractError::PollExhausted`] if the file is still processing after
    ///   the last attempt.
    /// - [`ExtractError::Cancelled`] if `cancel` is set while waiting.
    /// - Request errors from [`GeminiClient::get_file`].
    pub async fn wait_until_active(
        &self,
        file: RemoteFile,
        cancel: &CancelToken,
    ) -> Result<RemoteFile, ExtractError> {
        let mut current = file;
        let mut attempt = 0u32;

        loop {
            match current.state {
                FileState::Failed => {
                    return Err(ExtractError::FileProcessingFailed { name: current.name });
                }
                FileState::Processing => {}
                FileState::Active | FileState::StateUnspecified | FileState::Unknown => {
                    return Ok(current);
                }
            }

            if attempt >= self.poll.max_attempts {
                return Err(ExtractError::PollExhausted {
                    name: current.name,
                    attempts: attempt,
                });
            }
            if cancel.is_cancelled() {
                return Err(ExtractError::Cancelled { name: current.name });
            }

            let delay_ms = backoff_delay_ms(&self.poll, attempt);
            tracing::debug!(name = %current.name, attempt, delay_ms, "file still processing");
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;

            current = self.get_file(&current.name).await?;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(initial: u64, max: u64) -> PollSettings {
        PollSettings {
            max_attempts: 10,
            initial_delay_ms: initial,
            max_delay_ms: max,
        }
    }

    #[test]
    fn delay_doubles_until_cap() {
        let s = settings(1_000, 8_000);
        let delays: Vec<u64> = (0..6).map(|a| backoff_delay_ms(&s, a)).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 8_000, 8_000]);
    }

    #[test]
    fn delay_does_not_overflow_on_large_attempts() {
        let s = settings(u64::MAX / 2, u64::MAX);
        assert_eq!(backoff_delay_ms(&s, 500), u64::MAX);
    }

    #[test]
    fn zero_initial_delay_stays_zero() {
        let s = settings(0, 8_000);
        assert_eq!(backoff_delay_ms(&s, 5), 0);
    }
}
