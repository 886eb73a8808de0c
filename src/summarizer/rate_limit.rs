//! Client-side request pacing for LLM calls.
//!
//! Two layers: a sliding one-minute token budget (wait out the window when
//! a request would blow past it) and a size-proportional delay between
//! consecutive requests. Reactive 429 backoff lives with the caller; this
//! module only spaces requests out proactively.

use crate::config::RateLimitSettings;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Rough chars-per-token ratio used for estimation.
const CHARS_PER_TOKEN: usize = 4;

/// One second of delay per this many estimated tokens.
const TOKENS_PER_DELAY_SECOND: f64 = 20_000.0;

/// Estimate token count from text length.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() / CHARS_PER_TOKEN) as u64
}

/// Exponential backoff delay after a 429: 1, 2, 4, 8, ... capped at 60s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt.min(6)).min(60);
    Duration::from_secs(secs)
}

/// Paces outgoing requests against a tokens-per-minute budget.
pub struct RateLimiter {
    settings: RateLimitSettings,
    window_start: Instant,
    tokens_in_window: u64,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            window_start: Instant::now(),
            tokens_in_window: 0,
            last_request: None,
        }
    }

    fn safe_limit(&self) -> u64 {
        (self.settings.tokens_per_minute as f64 * self.settings.safety_margin) as u64
    }

    /// Per-request delay proportional to request size, clamped to the
    /// configured floor and ceiling.
    fn request_delay(&self, estimated_tokens: u64) -> Duration {
        let secs = (estimated_tokens as f64 / TOKENS_PER_DELAY_SECOND)
            .clamp(self.settings.min_delay_seconds, self.settings.max_delay_seconds);
        Duration::from_secs_f64(secs)
    }

    /// Wait until a request of the given size may be sent, then account
    /// for it. No-op when pacing is disabled.
    pub async fn acquire(&mut self, estimated_tokens: u64) {
        if !self.settings.enabled {
            return;
        }

        let now = Instant::now();

        // Reset the window after a minute.
        if now.duration_since(self.window_start) >= Duration::from_secs(60) {
            self.window_start = now;
            self.tokens_in_window = 0;
        }

        // Would this request blow the budget? Sleep out the window.
        if self.tokens_in_window + estimated_tokens > self.safe_limit() {
            let elapsed = now.duration_since(self.window_start);
            let wait = Duration::from_secs(61).saturating_sub(elapsed);
            if !wait.is_zero() {
                debug!(wait_secs = wait.as_secs_f64(), "token budget exhausted, waiting");
                tokio::time::sleep(wait).await;
            }
            self.window_start = Instant::now();
            self.tokens_in_window = 0;
        }

        // Minimum spacing between consecutive requests.
        let delay = self.request_delay(estimated_tokens);
        if let Some(last) = self.last_request {
            let since_last = last.elapsed();
            if since_last < delay {
                tokio::time::sleep(delay - since_last).await;
            }
        }

        self.tokens_in_window += estimated_tokens;
        self.last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RateLimitSettings {
        RateLimitSettings::default()
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(40_000)), 10_000);
    }

    #[test]
    fn test_backoff_delay_grows_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(10), Duration::from_secs(60));
    }

    #[test]
    fn test_request_delay_clamps() {
        let limiter = RateLimiter::new(settings());
        // Tiny request hits the floor
        assert_eq!(limiter.request_delay(100), Duration::from_secs_f64(0.5));
        // Huge request hits the ceiling
        assert_eq!(limiter.request_delay(1_000_000), Duration::from_secs_f64(5.0));
        // 40K tokens ~= 2 seconds
        assert_eq!(limiter.request_delay(40_000), Duration::from_secs_f64(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_budget_forces_wait() {
        let mut limiter = RateLimiter::new(settings());
        // safe limit = 24_000
        limiter.acquire(20_000).await;
        let before = Instant::now();
        limiter.acquire(10_000).await;
        // Second acquire had to wait out the remainder of the window.
        assert!(before.elapsed() >= Duration::from_secs(55));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_limiter_never_sleeps() {
        let mut s = settings();
        s.enabled = false;
        let mut limiter = RateLimiter::new(s);
        let before = Instant::now();
        limiter.acquire(1_000_000).await;
        limiter.acquire(1_000_000).await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
