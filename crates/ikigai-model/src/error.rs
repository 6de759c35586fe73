// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Provider-agnostic error taxonomy.
//!
//! Every provider adapter maps its HTTP status and response body onto
//! exactly one [`ErrorCategory`].  Retryability and the user-facing message
//! are pure functions of the category.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Auth,
    RateLimit,
    InvalidArgument,
    NotFound,
    Server,
    Timeout,
    ContentFilter,
    Network,
    Io,
    Parse,
    InvalidState,
    MissingCredentials,
    AgentNotFound,
    Unknown,
}

impl ErrorCategory {
    pub fn name(self) -> &'static str {
        match self {
            Self::Auth => "authentication",
            Self::RateLimit => "rate_limit",
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Server => "server_error",
            Self::Timeout => "timeout",
            Self::ContentFilter => "content_filter",
            Self::Network => "network_error",
            Self::Io => "io_error",
            Self::Parse => "parse_error",
            Self::InvalidState => "invalid_state",
            Self::MissingCredentials => "missing_credentials",
            Self::AgentNotFound => "agent_not_found",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a request failing with this category may be retried.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Server | Self::Timeout | Self::Network
        )
    }
}

/// Error carried out of a provider adapter.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ProviderError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self { category, message: message.into() }
    }
}

/// Default mapping from HTTP status code to error category.
///
/// Adapters refine this with body inspection (content-filter takes
/// precedence when the body's error type or code indicates it).
pub fn status_to_category(status: u16) -> ErrorCategory {
    match status {
        401 | 403 => ErrorCategory::Auth,
        429 => ErrorCategory::RateLimit,
        400 => ErrorCategory::InvalidArgument,
        404 => ErrorCategory::NotFound,
        408 => ErrorCategory::Timeout,
        500 | 502 | 503 => ErrorCategory::Server,
        _ => ErrorCategory::Unknown,
    }
}

/// User-facing error line rendered into the scrollback.
pub fn user_message(provider: &str, category: ErrorCategory, detail: Option<&str>) -> String {
    let detail = detail.filter(|d| !d.is_empty());
    match category {
        ErrorCategory::Auth => {
            let env_var = ikigai_config::api_key_env_var(provider);
            format!(
                "Authentication failed for {provider}. Check your API key in {env_var} \
                 or ~/.config/ikigai/credentials.json"
            )
        }
        ErrorCategory::MissingCredentials => {
            let env_var = ikigai_config::api_key_env_var(provider);
            format!(
                "No API key configured for {provider}. Set {env_var} \
                 or add it to ~/.config/ikigai/credentials.json"
            )
        }
        ErrorCategory::RateLimit => match detail {
            Some(d) => format!("Rate limit exceeded for {provider}. {d}"),
            None => format!("Rate limit exceeded for {provider}."),
        },
        ErrorCategory::InvalidArgument => match detail {
            Some(d) => format!("Invalid request to {provider}: {d}"),
            None => format!("Invalid request to {provider}"),
        },
        ErrorCategory::NotFound => match detail {
            Some(d) => format!("Model not found on {provider}: {d}"),
            None => format!("Model not found on {provider}"),
        },
        ErrorCategory::Server => match detail {
            Some(d) => format!(
                "{provider} server error. This is temporary, retrying may succeed. {d}"
            ),
            None => format!("{provider} server error. This is temporary, retrying may succeed."),
        },
        ErrorCategory::Timeout => {
            format!("Request to {provider} timed out. Check network connection.")
        }
        ErrorCategory::ContentFilter => match detail {
            Some(d) => format!("Content blocked by {provider} safety filters: {d}"),
            None => format!("Content blocked by {provider} safety filters"),
        },
        ErrorCategory::Network => match detail {
            Some(d) => format!("Network error connecting to {provider}: {d}"),
            None => format!("Network error connecting to {provider}"),
        },
        ErrorCategory::AgentNotFound => match detail {
            Some(d) => format!("Agent not found: {d}"),
            None => "Agent not found".to_string(),
        },
        _ => match detail {
            Some(d) => format!("{provider} error: {d}"),
            None => format!("{provider} error"),
        },
    }
}

/// Retry delay for the given attempt (1-based).
///
/// A non-negative provider suggestion wins; otherwise exponential backoff
/// `1000 ms × 2^(attempt-1)` plus 0–1000 ms of jitter.
pub fn retry_delay_ms(attempt: u32, provider_suggested_ms: i64) -> i64 {
    if provider_suggested_ms > 0 {
        return provider_suggested_ms;
    }
    let base_delay_ms: i64 = 1000i64 << (attempt.saturating_sub(1).min(20));
    let jitter_ms = rand::random::<u64>() % 1001;
    base_delay_ms + jitter_ms as i64
}

/// Parse a rate-limit reset duration of the form `"6m0s"`, `"30s"`, `"1h"`.
///
/// Returns seconds, or `None` when the string does not parse.
pub fn parse_reset_duration(duration: &str) -> Option<i64> {
    let mut total_seconds: i64 = 0;
    let mut rest = duration;
    while !rest.is_empty() {
        let digits_end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)?;
        if digits_end == 0 {
            return None;
        }
        let value: i64 = rest[..digits_end].parse().ok()?;
        let unit = rest.as_bytes()[digits_end];
        total_seconds += match unit {
            b'h' => value * 3600,
            b'm' => value * 60,
            b's' => value,
            _ => return None,
        };
        rest = &rest[digits_end + 1..];
    }
    Some(total_seconds)
}

/// Provider-suggested retry delay in milliseconds from response headers.
///
/// Honors `retry-after` (seconds) first, then the minimum of
/// `x-ratelimit-reset-requests` / `x-ratelimit-reset-tokens` durations.
pub fn retry_after_ms(headers: &[(String, String)]) -> Option<i64> {
    let mut reset_requests: Option<i64> = None;
    let mut reset_tokens: Option<i64> = None;
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        let value = value.trim();
        match name.as_str() {
            "retry-after" => {
                if let Ok(secs) = value.parse::<i64>() {
                    if secs >= 0 {
                        return Some(secs * 1000);
                    }
                }
            }
            "x-ratelimit-reset-requests" => reset_requests = parse_reset_duration(value),
            "x-ratelimit-reset-tokens" => reset_tokens = parse_reset_duration(value),
            _ => {}
        }
    }
    match (reset_requests, reset_tokens) {
        (Some(r), Some(t)) => Some(r.min(t) * 1000),
        (Some(r), None) => Some(r * 1000),
        (None, Some(t)) => Some(t * 1000),
        (None, None) => None,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Retryability ──────────────────────────────────────────────────────────

    #[test]
    fn retryable_categories() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
    }

    #[test]
    fn non_retryable_categories() {
        for cat in [
            ErrorCategory::Auth,
            ErrorCategory::InvalidArgument,
            ErrorCategory::NotFound,
            ErrorCategory::ContentFilter,
            ErrorCategory::Io,
            ErrorCategory::Parse,
            ErrorCategory::InvalidState,
            ErrorCategory::MissingCredentials,
            ErrorCategory::AgentNotFound,
            ErrorCategory::Unknown,
        ] {
            assert!(!cat.is_retryable(), "{cat:?} must not be retryable");
        }
    }

    #[test]
    fn retryability_is_stable_per_category() {
        // Property 9: calling twice gives the same answer.
        for cat in [ErrorCategory::RateLimit, ErrorCategory::Auth] {
            assert_eq!(cat.is_retryable(), cat.is_retryable());
        }
    }

    // ── Status mapping ────────────────────────────────────────────────────────

    #[test]
    fn status_401_and_403_are_auth() {
        assert_eq!(status_to_category(401), ErrorCategory::Auth);
        assert_eq!(status_to_category(403), ErrorCategory::Auth);
    }

    #[test]
    fn status_429_is_rate_limit() {
        assert_eq!(status_to_category(429), ErrorCategory::RateLimit);
    }

    #[test]
    fn status_5xx_is_server() {
        assert_eq!(status_to_category(500), ErrorCategory::Server);
        assert_eq!(status_to_category(502), ErrorCategory::Server);
        assert_eq!(status_to_category(503), ErrorCategory::Server);
    }

    #[test]
    fn status_unmapped_is_unknown() {
        assert_eq!(status_to_category(418), ErrorCategory::Unknown);
    }

    // ── User messages ─────────────────────────────────────────────────────────

    #[test]
    fn auth_message_names_env_var() {
        let msg = user_message("anthropic", ErrorCategory::Auth, None);
        assert!(msg.contains("ANTHROPIC_API_KEY"));
        assert!(msg.contains("credentials.json"));
    }

    #[test]
    fn rate_limit_message_carries_detail() {
        let msg = user_message("openai", ErrorCategory::RateLimit, Some("try again in 6s"));
        assert!(msg.contains("Rate limit exceeded for openai. try again in 6s"));
    }

    #[test]
    fn empty_detail_is_treated_as_absent() {
        let msg = user_message("openai", ErrorCategory::RateLimit, Some(""));
        assert_eq!(msg, "Rate limit exceeded for openai.");
    }

    // ── Retry delay ───────────────────────────────────────────────────────────

    #[test]
    fn provider_suggestion_wins() {
        assert_eq!(retry_delay_ms(1, 1234), 1234);
        assert_eq!(retry_delay_ms(5, 99), 99);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        for attempt in 1..=4u32 {
            let d = retry_delay_ms(attempt, -1);
            let base = 1000i64 << (attempt - 1);
            assert!(d >= base && d <= base + 1000, "attempt {attempt}: {d}");
        }
    }

    // ── Header parsing ────────────────────────────────────────────────────────

    #[test]
    fn parse_duration_minutes_and_seconds() {
        assert_eq!(parse_reset_duration("6m0s"), Some(360));
        assert_eq!(parse_reset_duration("30s"), Some(30));
        assert_eq!(parse_reset_duration("1h"), Some(3600));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert_eq!(parse_reset_duration("abc"), None);
        assert_eq!(parse_reset_duration("5x"), None);
        assert_eq!(parse_reset_duration(""), Some(0));
    }

    #[test]
    fn retry_after_header_takes_precedence() {
        let headers = vec![
            ("retry-after".to_string(), "2".to_string()),
            ("x-ratelimit-reset-requests".to_string(), "6m0s".to_string()),
        ];
        assert_eq!(retry_after_ms(&headers), Some(2000));
    }

    #[test]
    fn reset_headers_take_minimum() {
        let headers = vec![
            ("x-ratelimit-reset-requests".to_string(), "6m0s".to_string()),
            ("x-ratelimit-reset-tokens".to_string(), "30s".to_string()),
        ];
        assert_eq!(retry_after_ms(&headers), Some(30_000));
    }

    #[test]
    fn no_relevant_headers_yields_none() {
        let headers = vec![("content-type".to_string(), "application/json".to_string())];
        assert_eq!(retry_after_ms(&headers), None);
    }
}
