// Client configuration
use std::time::Duration;

/// Connection and timing settings shared by the gateway, route guard and
/// live update channel.
#[derive(Debug, Clone)]
pub struct DeskConfig {
    /// Base URL of the backend API, including the version prefix.
    pub base_url: String,
    /// Timeout applied to every REST request.
    pub request_timeout: Duration,
    /// Connect timeout for the streaming client. The open stream itself
    /// carries no overall deadline.
    pub connect_timeout: Duration,
    /// Delay between a lost stream and the next connection attempt.
    pub stream_retry_delay: Duration,
    /// Settle time before a route validation is started, so rapid
    /// re-navigations collapse into one check.
    pub guard_debounce: Duration,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("NEWSDESK_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://127.0.0.1:8000/api/v1".to_string()),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            stream_retry_delay: Duration::from_secs(5),
            guard_debounce: Duration::from_millis(50),
        }
    }
}

impl DeskConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            request_timeout: env_millis("NEWSDESK_REQUEST_TIMEOUT_MS")
                .unwrap_or(base.request_timeout),
            connect_timeout: env_millis("NEWSDESK_CONNECT_TIMEOUT_MS")
                .unwrap_or(base.connect_timeout),
            stream_retry_delay: env_millis("NEWSDESK_STREAM_RETRY_MS")
                .unwrap_or(base.stream_retry_delay),
            guard_debounce: env_millis("NEWSDESK_GUARD_DEBOUNCE_MS")
                .unwrap_or(base.guard_debounce),
            ..base
        }
    }

    /// Base URL without a trailing slash, so paths can be appended as-is.
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = DeskConfig::default();
        assert!(!config.base_url.is_empty());
        assert!(config.stream_retry_delay >= Duration::from_secs(1));
        assert!(config.guard_debounce < config.stream_retry_delay);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = DeskConfig {
            base_url: "http://localhost:8000/api/v1/".to_string(),
            ..DeskConfig::default()
        };
        assert_eq!(config.base_url_trimmed(), "http://localhost:8000/api/v1");
    }
}
