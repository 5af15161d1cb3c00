// Environment detection, option loading and logger setup.

use std::sync::OnceLock;

use crate::ClientOptions;

/// Cached environment mode.
static ENV_MODE: OnceLock<EnvMode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Production,
    Development,
    Test,
}

impl EnvMode {
    /// Parse a mode name; anything unrecognized is development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => EnvMode::Production,
            "test" | "testing" => EnvMode::Test,
            _ => EnvMode::Development,
        }
    }
}

/// Detect the current environment mode from environment variables.
/// Checks `CHAT_SESSION_ENV` then `RUST_ENV`.
pub fn detect_env_mode() -> EnvMode {
    *ENV_MODE.get_or_init(|| {
        let env_val = std::env::var("CHAT_SESSION_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        EnvMode::parse(&env_val)
    })
}

pub fn is_production() -> bool {
    detect_env_mode() == EnvMode::Production
}

/// Get `CHAT_API_URL` from the environment.
pub fn get_api_url_from_env() -> Option<String> {
    std::env::var("CHAT_API_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Get `CHAT_API_TIMEOUT_SECS` from the environment, ignoring unparseable values.
pub fn get_timeout_from_env() -> Option<u64> {
    std::env::var("CHAT_API_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.trim().parse().ok())
}

impl ClientOptions {
    /// Defaults overridden by `CHAT_API_URL` and `CHAT_API_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(url) = get_api_url_from_env() {
            options.base_url = url;
        }
        options.timeout_secs = get_timeout_from_env();
        options
    }
}

/// Initialize the `tracing` subscriber with appropriate defaults.
/// `RUST_LOG` wins when set; otherwise info in production, debug elsewhere.
/// Safe to call more than once.
pub fn init_logger() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production() {
            EnvFilter::new("chat_session=info")
        } else {
            EnvFilter::new("chat_session=debug")
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_mode_parse() {
        assert_eq!(EnvMode::parse("production"), EnvMode::Production);
        assert_eq!(EnvMode::parse("PROD"), EnvMode::Production);
        assert_eq!(EnvMode::parse("test"), EnvMode::Test);
        assert_eq!(EnvMode::parse(""), EnvMode::Development);
        assert_eq!(EnvMode::parse("staging"), EnvMode::Development);
    }

    #[test]
    fn test_init_logger_twice() {
        init_logger();
        init_logger();
    }
}
