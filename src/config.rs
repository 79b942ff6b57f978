//! Client configuration from the environment

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const CREDENTIALS_DIR: &str = ".chatsync";

/// Runtime configuration for the terminal client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the chat server
    pub api_url: String,
    /// Durable credential file
    pub credentials_path: PathBuf,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset, empty or unparsable
    /// values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = var("CHATSYNC_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let credentials_path = var("CHATSYNC_CREDENTIALS").map_or_else(
            || {
                let dir = match var("HOME") {
                    Some(home) => PathBuf::from(home).join(CREDENTIALS_DIR),
                    None => {
                        tracing::warn!("HOME is unset, keeping credentials in the working directory");
                        PathBuf::from(CREDENTIALS_DIR)
                    }
                };
                dir.join("credentials.json")
            },
            PathBuf::from,
        );

        let request_timeout = match var("CHATSYNC_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %raw, "Ignoring invalid CHATSYNC_TIMEOUT_SECS");
                    DEFAULT_TIMEOUT
                }
            },
            None => DEFAULT_TIMEOUT,
        };

        Self {
            api_url,
            credentials_path,
            request_timeout,
        }
    }
}
