//! Steam market client settings.

use serde::Deserialize;

/// Steam community market configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SteamConfig {
    /// Price-overview endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Market currency code. Only USD (1) is supported; no conversion is done.
    #[serde(default = "default_currency")]
    pub currency: u32,
    /// Minimum spacing between two requests (milliseconds).
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Upper bound of random jitter added to the spacing (milliseconds).
    #[serde(default = "default_request_jitter_ms")]
    pub request_jitter_ms: u64,
    /// HTTP request timeout (milliseconds).
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// HTTP connect timeout (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_api_url() -> String {
    "https://steamcommunity.com/market/priceoverview/".to_string()
}

const fn default_currency() -> u32 {
    1
}

const fn default_request_delay_ms() -> u64 {
    1000
}

const fn default_request_jitter_ms() -> u64 {
    500
}

const fn default_http_timeout_ms() -> u64 {
    15_000
}

const fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            currency: default_currency(),
            request_delay_ms: default_request_delay_ms(),
            request_jitter_ms: default_request_jitter_ms(),
            http_timeout_ms: default_http_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}
