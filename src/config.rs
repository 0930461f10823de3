//! Configuration management for the relay dispatcher.

use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use relay_core::Channel;
use relay_delivery::{
    client::ClientConfig,
    retry::{BackoffStrategy, RetryPolicy},
    selector::invalid_endpoints,
    signing::SignatureAlgorithm,
    DispatchConfig, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECONDS,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

const CONFIG_FILE: &str = "relay.toml";
const ENV_PREFIX: &str = "RELAY_";

/// Complete dispatcher configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables prefixed `RELAY_` (highest priority)
/// 2. Configuration file (`relay.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// `RELAY_WORKFLOWS` accepts either an array (`["https://a", "https://b"]`)
/// or a comma-separated list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Fan-out
    /// Candidate workflow URLs.
    ///
    /// Environment variable: `RELAY_WORKFLOWS`
    #[serde(default, deserialize_with = "string_or_list")]
    pub workflows: Vec<String>,
    /// Shared secret for the `X-Signature` header; unset disables signing.
    ///
    /// Environment variable: `RELAY_SHARED_SECRET`
    #[serde(default)]
    pub shared_secret: Option<String>,
    /// HMAC algorithm for signatures.
    ///
    /// Environment variable: `RELAY_SIGNATURE_ALGORITHM`
    #[serde(default)]
    pub signature_algorithm: SignatureAlgorithm,
    /// Channels whose messages are dispatched.
    ///
    /// Environment variable: `RELAY_CHANNELS`
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,

    // Transport
    /// Per-attempt HTTP timeout in seconds.
    ///
    /// Environment variable: `RELAY_TIMEOUT_SECONDS`
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Retries after the first attempt of each delivery.
    ///
    /// Environment variable: `RELAY_MAX_RETRIES`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    ///
    /// Environment variable: `RELAY_RETRY_BASE_DELAY_MS`
    #[serde(default = "default_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    ///
    /// Environment variable: `RELAY_RETRY_MAX_DELAY_MS`
    #[serde(default = "default_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Jitter factor for retry timing (0.0 to 1.0).
    ///
    /// Environment variable: `RELAY_RETRY_JITTER_FACTOR`
    #[serde(default = "default_jitter_factor")]
    pub retry_jitter_factor: f64,
    /// Backoff curve between retries: `exponential`, `linear`, or `fixed`.
    ///
    /// Environment variable: `RELAY_RETRY_BACKOFF_STRATEGY`
    #[serde(default = "default_backoff_strategy")]
    pub retry_backoff_strategy: BackoffStrategy,
    /// User agent sent with every delivery.
    ///
    /// Environment variable: `RELAY_USER_AGENT`
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // Logging
    /// Log filter used when `RUST_LOG` is not set.
    ///
    /// Environment variable: `RELAY_RUST_LOG`
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, `relay.toml`, and `RELAY_*`
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// The provider stack `load` reads from.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extracts and validates configuration from a provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to the dispatcher's configuration.
    pub fn to_dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            workflows: self.workflows.clone(),
            shared_secret: self.shared_secret.clone(),
            signature_algorithm: self.signature_algorithm,
            channels: self.channels.clone(),
        }
    }

    /// Convert to transport configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.timeout_seconds),
            user_agent: self.user_agent.clone(),
            ..ClientConfig::default()
        }
    }

    /// Convert to the transport retry policy.
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            jitter_factor: self.retry_jitter_factor,
            backoff_strategy: self.retry_backoff_strategy,
        }
    }

    /// Returns true if deliveries will be signed.
    pub fn is_signing_enabled(&self) -> bool {
        self.shared_secret.as_deref().is_some_and(|secret| !secret.is_empty())
    }

    /// Logs each configured workflow that dispatch will skip.
    ///
    /// Malformed entries are not fatal; they are simply never delivered to.
    pub fn warn_invalid_workflows(&self) -> usize {
        let invalid = invalid_endpoints(&self.workflows);
        for workflow in &invalid {
            warn!(workflow = %workflow, "Ignoring malformed workflow url");
        }
        invalid.len()
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            anyhow::bail!("timeout_seconds must be greater than 0");
        }

        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            anyhow::bail!("retry_base_delay_ms cannot exceed retry_max_delay_ms");
        }

        if !(0.0..=1.0).contains(&self.retry_jitter_factor) {
            anyhow::bail!("retry_jitter_factor must be between 0.0 and 1.0");
        }

        if self.user_agent.trim().is_empty() {
            anyhow::bail!("user_agent must not be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflows: Vec::new(),
            shared_secret: None,
            signature_algorithm: SignatureAlgorithm::default(),
            channels: default_channels(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_base_delay_ms(),
            retry_max_delay_ms: default_max_delay_ms(),
            retry_jitter_factor: default_jitter_factor(),
            retry_backoff_strategy: default_backoff_strategy(),
            user_agent: default_user_agent(),
            rust_log: default_log_level(),
        }
    }
}

/// Accepts a list or a comma-separated string.
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        List(Vec<String>),
        String(String),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::List(list) => list,
        StringOrList::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

fn default_channels() -> Vec<Channel> {
    vec![Channel::Server, Channel::Mobile, Channel::Client]
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_jitter_factor() -> f64 {
    0.25
}

fn default_backoff_strategy() -> BackoffStrategy {
    BackoffStrategy::Exponential
}

fn default_user_agent() -> String {
    format!("relay/{}", env!("CARGO_PKG_VERSION"))
}

fn default_log_level() -> String {
    "info".to_string()
}
