use std::env::vars;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::generate::{
    fal::DEFAULT_FAL_BASE_URL, gemini::DEFAULT_GEMINI_BASE_URL, openai::DEFAULT_OPENAI_BASE_URL,
    RetryPolicy, DEFAULT_PROVIDER_ORDER,
};

const DEFAULT_REFERENCE_TIMEOUT_SECS: u64 = 15;

// The final, validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Provider credentials, a provider is only registered when its key is set
    openai_api_key: Option<String>,
    gemini_api_key: Option<String>,
    fal_key: Option<String>,
    openai_base_url: String,
    gemini_base_url: String,
    fal_base_url: String,
    provider_order: Vec<String>,
    retry_policy: RetryPolicy,
    reference_timeout: Duration,
    local_fallback: bool,
    prefer_verified: bool,
}

// An intermediate struct for deserializing environment variables where
// everything is optional.
#[derive(Deserialize)]
struct RawConfig {
    openai_api_key: Option<String>,
    gemini_api_key: Option<String>,
    fal_key: Option<String>,
    openai_base_url: Option<String>,
    gemini_base_url: Option<String>,
    fal_base_url: Option<String>,
    // Comma separated provider names
    provider_order: Option<String>,
    provider_attempts: Option<u32>,
    provider_retry_delay_ms: Option<u64>,
    provider_timeout_secs: Option<u64>,
    reference_timeout_secs: Option<u64>,
    local_fallback: Option<bool>,
    prefer_verified: Option<bool>,
}

impl Config {
    /// Credential-free configuration with default policies.
    ///
    /// Available to unit and integration tests. Not meant for production.
    pub fn new_for_test() -> Self {
        Self {
            openai_api_key: None,
            gemini_api_key: None,
            fal_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            fal_base_url: DEFAULT_FAL_BASE_URL.to_string(),
            provider_order: DEFAULT_PROVIDER_ORDER.map(String::from).to_vec(),
            retry_policy: RetryPolicy::default(),
            reference_timeout: Duration::from_secs(DEFAULT_REFERENCE_TIMEOUT_SECS),
            local_fallback: true,
            prefer_verified: true,
        }
    }

    pub fn openai_api_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref()
    }

    pub fn gemini_api_key(&self) -> Option<&str> {
        self.gemini_api_key.as_deref()
    }

    pub fn fal_key(&self) -> Option<&str> {
        self.fal_key.as_deref()
    }

    pub fn openai_base_url(&self) -> &str {
        &self.openai_base_url
    }

    pub fn gemini_base_url(&self) -> &str {
        &self.gemini_base_url
    }

    pub fn fal_base_url(&self) -> &str {
        &self.fal_base_url
    }

    pub fn provider_order(&self) -> &[String] {
        &self.provider_order
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    pub fn reference_timeout(&self) -> Duration {
        self.reference_timeout
    }

    /// Whether exhausted generation falls back to the local plain render.
    pub fn local_fallback(&self) -> bool {
        self.local_fallback
    }

    pub fn prefer_verified(&self) -> bool {
        self.prefer_verified
    }

    pub fn with_local_fallback(mut self, enabled: bool) -> Self {
        self.local_fallback = enabled;
        self
    }

    pub fn with_prefer_verified(mut self, enabled: bool) -> Self {
        self.prefer_verified = enabled;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Initializes configuration by reading environment variables and
    /// applying defaults.
    pub fn init() -> anyhow::Result<Self> {
        info!("Loading configuration from environment variables");

        let raw_config: RawConfig = serde_env::from_iter(vars())?;
        Self::from_raw(raw_config)
    }

    fn from_raw(raw_config: RawConfig) -> anyhow::Result<Self> {
        let RawConfig {
            openai_api_key,
            gemini_api_key,
            fal_key,
            openai_base_url,
            gemini_base_url,
            fal_base_url,
            provider_order,
            provider_attempts,
            provider_retry_delay_ms,
            provider_timeout_secs,
            reference_timeout_secs,
            local_fallback,
            prefer_verified,
        } = raw_config;

        let provider_order = match provider_order {
            Some(order) => {
                let names: Vec<String> = order
                    .split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                if let Some(bad) = names.iter().find(|n| !DEFAULT_PROVIDER_ORDER.contains(&n.as_str())) {
                    anyhow::bail!(
                        "PROVIDER_ORDER contains unknown provider {bad}, expected any of {}",
                        DEFAULT_PROVIDER_ORDER.join(",")
                    );
                }
                info!("Using provided PROVIDER_ORDER: {}", names.join(","));
                names
            }
            None => DEFAULT_PROVIDER_ORDER.map(String::from).to_vec(),
        };

        let defaults = RetryPolicy::default();
        let attempts = provider_attempts.unwrap_or(defaults.attempts);
        if attempts == 0 {
            anyhow::bail!("PROVIDER_ATTEMPTS must be at least 1");
        }
        let timeout = provider_timeout_secs.map(Duration::from_secs).unwrap_or(defaults.timeout);
        if timeout.is_zero() {
            anyhow::bail!("PROVIDER_TIMEOUT_SECS must be greater than 0");
        }
        let retry_policy = RetryPolicy {
            attempts,
            delay: provider_retry_delay_ms.map(Duration::from_millis).unwrap_or(defaults.delay),
            timeout,
        };

        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let config = Self {
            openai_api_key: non_empty(openai_api_key),
            gemini_api_key: non_empty(gemini_api_key),
            fal_key: non_empty(fal_key),
            openai_base_url: openai_base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            gemini_base_url: gemini_base_url.unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            fal_base_url: fal_base_url.unwrap_or_else(|| DEFAULT_FAL_BASE_URL.to_string()),
            provider_order,
            retry_policy,
            reference_timeout: Duration::from_secs(
                reference_timeout_secs.unwrap_or(DEFAULT_REFERENCE_TIMEOUT_SECS),
            ),
            local_fallback: local_fallback.unwrap_or(true),
            prefer_verified: prefer_verified.unwrap_or(true),
        };

        let configured: Vec<&str> = config
            .provider_order
            .iter()
            .map(String::as_str)
            .filter(|name| match *name {
                "fal" => config.fal_key.is_some(),
                "gemini" => config.gemini_api_key.is_some(),
                _ => config.openai_api_key.is_some(),
            })
            .collect();
        info!(providers = ?configured, "Configured generation providers");

        Ok(config)
    }
}
