//! Generative image orchestration.
//!
//! The [`Orchestrator`] walks an ordered list of [`ImageProvider`] tiers.
//! Each tier gets [`RetryPolicy::attempts`] tries for transient failures; a
//! terminal failure, or running out of attempts, falls through to the next
//! tier. Every transition is recorded as a [`GenerationState`] so callers can
//! see what happened without the orchestrator exposing provider internals.

pub mod fal;
pub mod gemini;
pub mod openai;
pub mod prompt;
mod provider;
mod retry;

pub use prompt::{build_prompt, PromptCategory};
pub use provider::{ImageProvider, ProviderError, ProviderImage, ProviderRequest};
pub use retry::RetryPolicy;

use std::sync::Arc;

use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use fal::FalProvider;
use gemini::GeminiProvider;
use openai::OpenAiProvider;

/// Provider names in the default fallback order.
pub const DEFAULT_PROVIDER_ORDER: [&str; 3] = ["fal", "gemini", "openai"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    BuildingPrompt,
    CallingProvider { provider: String, attempt: u32 },
    RetryableFailure { provider: String, attempt: u32, error: String },
    Exhausted { provider: String, error: String },
    Fallback { provider: String },
    Success { provider: String },
    TerminalFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("No generation provider is configured")]
    NoProviders,

    #[error("All {tiers} provider tier(s) failed, last error: {last}")]
    Exhausted { tiers: usize, last: String },

    #[error("Deadline exceeded before a provider answered")]
    DeadlineExceeded,
}

/// Input for one generation. The prompt is built from `description`.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub payload: String,
    pub description: Option<String>,
    /// PNG encoded conditioning images, QR composite first.
    pub conditioning: Vec<Vec<u8>>,
    pub size: u32,
}

#[derive(Debug)]
pub struct Generated {
    pub image: ProviderImage,
    pub provider: String,
    pub trail: Vec<GenerationState>,
}

#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct GenerationFailure {
    pub error: OrchestratorError,
    pub trail: Vec<GenerationState>,
}

pub struct Orchestrator {
    providers: Vec<Arc<dyn ImageProvider>>,
    policy: RetryPolicy,
}

impl Orchestrator {
    pub fn new(providers: Vec<Arc<dyn ImageProvider>>, policy: RetryPolicy) -> Self {
        Self { providers, policy }
    }

    /// Registers every provider whose credential is configured, in the
    /// configured order.
    pub fn from_config(config: &Config, client: Client) -> Self {
        let mut providers: Vec<Arc<dyn ImageProvider>> = Vec::new();
        for name in config.provider_order() {
            let provider: Option<Arc<dyn ImageProvider>> = match name.as_str() {
                "fal" => config.fal_key().map(|key| -> Arc<dyn ImageProvider> {
                    Arc::new(FalProvider::new(client.clone(), config.fal_base_url(), key))
                }),
                "gemini" => config.gemini_api_key().map(|key| -> Arc<dyn ImageProvider> {
                    Arc::new(GeminiProvider::new(client.clone(), config.gemini_base_url(), key))
                }),
                "openai" => config.openai_api_key().map(|key| -> Arc<dyn ImageProvider> {
                    Arc::new(OpenAiProvider::new(client.clone(), config.openai_base_url(), key))
                }),
                other => {
                    warn!(provider = other, "Ignoring unknown provider in PROVIDER_ORDER");
                    None
                }
            };
            providers.extend(provider);
        }
        let orchestrator = Self::new(providers, config.retry_policy());
        debug!(providers = ?orchestrator.provider_names(), "Registered providers");
        orchestrator
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    // Preferred provider first, the rest keep their order
    fn ordered(&self, preference: Option<&str>) -> Vec<Arc<dyn ImageProvider>> {
        let mut order = self.providers.clone();
        if let Some(pref) = preference {
            if let Some(idx) = order.iter().position(|p| p.name() == pref) {
                let preferred = order.remove(idx);
                order.insert(0, preferred);
            } else {
                warn!(provider = pref, "Preferred provider is not configured");
            }
        }
        order
    }

    pub async fn generate(
        &self,
        job: &GenerationJob,
        preference: Option<&str>,
        deadline: Option<Instant>,
    ) -> Result<Generated, GenerationFailure> {
        let mut trail = vec![GenerationState::Idle];

        let tiers = self.ordered(preference);
        if tiers.is_empty() {
            return fail(OrchestratorError::NoProviders, trail);
        }

        trail.push(GenerationState::BuildingPrompt);
        let req = ProviderRequest {
            prompt: build_prompt(job.description.as_deref(), &job.payload),
            conditioning: job.conditioning.clone(),
            size: job.size,
        };

        let mut last = String::new();
        for (tier, provider) in tiers.iter().enumerate() {
            let name = provider.name().to_string();
            if tier > 0 {
                warn!(provider = %name, "Falling back to next provider");
                trail.push(GenerationState::Fallback { provider: name.clone() });
            }

            for attempt in 1..=self.policy.attempts.max(1) {
                let Some(timeout) = self.policy.attempt_timeout(deadline) else {
                    return fail(OrchestratorError::DeadlineExceeded, trail);
                };
                trail.push(GenerationState::CallingProvider { provider: name.clone(), attempt });
                debug!(provider = %name, attempt, ?timeout, "Calling provider");

                let err = match tokio::time::timeout(timeout, provider.submit(&req)).await {
                    Ok(Ok(image)) => {
                        info!(provider = %name, attempt, "Provider returned an image");
                        trail.push(GenerationState::Success { provider: name.clone() });
                        return Ok(Generated { image, provider: name, trail });
                    }
                    Ok(Err(e)) => e,
                    Err(_) => ProviderError::Timeout,
                };
                last = format!("{name}: {err}");

                let retry = err.is_transient() && attempt < self.policy.attempts;
                if !retry {
                    warn!(provider = %name, attempt, error = %err, "Provider tier exhausted");
                    trail.push(GenerationState::Exhausted {
                        provider: name.clone(),
                        error: err.to_string(),
                    });
                    break;
                }

                warn!(provider = %name, attempt, error = %err, "Retrying provider");
                trail.push(GenerationState::RetryableFailure {
                    provider: name.clone(),
                    attempt,
                    error: err.to_string(),
                });
                if let Some(d) = deadline {
                    if Instant::now() + self.policy.delay >= d {
                        tokio::time::sleep_until(d).await;
                        return fail(OrchestratorError::DeadlineExceeded, trail);
                    }
                }
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        fail(OrchestratorError::Exhausted { tiers: tiers.len(), last }, trail)
    }
}

fn fail(
    error: OrchestratorError,
    mut trail: Vec<GenerationState>,
) -> Result<Generated, GenerationFailure> {
    trail.push(GenerationState::TerminalFailure);
    Err(GenerationFailure { error, trail })
}
