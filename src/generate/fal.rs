use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::provider::{read_json, ImageProvider, ProviderError, ProviderImage, ProviderRequest};

pub const FAL_MODEL: &str = "fal-ai/illusion-diffusion";
pub const DEFAULT_FAL_BASE_URL: &str = "https://queue.fal.run";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// fal.ai queue API: submit, poll the status URL, then fetch the result.
/// The attempt timeout applied by the orchestrator bounds the polling.
pub struct FalProvider {
    client: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
}

#[derive(Deserialize)]
struct QueueTicket {
    status_url: String,
    response_url: String,
}

#[derive(Deserialize)]
struct QueueStatus {
    status: String,
}

#[derive(Deserialize)]
struct FalImage {
    url: String,
}

#[derive(Deserialize)]
struct FalResult {
    image: Option<FalImage>,
    #[serde(default)]
    images: Vec<FalImage>,
}

impl FalProvider {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn auth(&self) -> String {
        format!("Key {}", self.api_key)
    }

    async fn wait_until_done(&self, status_url: &str) -> Result<(), ProviderError> {
        loop {
            let resp = self.client.get(status_url).header("Authorization", self.auth()).send().await?;
            let QueueStatus { status } = read_json(resp).await?;
            debug!(%status, "fal queue status");
            match status.as_str() {
                "COMPLETED" => return Ok(()),
                "IN_QUEUE" | "IN_PROGRESS" => tokio::time::sleep(self.poll_interval).await,
                other => {
                    return Err(ProviderError::MalformedResponse(format!("queue status {other}")))
                }
            }
        }
    }
}

#[async_trait]
impl ImageProvider for FalProvider {
    fn name(&self) -> &str {
        "fal"
    }

    async fn submit(&self, req: &ProviderRequest) -> Result<ProviderImage, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingCredential("FAL_KEY"));
        }
        let qr = req.conditioning.first().ok_or_else(|| {
            ProviderError::InvalidRequest("illusion diffusion needs a QR image".to_string())
        })?;
        let body = json!({
            "prompt": req.prompt,
            "image_url": format!("data:image/png;base64,{}", STANDARD.encode(qr)),
            "image_size": { "width": req.size, "height": req.size },
        });

        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, FAL_MODEL))
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await?;
        let ticket: QueueTicket = read_json(resp).await?;
        self.wait_until_done(&ticket.status_url).await?;

        let resp =
            self.client.get(&ticket.response_url).header("Authorization", self.auth()).send().await?;
        let result: FalResult = read_json(resp).await?;
        result
            .image
            .or_else(|| result.images.into_iter().next())
            .map(|img| ProviderImage::Url(img.url))
            .ok_or(ProviderError::NoImage)
    }
}
