use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::provider::{read_json, ImageProvider, ProviderError, ProviderImage, ProviderRequest};

pub const OPENAI_MODEL: &str = "gpt-image-1";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// OpenAI images API. Uses `/v1/images/edits` when conditioning images are
/// present, `/v1/images/generations` otherwise.
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

impl OpenAiProvider {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn edits_form(req: &ProviderRequest, size: &str) -> Result<Form, ProviderError> {
        let mut form = Form::new()
            .text("model", OPENAI_MODEL)
            .text("prompt", req.prompt.clone())
            .text("size", size.to_string())
            .text("n", "1");
        for (i, png) in req.conditioning.iter().enumerate() {
            let part = Part::bytes(png.clone())
                .file_name(format!("image_{i}.png"))
                .mime_str("image/png")?;
            form = form.part("image[]", part);
        }
        Ok(form)
    }
}

#[async_trait]
impl ImageProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn submit(&self, req: &ProviderRequest) -> Result<ProviderImage, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingCredential("OPENAI_API_KEY"));
        }
        let size = format!("{0}x{0}", req.size);

        let builder = if req.conditioning.is_empty() {
            let body = json!({ "model": OPENAI_MODEL, "prompt": req.prompt, "n": 1, "size": size });
            self.client.post(format!("{}/v1/images/generations", self.base_url)).json(&body)
        } else {
            let form = Self::edits_form(req, &size)?;
            self.client.post(format!("{}/v1/images/edits", self.base_url)).multipart(form)
        };
        debug!(images = req.conditioning.len(), "Calling OpenAI images API");

        let resp = builder.bearer_auth(&self.api_key).send().await?;
        let parsed: ImagesResponse = read_json(resp).await?;

        let datum = parsed.data.into_iter().next().ok_or(ProviderError::NoImage)?;
        match (datum.b64_json, datum.url) {
            (Some(b64), _) => STANDARD
                .decode(b64)
                .map(ProviderImage::Bytes)
                .map_err(|e| ProviderError::MalformedResponse(e.to_string())),
            (None, Some(url)) => Ok(ProviderImage::Url(url)),
            (None, None) => Err(ProviderError::NoImage),
        }
    }
}
