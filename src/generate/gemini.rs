use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::provider::{read_json, ImageProvider, ProviderError, ProviderImage, ProviderRequest};

pub const GEMINI_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: String,
}

impl GeminiProvider {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn body(req: &ProviderRequest) -> Value {
        let mut parts = vec![json!({ "text": req.prompt })];
        parts.extend(req.conditioning.iter().map(|png| {
            json!({ "inline_data": { "mime_type": "image/png", "data": STANDARD.encode(png) } })
        }));
        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] },
        })
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn submit(&self, req: &ProviderRequest) -> Result<ProviderImage, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingCredential("GEMINI_API_KEY"));
        }
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, GEMINI_MODEL);
        debug!(images = req.conditioning.len(), "Calling Gemini generateContent");

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::body(req))
            .send()
            .await?;
        let parsed: GenerateContentResponse = read_json(resp).await?;

        let inline = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data)
            .ok_or(ProviderError::NoImage)?;
        STANDARD
            .decode(inline.data)
            .map(ProviderImage::Bytes)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}
