use async_trait::async_trait;
use reqwest::Response;

/// Request handed to every provider. Conditioning images are PNG bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub prompt: String,
    pub conditioning: Vec<Vec<u8>>,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderImage {
    Bytes(Vec<u8>),
    /// `http(s)://` or `data:` URL.
    Url(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider returned no image")]
    NoImage,
}

impl ProviderError {
    /// Transient errors are retried; everything else ends the provider's tier.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Http { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::Http { status: status.as_u16(), body: e.to_string() }
        } else if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Maps non-2xx responses to [`ProviderError::Http`] carrying the body.
pub(crate) async fn check_status(resp: Response) -> Result<Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Http { status: status.as_u16(), body })
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    resp: Response,
) -> Result<T, ProviderError> {
    let text = check_status(resp).await?.text().await?;
    serde_json::from_str(&text).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

/// A generative image service. Implementations own their wire format; the
/// orchestrator only sees [`ProviderRequest`] in and [`ProviderImage`] out.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, req: &ProviderRequest) -> Result<ProviderImage, ProviderError>;
}
