//! Reference image retrieval. Any failure to fetch or decode surfaces as
//! [`ArtError::ReferenceImageUnavailable`].

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use reqwest::Client;
use tracing::debug;

use crate::error::ArtError;

/// Largest image body accepted from a URL.
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceImage {
    Bytes(Vec<u8>),
    /// `http(s)://` or base64 `data:` URL.
    Url(String),
}

#[derive(Debug, Clone)]
pub struct ReferenceFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: usize,
}

impl ReferenceFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout, max_bytes: MAX_IMAGE_BYTES }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub async fn fetch(&self, reference: &ReferenceImage) -> Result<Vec<u8>, ArtError> {
        match reference {
            ReferenceImage::Bytes(bytes) if bytes.is_empty() => {
                Err(ArtError::ReferenceImageUnavailable("empty image bytes".to_string()))
            }
            ReferenceImage::Bytes(bytes) => Ok(bytes.clone()),
            ReferenceImage::Url(url) => self.fetch_url(url).await,
        }
    }

    pub async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, ArtError> {
        if url.starts_with("data:") {
            let bytes = decode_data_url(url)?;
            return self.within_limit(bytes.len()).map(|_| bytes);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(unavailable(format!("unsupported URL scheme in {url}")));
        }

        debug!(url, timeout = ?self.timeout, "Fetching image");
        let mut resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {} from {url}", status.as_u16())));
        }
        if let Some(len) = resp.content_length() {
            self.within_limit(len as usize)?;
        }

        // Content-Length can be missing, cap while streaming too
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| unavailable(e.to_string()))? {
            self.within_limit(body.len() + chunk.len())?;
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn within_limit(&self, len: usize) -> Result<(), ArtError> {
        if len > self.max_bytes {
            return Err(unavailable(format!("image is larger than {} bytes", self.max_bytes)));
        }
        Ok(())
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ArtError> {
    image::load_from_memory(bytes).map_err(|e| unavailable(format!("undecodable image: {e}")))
}

fn decode_data_url(url: &str) -> Result<Vec<u8>, ArtError> {
    let (header, data) =
        url.split_once(',').ok_or_else(|| unavailable("data URL without payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(unavailable("only base64 data URLs are supported".to_string()));
    }
    STANDARD.decode(data.trim()).map_err(|e| unavailable(format!("bad base64: {e}")))
}

fn unavailable(reason: String) -> ArtError {
    ArtError::ReferenceImageUnavailable(reason)
}
