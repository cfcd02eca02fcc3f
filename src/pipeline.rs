//! Request level orchestration: encode, style, composite, optionally hand off
//! to a generative provider, then verify.

use std::fmt::{Display, Formatter};
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbaImage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::builder::{encode, QR};
use crate::common::ECLevel;
use crate::compose::{compose, Recipe, CANVAS_SIZE};
use crate::config::Config;
use crate::error::ArtError;
use crate::generate::{
    GenerationJob, GenerationState, Orchestrator, OrchestratorError, ProviderImage,
};
use crate::reference::{decode_image, ReferenceFetcher, ReferenceImage};
use crate::style::{extract_palette, Color, Palette, RenderOptions, Style, DEFAULT_OVERLAY_OPACITY};
use crate::verify::verify;

/// Name reported for the guaranteed-scannable local render.
pub const SAFE_FALLBACK: &str = "local:plain";

const MIN_OVERLAY_OPACITY: f32 = 0.5;

// Request types
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleId {
    Plain,
    Dots,
    Rounded,
    Bubble,
    #[serde(rename = "pseudo3d")]
    Pseudo3d,
    Tricolor,
    AiOverlay,
    AiBlend,
}

impl StyleId {
    pub const ALL: [StyleId; 8] = [
        Self::Plain,
        Self::Dots,
        Self::Rounded,
        Self::Bubble,
        Self::Pseudo3d,
        Self::Tricolor,
        Self::AiOverlay,
        Self::AiBlend,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Dots => "dots",
            Self::Rounded => "rounded",
            Self::Bubble => "bubble",
            Self::Pseudo3d => "pseudo3d",
            Self::Tricolor => "tricolor",
            Self::AiOverlay => "ai-overlay",
            Self::AiBlend => "ai-blend",
        }
    }

    /// Styles whose final artifact comes from a generative provider.
    pub fn is_ai(self) -> bool {
        matches!(self, Self::AiOverlay | Self::AiBlend)
    }

    pub fn needs_reference(self) -> bool {
        matches!(self, Self::AiBlend)
    }

    /// Recipe used when a background is present.
    pub fn recipe(self) -> Recipe {
        match self {
            Self::Plain | Self::Dots | Self::Rounded | Self::Bubble => Recipe::FrostedGlass,
            Self::Pseudo3d | Self::Tricolor => Recipe::Hybrid,
            Self::AiOverlay => Recipe::DirectOverlay,
            Self::AiBlend => Recipe::TransparentBlend,
        }
    }

    fn renderer(self, dominant: Color, palette: &Palette, opacity: f32) -> Style {
        match self {
            Self::Plain => Style::Plain,
            Self::Dots => Style::Dotted,
            Self::Rounded => Style::Rounded,
            Self::Bubble => Style::Bubble { color: dominant },
            Self::Pseudo3d => Style::Pseudo3d { color: dominant },
            Self::Tricolor => Style::Tricolor { colors: palette.triad() },
            Self::AiOverlay => Style::TransparentOverlay { opacity, blend: false },
            Self::AiBlend => Style::TransparentOverlay { opacity: 1.0, blend: true },
        }
    }
}

impl Display for StyleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleId {
    type Err = ArtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ArtError::UnknownStyle(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Fal,
    Gemini,
    Openai,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fal => "fal",
            Self::Gemini => "gemini",
            Self::Openai => "openai",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fal" => Ok(Self::Fal),
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::Openai),
            other => Err(format!("unknown provider {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleParameters {
    pub description: Option<String>,
    pub qr_opacity: Option<f32>,
}

impl StyleParameters {
    /// Transparent overlay opacity, clamped to `[0.5, 1.0]`.
    pub fn opacity(&self) -> f32 {
        self.qr_opacity
            .filter(|o| o.is_finite())
            .unwrap_or(DEFAULT_OVERLAY_OPACITY)
            .clamp(MIN_OVERLAY_OPACITY, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct ArtRequest {
    pub payload: String,
    pub reference: Option<ReferenceImage>,
    pub style: StyleId,
    pub provider_preference: Option<ProviderKind>,
    pub parameters: StyleParameters,
    /// Budget for the whole request, measured from the start of `run`.
    pub deadline: Option<Duration>,
}

impl ArtRequest {
    pub fn new(payload: impl Into<String>, style: StyleId) -> Self {
        Self {
            payload: payload.into(),
            reference: None,
            style,
            provider_preference: None,
            parameters: StyleParameters::default(),
            deadline: None,
        }
    }

    pub fn with_reference(mut self, reference: ReferenceImage) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider_preference = Some(provider);
        self
    }

    pub fn with_parameters(mut self, parameters: StyleParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// JSON request body as sent by the web front end.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub url: String,
    /// `data:` or `http(s)://` URL of the reference image.
    pub image: Option<String>,
    pub style_id: String,
    pub provider_preference: Option<ProviderKind>,
    #[serde(default)]
    pub style_parameters: StyleParameters,
    pub deadline_ms: Option<u64>,
}

impl TryFrom<RequestBody> for ArtRequest {
    type Error = ArtError;

    fn try_from(body: RequestBody) -> Result<Self, Self::Error> {
        Ok(Self {
            payload: body.url,
            reference: body.image.filter(|s| !s.is_empty()).map(ReferenceImage::Url),
            style: body.style_id.parse()?,
            provider_preference: body.provider_preference,
            parameters: body.style_parameters,
            deadline: body.deadline_ms.map(Duration::from_millis),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ArtResponse {
    /// PNG bytes.
    pub artifact: Vec<u8>,
    pub produced_by: String,
    pub verified: bool,
    /// Orchestrator states, empty for local renders.
    pub trail: Vec<GenerationState>,
}

impl ArtResponse {
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.artifact))
    }
}

// Pipeline
//------------------------------------------------------------------------------

pub struct Pipeline {
    config: Config,
    fetcher: ReferenceFetcher,
    orchestrator: Orchestrator,
    render: RenderOptions,
}

impl Pipeline {
    pub fn new(config: Config, orchestrator: Orchestrator, fetcher: ReferenceFetcher) -> Self {
        Self { config, fetcher, orchestrator, render: RenderOptions::default() }
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let client = Client::builder().build()?;
        let fetcher = ReferenceFetcher::new(client.clone(), config.reference_timeout());
        let orchestrator = Orchestrator::from_config(&config, client);
        Ok(Self::new(config, orchestrator, fetcher))
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self, req: ArtRequest) -> Result<ArtResponse, ArtError> {
        let deadline = req.deadline.map(|d| Instant::now() + d);
        info!(style = %req.style, len = req.payload.len(), "Art request received");

        let payload = req.payload.clone();
        let qr = Arc::new(blocking(move || Ok(encode(&payload, ECLevel::H)?)).await?);

        let background = Arc::new(self.background(&req).await?);

        let composite = {
            let (qr, background) = (qr.clone(), background.clone());
            let (style, opacity, render) = (req.style, req.parameters.opacity(), self.render);
            blocking(move || render_local(style, &qr, (*background).as_ref(), opacity, render))
                .await?
        };

        if !req.style.is_ai() {
            let produced_by = format!("local:{}", req.style);
            let response = self.finish(composite, produced_by, &req.payload, vec![]).await?;
            info!(produced_by = %response.produced_by, verified = response.verified, "Art request done");
            return Ok(response);
        }

        let conditioning = blocking(move || encode_png(&composite)).await?;
        let job = GenerationJob {
            payload: req.payload.clone(),
            description: req.parameters.description.clone(),
            conditioning: vec![conditioning],
            size: CANVAS_SIZE,
        };
        let preference = req.provider_preference.map(ProviderKind::as_str);

        let (error, trail) = match self.orchestrator.generate(&job, preference, deadline).await {
            Ok(generated) => match self.resolve(generated.image, deadline).await {
                Ok(image) => {
                    let response =
                        self.finish(image, generated.provider, &req.payload, generated.trail).await?;
                    return self.prefer_verified(response, &qr, &background, &req.payload).await;
                }
                Err(ArtError::Generation(error)) => {
                    warn!(provider = %generated.provider, "Deadline passed while fetching image");
                    (error, generated.trail)
                }
                Err(e) => {
                    warn!(provider = %generated.provider, error = %e, "Provider image unusable");
                    (OrchestratorError::Exhausted { tiers: 1, last: e.to_string() }, generated.trail)
                }
            },
            Err(failure) => (failure.error, failure.trail),
        };

        if !self.config.local_fallback() {
            return Err(ArtError::Generation(error));
        }
        warn!(error = %error, "Generation failed, returning local safe render");
        let safe = self.safe_render(&qr, &background).await?;
        self.finish(safe, SAFE_FALLBACK.to_string(), &req.payload, trail).await
    }

    // Loads the reference, substituting defaults when the style allows it
    async fn background(&self, req: &ArtRequest) -> Result<Option<DynamicImage>, ArtError> {
        let Some(reference) = &req.reference else {
            if req.style.needs_reference() {
                return Err(ArtError::ReferenceImageMissing);
            }
            return Ok(None);
        };

        let loaded = match self.fetcher.fetch(reference).await {
            Ok(bytes) => blocking(move || decode_image(&bytes)).await,
            Err(e) => Err(e),
        };
        match loaded {
            Ok(img) => {
                debug!(width = img.width(), height = img.height(), "Reference image loaded");
                Ok(Some(img))
            }
            Err(e) if !req.style.needs_reference() => {
                warn!(error = %e, style = %req.style, "Reference unavailable, using defaults");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // URL results are fetched within whatever is left of the deadline
    async fn resolve(
        &self,
        image: ProviderImage,
        deadline: Option<Instant>,
    ) -> Result<RgbaImage, ArtError> {
        let bytes = match (image, deadline) {
            (ProviderImage::Bytes(bytes), _) => bytes,
            (ProviderImage::Url(url), None) => self.fetcher.fetch_url(&url).await?,
            (ProviderImage::Url(url), Some(d)) => {
                tokio::time::timeout_at(d, self.fetcher.fetch_url(&url))
                    .await
                    .map_err(|_| ArtError::Generation(OrchestratorError::DeadlineExceeded))??
            }
        };
        blocking(move || Ok(decode_image(&bytes)?.to_rgba8())).await
    }

    async fn safe_render(
        &self,
        qr: &Arc<QR>,
        background: &Arc<Option<DynamicImage>>,
    ) -> Result<RgbaImage, ArtError> {
        let (qr, background, render) = (qr.clone(), background.clone(), self.render);
        blocking(move || {
            let plain = Style::Plain.render(&qr, render);
            match &*background {
                Some(bg) => compose(Recipe::FrostedGlass, &bg.to_rgba8(), &plain),
                None => Ok(plain),
            }
        })
        .await
    }

    // An unverified AI artifact is swapped for the safe render when that one scans
    async fn prefer_verified(
        &self,
        response: ArtResponse,
        qr: &Arc<QR>,
        background: &Arc<Option<DynamicImage>>,
        payload: &str,
    ) -> Result<ArtResponse, ArtError> {
        if response.verified || !self.config.prefer_verified() {
            info!(produced_by = %response.produced_by, verified = response.verified, "Art request done");
            return Ok(response);
        }
        warn!(provider = %response.produced_by, "Generated image does not scan, trying safe render");
        let safe = self.safe_render(qr, background).await?;
        let trail = response.trail.clone();
        let fallback = self.finish(safe, SAFE_FALLBACK.to_string(), payload, trail).await?;
        let chosen = if fallback.verified { fallback } else { response };
        info!(produced_by = %chosen.produced_by, verified = chosen.verified, "Art request done");
        Ok(chosen)
    }

    // Verifies and PNG encodes off the async workers
    async fn finish(
        &self,
        image: RgbaImage,
        produced_by: String,
        payload: &str,
        trail: Vec<GenerationState>,
    ) -> Result<ArtResponse, ArtError> {
        let payload = payload.to_string();
        let (verified, artifact) =
            blocking(move || Ok((verify(&image, &payload), encode_png(&image)?))).await?;
        Ok(ArtResponse { artifact, produced_by, verified, trail })
    }
}

fn render_local(
    style: StyleId,
    qr: &QR,
    background: Option<&DynamicImage>,
    opacity: f32,
    render: RenderOptions,
) -> Result<RgbaImage, ArtError> {
    let (dominant, palette) = match background {
        Some(bg) => extract_palette(bg),
        None => (Color::default(), Palette::default()),
    };
    let renderer = style.renderer(dominant, &palette, opacity);
    let styled = renderer.render(qr, render);
    debug!(style = %style, renderer = renderer.name(), "Rendered QR");

    match (style, background) {
        (StyleId::AiOverlay, None) => {
            let white = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Color::WHITE.to_rgba(255));
            compose(Recipe::DirectOverlay, &white, &styled)
        }
        (_, None) => Ok(styled),
        (_, Some(bg)) => compose(style.recipe(), &bg.to_rgba8(), &styled),
    }
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ArtError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

async fn blocking<T, F>(f: F) -> Result<T, ArtError>
where
    F: FnOnce() -> Result<T, ArtError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| ArtError::Render(e.to_string()))?
}
