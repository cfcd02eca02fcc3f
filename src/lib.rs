//! # qrart
//!
//! Artistic QR code synthesis. A payload is encoded at the highest error
//! correction level, styled, optionally composited over a reference image
//! and handed to a generative image service, then decoded again to check
//! that the result still scans.
//!
//! ## Features
//!
//! - **QR Encoding**: Model 2 symbols, versions 1-40, Reed-Solomon error correction (L, M, Q, H)
//! - **Styles**: plain, dotted, rounded, bubble, pseudo-3D, tricolor and transparent overlays
//! - **Color Extraction**: scan-safe dominant color and triadic palette from a reference image
//! - **Compositing**: frosted glass, direct overlay, transparent blend and multiply hybrid recipes
//! - **Generation**: fal, Gemini and OpenAI providers behind one trait, with retries and fallback
//! - **Verification**: every artifact is decoded and compared against its payload
//!
//! ## Quick Start
//!
//! ### Styled QR Code
//!
//! ```rust
//! use qrart::{encode, verify, ECLevel, RenderOptions, Style};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let qr = encode("https://example.com", ECLevel::H)?;
//! let img = Style::Rounded.render(&qr, RenderOptions::default());
//!
//! assert!(verify(&img, "https://example.com"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Full Configuration
//!
//! ```rust
//! use qrart::{QRBuilder, ECLevel, MaskPattern, Version};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let qr = QRBuilder::new(b"Hello, World!")
//!     .version(Version::new(2)?)  // if not provided, finds smallest version to fit data
//!     .ec_level(ECLevel::M)       // if not provided, defaults to ECLevel::H
//!     .mask(MaskPattern::new(3)?) // if not provided, finds best mask based on penalty score
//!     .build()?;
//!
//! assert_eq!(qr.width(), 25);
//! # Ok(())
//! # }
//! ```
//!
//! ### Full Pipeline
//!
//! ```rust,no_run
//! use qrart::{ArtRequest, Config, Pipeline, StyleId};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pipeline = Pipeline::from_config(Config::init()?)?;
//! let res = pipeline.run(ArtRequest::new("https://example.com", StyleId::AiOverlay)).await?;
//! println!("{} verified={}", res.produced_by, res.verified);
//! std::fs::write("art.png", &res.artifact)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Scannability
//!
//! Every style keeps the quiet zone (4 modules) and paints finder patterns
//! as full squares. Extracted colors are clamped to a lightness of 20-45%
//! so modules keep contrast against white. Verification is advisory: an
//! artifact that fails to decode is returned with `verified == false`, and
//! the pipeline swaps in a plain render when that one scans instead.

#![allow(clippy::items_after_test_module)]

pub mod builder;
pub(crate) mod common;
pub mod compose;
pub mod config;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod reference;
pub mod style;
pub mod verify;

pub use builder::{encode, Module, QRBuilder, QR};
pub use common::error::{QRError, QRResult};
pub use common::mask::MaskPattern;
pub use common::metadata::{ECLevel, Shade, Version};
pub use compose::{compose, Recipe, CANVAS_SIZE};
pub use config::Config;
pub use error::ArtError;
pub use generate::{
    GenerationJob, GenerationState, ImageProvider, Orchestrator, OrchestratorError, ProviderError,
    ProviderImage, ProviderRequest, RetryPolicy,
};
pub use pipeline::{ArtRequest, ArtResponse, Pipeline, ProviderKind, StyleId, StyleParameters};
pub use reference::{ReferenceFetcher, ReferenceImage};
pub use style::{extract_dominant, extract_palette, Color, Hsl, Palette, RenderOptions, Style};
pub use verify::{scan, verify};
