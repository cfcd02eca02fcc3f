use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use qrart::{ArtRequest, Config, Pipeline, ProviderKind, ReferenceImage, StyleId, StyleParameters};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qrart")]
#[command(about = "Turn a URL into a styled, scannable QR code", long_about = None)]
struct Cli {
    /// Text or URL to encode
    payload: String,

    /// plain, dots, rounded, bubble, pseudo3d, tricolor, ai-overlay or ai-blend
    #[arg(long, short = 's', default_value = "plain")]
    style: String,

    /// Reference image, as a file path or an http(s)/data URL
    #[arg(long, short = 'r')]
    reference: Option<String>,

    /// Provider to try first for AI styles
    #[arg(long, short = 'p')]
    provider: Option<ProviderKind>,

    /// Free text style description for AI prompts
    #[arg(long, short = 'd')]
    description: Option<String>,

    /// Overlay opacity for ai-overlay, clamped to [0.5, 1.0]
    #[arg(long)]
    opacity: Option<f32>,

    /// Give up on providers after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Output PNG path
    #[arg(long, short = 'o', default_value = "qrart.png")]
    output: PathBuf,
}

fn reference_from_arg(arg: String) -> Result<ReferenceImage> {
    if arg.starts_with("http://") || arg.starts_with("https://") || arg.starts_with("data:") {
        return Ok(ReferenceImage::Url(arg));
    }
    let bytes = std::fs::read(&arg).with_context(|| format!("Failed to read reference {arg}"))?;
    Ok(ReferenceImage::Bytes(bytes))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,qrart=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::init()?;
    let pipeline = Pipeline::from_config(config)?;

    let mut req = ArtRequest::new(cli.payload, cli.style.parse::<StyleId>()?).with_parameters(
        StyleParameters { description: cli.description, qr_opacity: cli.opacity },
    );
    if let Some(reference) = cli.reference {
        req = req.with_reference(reference_from_arg(reference)?);
    }
    if let Some(provider) = cli.provider {
        req = req.with_provider(provider);
    }
    if let Some(secs) = cli.deadline_secs {
        req = req.with_deadline(Duration::from_secs(secs));
    }

    let res = pipeline.run(req).await?;
    std::fs::write(&cli.output, &res.artifact)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    info!(path = %cli.output.display(), bytes = res.artifact.len(), "Artifact written");

    println!("producedBy: {}", res.produced_by);
    println!("verified: {}", res.verified);
    Ok(())
}
