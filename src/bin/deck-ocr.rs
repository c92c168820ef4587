//! CLI binary: OCR one slide image into Markdown.
//!
//! A thin shim over the library crate. The API key arrives as a positional
//! argument, so this binary never echoes argument values: usage errors carry
//! clap's generic description only, and `Cli` has no `Debug`.

use anyhow::Result;
use clap::Parser;
use deck_ocr::cli::{emit, init_tracing, parse_args};
use deck_ocr::config::DEFAULT_BASE_URL;
use deck_ocr::{extract, Envelope, OcrConfig, OcrRequest, DEFAULT_MODEL};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a rendered slide with the default model
  deck-ocr slides/slide-01.png "$MISTRAL_API_KEY"

  # Pick a model and bound the request time
  deck-ocr slides/slide-02.png "$MISTRAL_API_KEY" pixtral-large-latest --timeout 60

OUTPUT:
  Success (stdout): {"success":true,"markdown":"...","dimensions":{"width":W,"height":H},"model":"..."}
  Failure (stderr): {"success":false,"error":"<Kind>","message":"..."}
  Exit code 0 on success, 1 on any failure.

ENVIRONMENT VARIABLES:
  DECK_OCR_MODEL    Default model id (pixtral-12b-2409)
  MISTRAL_BASE_URL  API root (https://api.mistral.ai/v1)
  RUST_LOG          Log filter for stderr diagnostics (default: off)
"#;

/// Extract Markdown from a slide image with a Mistral vision model.
#[derive(Parser)]
#[command(
    name = "deck-ocr",
    version,
    about = "Extract Markdown from a slide image with a Mistral vision model",
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Slide image (PNG).
    image: PathBuf,

    /// Mistral API key.
    api_key: String,

    /// Vision model id.
    #[arg(env = "DECK_OCR_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// API root; /chat/completions is appended.
    #[arg(long, env = "MISTRAL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Sampling temperature (0.0 to 2.0).
    #[arg(long)]
    temperature: Option<f32>,

    /// Completion token limit.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Give up on the provider after this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs on stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = match parse_args::<Cli>(false) {
        Ok(cli) => cli,
        Err(code) => return Ok(code),
    };
    init_tracing(cli.verbose);

    let mut builder = OcrConfig::builder().base_url(cli.base_url);
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => return emit(&Envelope::<()>::from_error(&e)),
    };

    let request = OcrRequest::new(cli.image, cli.api_key, cli.model);
    let result = extract(&request, &config).await;
    emit(&result)
}
