//! # deck-ocr
//!
//! Turn slide decks into per-slide PNGs, and slide images into Markdown using
//! a Mistral vision model.
//!
//! ## Why two stages?
//!
//! Rendering needs a local office suite and is slow but deterministic; OCR
//! needs a network credential and costs money per call. Keeping them apart
//! lets callers render once, inspect or cache the PNGs, and OCR only the
//! slides they need, in whatever order and concurrency suits them.
//!
//! ## Pipeline Overview
//!
//! ```text
//! deck.pptx
//!  │
//!  ├─ 1. Locate  find LibreOffice for this host (or use an explicit path)
//!  ├─ 2. Export  headless LibreOffice → intermediate PDF (bounded by a timeout)
//!  ├─ 3. Render  rasterise every page via pdfium at the requested DPI
//!  ├─ 4. Write   slide-01.png, slide-02.png, …
//!  │
//! slide-NN.png
//!  │
//!  ├─ 5. Encode  PNG → base64 data URI
//!  ├─ 6. OCR     one chat completion against a Mistral vision model
//!  └─ 7. Output  trimmed Markdown + pixel dimensions + model id
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deck_ocr::{extract, render, OcrConfig, OcrRequest, RenderConfig, RenderRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = RenderRequest::new("deck.pptx", "slides", 150);
//!     let rendered = render(&request, &RenderConfig::default()).await?;
//!
//!     let key = std::env::var("MISTRAL_API_KEY")?;
//!     let config = OcrConfig::builder().build()?;
//!     for path in rendered.paths() {
//!         let result = extract(&OcrRequest::new(path, key.as_str(), "pixtral-12b-2409"), &config).await;
//!         println!("{}", result.to_json());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deck-render` and `deck-ocr` binaries (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! deck-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod request;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrConfig, OcrConfigBuilder, RenderConfig, RenderConfigBuilder, DEFAULT_MODEL};
pub use engine::{EngineLocation, HostOs};
pub use envelope::{Classify, Envelope, Failure};
pub use error::{OcrError, RenderError};
pub use output::{Dimensions, OcrOutput, OcrResult, RenderOutput, RenderedImage};
pub use pipeline::ocr::{extract, extract_sync};
pub use pipeline::render::{render, render_sync};
pub use provider::{MistralClient, VisionCall, VisionModel};
pub use request::{ApiKey, OcrRequest, RenderRequest};
