//! OCR stage: one slide image in, Markdown out.
//!
//! [`extract`] is the stage boundary. It never returns `Err`: every failure
//! is classified into the result envelope, with the credential scrubbed from
//! the message. The work itself lives in [`try_extract`], which uses `?`
//! throughout.

use crate::config::OcrConfig;
use crate::envelope::{Classify, Envelope};
use crate::error::OcrError;
use crate::output::{Dimensions, OcrOutput, OcrResult};
use crate::pipeline::encode::encode_image_file;
use crate::prompts::OCR_PROMPT;
use crate::provider::VisionCall;
use crate::request::OcrRequest;
use image::ImageReader;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Extract Markdown from one slide image.
pub async fn extract(request: &OcrRequest, config: &OcrConfig) -> OcrResult {
    match try_extract(request, config).await {
        Ok(output) => Envelope::Success(output),
        Err(e) => {
            let message = request.credential.redact(&e.to_string());
            warn!(
                "OCR of {} failed: {}: {}",
                request.image_path.display(),
                e.kind(),
                message
            );
            Envelope::failure(e.kind(), message)
        }
    }
}

/// Blocking wrapper around [`extract`].
///
/// Creates a single-threaded tokio runtime; do not call from inside one.
pub fn extract_sync(request: &OcrRequest, config: &OcrConfig) -> OcrResult {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt.block_on(extract(request, config)),
        Err(e) => Envelope::failure("InternalError", format!("failed to start runtime: {e}")),
    }
}

/// The OCR stage with errors un-classified.
pub async fn try_extract(request: &OcrRequest, config: &OcrConfig) -> Result<OcrOutput, OcrError> {
    let path = &request.image_path;
    let start = Instant::now();

    // ── Step 1: Precondition ─────────────────────────────────────────────
    // Checked before anything touches the network.
    if !path.is_file() {
        return Err(OcrError::FileNotFound { path: path.clone() });
    }

    // ── Step 2: Dimensions from the file, never from the model ──────────
    // Read from the header before the paid call, so an undecodable file
    // costs nothing.
    let dimensions = read_dimensions(path.clone()).await?;

    // ── Step 3: Encode ───────────────────────────────────────────────────
    let image = encode_image_file(path).await?;

    // ── Step 4: Ask the model ────────────────────────────────────────────
    let model = config.vision_model()?;
    let prompt = config.system_prompt.as_deref().unwrap_or(OCR_PROMPT);
    let raw = model
        .complete(VisionCall {
            model: &request.model,
            credential: &request.credential,
            prompt,
            image: &image,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
        .await?;
    let markdown = raw.trim().to_string();

    info!(
        "OCR {} via {} ({}x{}, {} chars) in {}ms",
        path.display(),
        model.name(),
        dimensions.width,
        dimensions.height,
        markdown.len(),
        start.elapsed().as_millis()
    );

    Ok(OcrOutput {
        markdown,
        dimensions,
        model: request.model.clone(),
    })
}

/// Pixel size from the image header. The format is sniffed from the bytes,
/// so the file name's extension does not matter.
async fn read_dimensions(path: PathBuf) -> Result<Dimensions, OcrError> {
    tokio::task::spawn_blocking(move || {
        let reader = ImageReader::open(&path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| OcrError::Io {
                path: path.clone(),
                source: e,
            })?;
        reader
            .into_dimensions()
            .map(|(width, height)| Dimensions { width, height })
            .map_err(|e| OcrError::ImageDecode {
                path: path.clone(),
                detail: e.to_string(),
            })
    })
    .await
    .map_err(|e| OcrError::Internal(format!("dimension task panicked: {e}")))?
}
