//! Stage outputs.
//!
//! These are the success bodies of the result envelope. The rasterisation
//! output lists image paths only; pixel dimensions are reported by the OCR
//! stage, which decodes each file anyway.

use crate::envelope::Envelope;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// One rasterised slide on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// 1-based position in the deck. Gapless across a [`RenderOutput`].
    pub sequence_index: usize,
    pub path: PathBuf,
}

/// Successful rasterisation of a whole deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderOutput {
    /// Slides in deck order.
    #[serde(serialize_with = "serialize_image_paths")]
    pub images: Vec<RenderedImage>,
    pub count: usize,
    pub dpi: u32,
}

impl RenderOutput {
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.images.iter().map(|img| img.path.as_path())
    }
}

fn serialize_image_paths<S: Serializer>(
    images: &[RenderedImage],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(images.iter().map(|img| img.path.to_string_lossy()))
}

/// Pixel size of a slide image, as decoded from the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Successful OCR of one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOutput {
    /// Trimmed Markdown; empty when the slide has no text.
    pub markdown: String,
    pub dimensions: Dimensions,
    pub model: String,
}

/// What the OCR stage returns: never an `Err`, always an envelope.
pub type OcrResult = Envelope<OcrOutput>;
