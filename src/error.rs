//! Error types for the deck-ocr library.
//!
//! One enum per stage, because the two stages fail in unrelated ways:
//!
//! * [`RenderError`]: the rasterisation stage. Engine discovery, the
//!   LibreOffice child process, PDFium and the output directory.
//!
//! * [`OcrError`]: the OCR stage. Reading the slide image, the HTTP call to
//!   the vision provider, and decoding the provider's reply.
//!
//! Both implement [`Classify`], which gives every variant a stable kind name
//! (`"TimeoutError"`, `"ProviderError"`, …). The kind is what ends up in the
//! `"error"` field of the JSON envelope, so callers can branch on it without
//! parsing messages.

use crate::engine::HostOs;
use crate::envelope::Classify;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the rasterisation stage.
#[derive(Debug, Error)]
pub enum RenderError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The slide deck was not found at the given path.
    #[error("Input file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// A request field is out of range (e.g. `dpi == 0`).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ── Engine errors ─────────────────────────────────────────────────────
    /// No LibreOffice executable could be located on this host.
    #[error("LibreOffice was not found on this {os} host.\n{hint}")]
    EngineNotFound { os: HostOs, hint: String },

    /// The engine was located but could not be started.
    #[error("Failed to start LibreOffice at '{}': {source}", .program.display())]
    EngineLaunch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine exited with a non-zero status. `diagnostics` is the
    /// captured output, verbatim.
    #[error("LibreOffice conversion failed: {diagnostics}")]
    ConversionFailed { diagnostics: String },

    /// The engine exited cleanly but left no PDF in the scratch directory.
    /// `diagnostics` is whatever it printed, trimmed; often the only clue.
    #[error("LibreOffice did not generate a PDF file (engine produced no output){}", detail_suffix(.diagnostics))]
    NoOutput { diagnostics: String },

    /// The intermediate PDF had no pages.
    #[error("No slides were extracted from '{}'", .path.display())]
    NoSlides { path: PathBuf },

    /// The engine ran past the platform time limit and was killed.
    #[error("LibreOffice conversion timed out after {secs} seconds")]
    Timeout { secs: u64 },

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// PDFium could not be bound, or failed on a page, or a PNG could not be
    /// written.
    #[error("Rasterisation failed{}: {detail}", .page.map(|p| format!(" for slide {p}")).unwrap_or_default())]
    RasterisationFailed { page: Option<usize>, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Creating the scratch or output directory failed.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A blocking task panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Classify for RenderError {
    fn kind(&self) -> &'static str {
        match self {
            RenderError::FileNotFound { .. } => "FileNotFoundError",
            RenderError::InvalidArgument(_) => "InvalidArgumentError",
            RenderError::EngineNotFound { .. } => "NotFoundError",
            RenderError::EngineLaunch { .. }
            | RenderError::ConversionFailed { .. }
            | RenderError::NoOutput { .. }
            | RenderError::NoSlides { .. } => "ConversionError",
            RenderError::Timeout { .. } => "TimeoutError",
            RenderError::RasterisationFailed { .. } => "RasterizationError",
            RenderError::Io { .. } => "IoError",
            RenderError::Internal(_) => "InternalError",
        }
    }
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

/// All errors returned by the OCR stage.
///
/// The taxonomy is open-ended on purpose: provider failures are forwarded with
/// their status and body instead of being mapped onto a fixed list of
/// provider-specific cases.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The slide image does not exist.
    #[error("Image file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// The slide image exists but could not be read.
    #[error("Failed to read image '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level failure talking to the provider (DNS, TLS, reset…).
    #[error("Request to vision provider failed: {0}")]
    Network(String),

    /// The request exceeded the caller-configured timeout.
    #[error("Vision provider did not answer within {secs} seconds")]
    Timeout { secs: u64 },

    /// The provider answered with a non-success HTTP status.
    #[error("Vision provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    /// The provider answered 2xx but the body was not a chat completion.
    #[error("Malformed response from vision provider: {0}")]
    MalformedResponse(String),

    /// The image could not be decoded to read its pixel dimensions.
    #[error("Failed to decode image '{}': {detail}", .path.display())]
    ImageDecode { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A blocking task panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Classify for OcrError {
    fn kind(&self) -> &'static str {
        match self {
            OcrError::FileNotFound { .. } => "FileNotFoundError",
            OcrError::Io { .. } => "IoError",
            OcrError::Network(_) => "NetworkError",
            OcrError::Timeout { .. } => "TimeoutError",
            OcrError::Provider { .. } => "ProviderError",
            OcrError::MalformedResponse(_) => "MalformedResponseError",
            OcrError::ImageDecode { .. } => "ImageDecodeError",
            OcrError::InvalidConfig(_) => "InvalidConfigError",
            OcrError::Internal(_) => "InternalError",
        }
    }
}
