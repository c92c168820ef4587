//! Stage inputs.

use std::fmt;
use std::path::PathBuf;

/// Input to the rasterisation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Slide deck to convert (`.pptx`, `.ppt`, `.odp`, …).
    pub source: PathBuf,
    /// Directory that receives `slide-NN.png`. Created if absent.
    pub output_dir: PathBuf,
    /// Rasterisation resolution. Must be positive.
    pub dpi: u32,
}

impl RenderRequest {
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            dpi,
        }
    }
}

/// Input to the OCR stage.
#[derive(Debug, Clone)]
pub struct OcrRequest {
    pub image_path: PathBuf,
    pub credential: ApiKey,
    /// Provider model id, echoed back in the result.
    pub model: String,
}

impl OcrRequest {
    pub fn new(
        image_path: impl Into<PathBuf>,
        credential: impl Into<ApiKey>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            credential: credential.into(),
            model: model.into(),
        }
    }
}

/// Provider API key.
///
/// Deliberately has no `Display`; `Debug` prints a placeholder so the key
/// cannot leak through `{:?}` in a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replace every occurrence of the key in `text` with `***`.
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.0, "***")
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}
