//! Image encoding: slide PNG on disk → base64 data URI for the vision API.
//!
//! Vision chat APIs accept images as `data:` URIs inside the JSON body. The
//! file bytes are forwarded as-is (no re-encode), and are always tagged
//! `image/png` since that is what the rasterisation stage writes.

use crate::error::OcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// A base64-encoded image ready to embed in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64 (standard alphabet, padded) of the file bytes.
    pub data: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Read `path` and base64-encode it.
pub async fn encode_image_file(path: &Path) -> Result<EncodedImage, OcrError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => OcrError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => OcrError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let data = STANDARD.encode(&bytes);
    debug!(
        "Encoded {} ({} bytes) → {} bytes base64",
        path.display(),
        bytes.len(),
        data.len()
    );

    Ok(EncodedImage {
        data,
        mime_type: "image/png",
    })
}
