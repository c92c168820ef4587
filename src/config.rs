//! Configuration for the two stages.
//!
//! Requests ([`crate::request`]) say *what* to process; these structs say *how*.
//! Both are built via builders, following the same shape: setters that only
//! record values, and a `build()` that validates.
//!
//! Each config can carry a pre-built implementation of its stage's external
//! seam (`CommandRunner` / `PageRasterizer` for rendering, `VisionModel` for
//! OCR). When absent, the real implementation is constructed on demand.

use crate::engine::HostOs;
use crate::error::OcrError;
use crate::pipeline::process::{CommandRunner, TokioCommandRunner};
use crate::pipeline::rasterize::{PageRasterizer, PdfiumRasterizer};
use crate::provider::{MistralClient, VisionModel};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Mistral's public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Vision model used when the caller does not name one.
pub const DEFAULT_MODEL: &str = "pixtral-12b-2409";

// ── Rasterisation ────────────────────────────────────────────────────────

/// How the rasterisation stage finds and drives its collaborators.
#[derive(Clone)]
pub struct RenderConfig {
    /// Host classification; selects engine candidates and the timeout.
    /// Default: [`HostOs::current()`].
    pub host_os: HostOs,

    /// Use this LibreOffice executable instead of running discovery.
    pub engine_path: Option<PathBuf>,

    /// Explicit pdfium shared library.
    pub pdfium_library: Option<PathBuf>,

    /// Pre-constructed process runner. Default: [`TokioCommandRunner`].
    pub runner: Option<Arc<dyn CommandRunner>>,

    /// Pre-constructed rasteriser. Default: [`PdfiumRasterizer`].
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            host_os: HostOs::current(),
            engine_path: None,
            pdfium_library: None,
            runner: None,
            rasterizer: None,
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("host_os", &self.host_os)
            .field("engine_path", &self.engine_path)
            .field("pdfium_library", &self.pdfium_library)
            .field("runner", &self.runner.as_ref().map(|_| "<dyn CommandRunner>"))
            .field(
                "rasterizer",
                &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"),
            )
            .finish()
    }
}

impl RenderConfig {
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured runner, or the tokio-backed default.
    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        match &self.runner {
            Some(runner) => Arc::clone(runner),
            None => Arc::new(TokioCommandRunner),
        }
    }

    /// The configured rasteriser, or pdfium.
    pub fn rasterizer(&self) -> Arc<dyn PageRasterizer> {
        match &self.rasterizer {
            Some(rasterizer) => Arc::clone(rasterizer),
            None => Arc::new(PdfiumRasterizer::new(self.pdfium_library.clone())),
        }
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn host_os(mut self, os: HostOs) -> Self {
        self.config.host_os = os;
        self
    }

    pub fn engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.engine_path = Some(path.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.config.runner = Some(runner);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    /// Nothing in a render config can be invalid on its own; a bad engine
    /// path is reported by the stage as `NotFoundError`.
    pub fn build(self) -> RenderConfig {
        self.config
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// How the OCR stage talks to the vision provider.
#[derive(Clone)]
pub struct OcrConfig {
    /// API root; `/chat/completions` is appended. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Sampling temperature. Default: unset (provider default).
    pub temperature: Option<f32>,

    /// Completion token limit. Default: unset (provider default).
    pub max_tokens: Option<u32>,

    /// Whole-request timeout. Default: none; the stage waits as long as the
    /// provider takes.
    pub request_timeout: Option<Duration>,

    /// Replaces [`crate::prompts::OCR_PROMPT`].
    pub system_prompt: Option<String>,

    /// Pre-constructed model client. Takes precedence over `base_url`.
    pub model: Option<Arc<dyn VisionModel>>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            max_tokens: None,
            request_timeout: None,
            system_prompt: None,
            model: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .finish()
    }
}

impl OcrConfig {
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured model client, or a [`MistralClient`] for `base_url`.
    pub fn vision_model(&self) -> Result<Arc<dyn VisionModel>, OcrError> {
        if let Some(ref model) = self.model {
            return Ok(Arc::clone(model));
        }
        let client = MistralClient::new(&self.base_url, self.request_timeout)?;
        Ok(Arc::new(client))
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.model = Some(model);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if c.model.is_none() {
            let url = reqwest::Url::parse(&c.base_url).map_err(|e| {
                OcrError::InvalidConfig(format!("base URL '{}' is invalid: {e}", c.base_url))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(OcrError::InvalidConfig(format!(
                    "base URL must be http(s), got '{}'",
                    c.base_url
                )));
            }
        }
        if let Some(t) = c.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(OcrError::InvalidConfig(format!(
                    "temperature must be 0.0–2.0, got {t}"
                )));
            }
        }
        if c.max_tokens == Some(0) {
            return Err(OcrError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.request_timeout == Some(Duration::ZERO) {
            return Err(OcrError::InvalidConfig("request timeout must be > 0".into()));
        }
        Ok(self.config)
    }
}
