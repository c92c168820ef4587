//! Rasterisation stage: slide deck → intermediate PDF → one PNG per slide.
//!
//! ## Why a private scratch directory?
//!
//! LibreOffice writes the PDF next to nothing we control and keeps a
//! per-user profile with a single-instance lock. Each call gets its own
//! `TempDir` holding both the intermediate PDF and a throwaway profile
//! (`-env:UserInstallation=…`), so concurrent renders never collide. The
//! directory is removed by `Drop` on every exit path.
//!
//! ## Why spawn_blocking?
//!
//! pdfium and PNG encoding are CPU-bound and pdfium is not async-aware, so
//! both run on tokio's blocking pool instead of a runtime worker.

use crate::config::RenderConfig;
use crate::engine;
use crate::error::RenderError;
use crate::output::{RenderOutput, RenderedImage};
use crate::pipeline::process::RunOutcome;
use crate::pipeline::rasterize::RasterPage;
use crate::request::RenderRequest;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Render every slide of `request.source` into `request.output_dir`.
pub async fn render(
    request: &RenderRequest,
    config: &RenderConfig,
) -> Result<RenderOutput, RenderError> {
    let start = Instant::now();

    // ── Step 1: Preconditions ────────────────────────────────────────────
    // Nothing is spawned until the request is known to be usable.
    if !request.source.is_file() {
        return Err(RenderError::FileNotFound {
            path: request.source.clone(),
        });
    }
    if request.dpi == 0 {
        return Err(RenderError::InvalidArgument(
            "dpi must be a positive integer".into(),
        ));
    }

    // ── Step 2: Scratch directory ────────────────────────────────────────
    let scratch = tempfile::Builder::new()
        .prefix("deck-ocr-")
        .tempdir()
        .map_err(|e| RenderError::Io {
            path: std::env::temp_dir(),
            source: e,
        })?;

    // ── Step 3: Locate the engine ────────────────────────────────────────
    let engine_path = engine::locate(config.host_os, config.engine_path.as_deref())?;
    info!("Using LibreOffice at {}", engine_path.display());

    // ── Step 4: Convert to PDF ───────────────────────────────────────────
    let args = engine_args(&request.source, scratch.path())?;
    let deadline = config.host_os.conversion_timeout();
    let outcome = config
        .runner()
        .run(&engine_path, &args, deadline)
        .await
        .map_err(|e| RenderError::EngineLaunch {
            program: engine_path.clone(),
            source: e,
        })?;

    let diagnostics = match outcome {
        RunOutcome::TimedOut => {
            return Err(RenderError::Timeout {
                secs: deadline.as_secs(),
            })
        }
        RunOutcome::Exited(output) if !output.success => {
            return Err(RenderError::ConversionFailed {
                diagnostics: output.diagnostics().to_string(),
            })
        }
        RunOutcome::Exited(output) => {
            debug!("LibreOffice exited cleanly: {}", output.diagnostics().trim());
            output.diagnostics().trim().to_string()
        }
    };

    // LibreOffice exits 0 when it cannot load the source, so a missing PDF is
    // reported with whatever it printed.
    let pdf_path = find_intermediate(scratch.path())?
        .ok_or(RenderError::NoOutput { diagnostics })?;
    debug!("Intermediate PDF: {}", pdf_path.display());

    // ── Step 5: Rasterise and write ──────────────────────────────────────
    let rasterizer = config.rasterizer();
    let dpi = request.dpi;
    let source = request.source.clone();
    let output_dir = request.output_dir.clone();

    let images = tokio::task::spawn_blocking(move || {
        let mut writer = SlideWriter::create(&output_dir)?;
        let rendered = rasterizer.rasterize(&pdf_path, dpi, &mut |page| writer.write(page));
        match rendered {
            Ok(0) => {
                writer.discard();
                Err(RenderError::NoSlides { path: source })
            }
            Ok(_) => Ok(writer.finish()),
            Err(e) => {
                writer.discard();
                Err(e)
            }
        }
    })
    .await
    .map_err(|e| RenderError::Internal(format!("render task panicked: {e}")))??;

    info!(
        "Rendered {} slides at {} DPI in {}ms",
        images.len(),
        dpi,
        start.elapsed().as_millis()
    );

    Ok(RenderOutput {
        count: images.len(),
        images,
        dpi,
    })
}

/// Blocking wrapper around [`render`].
///
/// Creates a single-threaded tokio runtime; do not call from inside one.
pub fn render_sync(
    request: &RenderRequest,
    config: &RenderConfig,
) -> Result<RenderOutput, RenderError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RenderError::Internal(format!("failed to start runtime: {e}")))?
        .block_on(render(request, config))
}

/// Command line for a headless PDF export of `source` into `scratch`.
pub fn engine_args(source: &Path, scratch: &Path) -> Result<Vec<OsString>, RenderError> {
    let source = absolute(source)?;
    let scratch = absolute(scratch)?;
    let profile = reqwest::Url::from_directory_path(scratch.join("profile")).map_err(|_| {
        RenderError::Internal(format!(
            "cannot express '{}' as a file URL",
            scratch.display()
        ))
    })?;

    let mut user_installation = OsString::from("-env:UserInstallation=");
    user_installation.push(profile.as_str());

    Ok(vec![
        "--headless".into(),
        "--norestore".into(),
        "--nolockcheck".into(),
        user_installation,
        "--convert-to".into(),
        "pdf".into(),
        "--outdir".into(),
        scratch.into_os_string(),
        source.into_os_string(),
    ])
}

fn absolute(path: &Path) -> Result<PathBuf, RenderError> {
    std::path::absolute(path).map_err(|e| RenderError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// First `.pdf` (any case) directly inside `dir`, by name.
fn find_intermediate(dir: &Path) -> Result<Option<PathBuf>, RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| RenderError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();

    Ok(pdfs.into_iter().next())
}

/// Zero-pad width for `count` slides: at least two digits.
pub fn pad_width(count: usize) -> usize {
    count.to_string().len().max(2)
}

/// Writes pages as `slide-NN.png` under one output directory as they arrive.
///
/// All-or-nothing: [`SlideWriter::discard`] removes every file this writer
/// created, and a failed [`SlideWriter::write`] discards on its own.
struct SlideWriter {
    output_dir: PathBuf,
    written: Vec<RenderedImage>,
}

impl SlideWriter {
    fn create(output_dir: &Path) -> Result<Self, RenderError> {
        std::fs::create_dir_all(output_dir).map_err(|e| RenderError::Io {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            output_dir: absolute(output_dir)?,
            written: Vec::new(),
        })
    }

    fn write(&mut self, page: RasterPage) -> Result<(), RenderError> {
        let width = pad_width(page.total);
        let path = self
            .output_dir
            .join(format!("slide-{:0width$}.png", page.index));

        if let Err(e) = page.image.save(&path) {
            self.discard();
            return Err(RenderError::RasterisationFailed {
                page: Some(page.index),
                detail: format!("could not write '{}': {e}", path.display()),
            });
        }

        debug!("Wrote {}", path.display());
        self.written.push(RenderedImage {
            sequence_index: page.index,
            path,
        });
        Ok(())
    }

    fn discard(&mut self) {
        for image in self.written.drain(..) {
            if let Err(e) = std::fs::remove_file(&image.path) {
                warn!("Could not remove {}: {}", image.path.display(), e);
            }
        }
    }

    fn finish(self) -> Vec<RenderedImage> {
        self.written
    }
}
