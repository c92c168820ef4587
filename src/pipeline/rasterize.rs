//! PDF rasterisation: render every page of the intermediate PDF via pdfium.
//!
//! ## Why DPI, not a pixel cap?
//!
//! Slides share one page size per deck, so a DPI maps to a predictable output
//! size (a 13.33 in × 7.5 in widescreen slide at 150 DPI is 2000 × 1125 px).
//! PDF user space is 72 points per inch, so the scale factor is `dpi / 72`.
//!
//! ## Why a sink?
//!
//! Pages are handed out one at a time and dropped once the sink returns, so
//! only one rendered bitmap is alive at any moment regardless of deck length.
//!
//! ## Binding pdfium
//!
//! The library is looked up in this order: an explicit path
//! ([`PdfiumRasterizer::new`], CLI `--pdfium-lib`), the `PDFIUM_LIB_PATH`
//! environment variable, a copy next to the running executable, then the
//! system library search path.

use crate::error::RenderError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the pdfium shared library.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// One rendered page on its way to disk.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// 1-based page number.
    pub index: usize,
    /// Pages in the document.
    pub total: usize,
    pub image: DynamicImage,
}

/// Receives pages in order; an `Err` stops rasterisation.
pub type PageSink<'a> = dyn FnMut(RasterPage) -> Result<(), RenderError> + 'a;

/// Turns a PDF into one image per page, in page order.
///
/// Called from `spawn_blocking`; implementations may block.
pub trait PageRasterizer: Send + Sync {
    /// Render every page at `dpi`, passing each to `sink` before rendering
    /// the next. Returns the page count.
    fn rasterize(
        &self,
        pdf_path: &Path,
        dpi: u32,
        sink: &mut PageSink<'_>,
    ) -> Result<usize, RenderError>;
}

/// [`PageRasterizer`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        pdf_path: &Path,
        dpi: u32,
        sink: &mut PageSink<'_>,
    ) -> Result<usize, RenderError> {
        let library = library_path(
            self.library_path.clone(),
            std::env::var_os(PDFIUM_LIB_ENV),
        );
        let pdfium = bind_pdfium(library.as_deref())?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| RenderError::RasterisationFailed {
                page: None,
                detail: format!("could not open '{}': {:?}", pdf_path.display(), e),
            })?;

        let pages = document.pages();
        let total = pages.len() as usize;
        info!("PDF loaded: {} pages", total);

        let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                RenderError::RasterisationFailed {
                    page: Some(idx + 1),
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered slide {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            sink(RasterPage {
                index: idx + 1,
                total,
                image,
            })?;
        }

        Ok(total)
    }
}

/// File name of the pdfium shared library on this platform.
pub fn pdfium_library_name() -> String {
    format!(
        "{}pdfium{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    )
}

/// Explicit path wins; an empty environment value counts as unset.
fn library_path(explicit: Option<PathBuf>, env: Option<OsString>) -> Option<PathBuf> {
    explicit.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
}

fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, RenderError> {
    if let Some(path) = explicit {
        return Pdfium::bind_to_library(path)
            .map(Pdfium::new)
            .map_err(|e| bind_error(format!("'{}': {}", path.display(), e)));
    }

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(pdfium_library_name())))
        .filter(|p| p.is_file());
    if let Some(path) = beside_exe {
        if let Ok(bindings) = Pdfium::bind_to_library(&path) {
            debug!("Bound pdfium from {}", path.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| bind_error(format!("system library: {}", e)))
}

fn bind_error(reason: String) -> RenderError {
    RenderError::RasterisationFailed {
        page: None,
        detail: format!(
            "failed to bind to pdfium ({reason}).\n\
             Download a build from https://github.com/bblanchon/pdfium-binaries, then either\n  \
             • set {PDFIUM_LIB_ENV}=/path/to/{}, or\n  \
             • place it next to the executable.",
            pdfium_library_name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Classify;

    #[test]
    fn library_name_matches_platform() {
        let name = pdfium_library_name();
        if cfg!(windows) {
            assert_eq!(name, "pdfium.dll");
        } else if cfg!(target_os = "macos") {
            assert_eq!(name, "libpdfium.dylib");
        } else {
            assert_eq!(name, "libpdfium.so");
        }
    }

    #[test]
    fn env_library_used_only_without_explicit_path() {
        let explicit = Some(PathBuf::from("/opt/a/libpdfium.so"));
        let env = Some(OsString::from("/opt/b/libpdfium.so"));

        assert_eq!(library_path(explicit.clone(), env.clone()), explicit);
        assert_eq!(
            library_path(None, env),
            Some(PathBuf::from("/opt/b/libpdfium.so"))
        );
        assert_eq!(library_path(None, Some(OsString::new())), None);
        assert_eq!(library_path(None, None), None);
    }

    #[test]
    fn explicit_missing_library_is_a_rasterisation_error() {
        let rasterizer = PdfiumRasterizer::new(Some(PathBuf::from("/no/such/libpdfium.so")));
        let mut pages = 0;
        let err = rasterizer
            .rasterize(Path::new("/no/such/deck.pdf"), 150, &mut |_| {
                pages += 1;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.kind(), "RasterizationError");
        assert!(err.to_string().contains("/no/such/libpdfium.so"));
        assert!(err.to_string().contains("PDFIUM_LIB_PATH"));
        assert_eq!(pages, 0);
    }
}
