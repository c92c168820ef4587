//! CLI binary: render a slide deck to one PNG per slide.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `RenderRequest` / `RenderConfig` and prints the result envelope.

use anyhow::Result;
use clap::Parser;
use deck_ocr::cli::{emit, init_tracing, parse_args};
use deck_ocr::engine;
use deck_ocr::{render, Envelope, RenderConfig, RenderOutput, RenderRequest};
use std::path::PathBuf;
use std::process::ExitCode;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render every slide at 150 DPI
  deck-render talk.pptx slides/ 150

  # Use a specific LibreOffice build
  deck-render --engine /opt/libreoffice7.6/program/soffice talk.odp out/ 200

  # Check which LibreOffice would be used
  deck-render --locate-engine

OUTPUT:
  Success (stdout): {"success":true,"images":["/abs/slides/slide-01.png",...],"count":N,"dpi":D}
  Failure (stderr): {"success":false,"error":"<Kind>","message":"..."}
  Exit code 0 on success, 1 on any failure.

ENVIRONMENT VARIABLES:
  DECK_OCR_ENGINE   Path to the LibreOffice executable (skips discovery)
  PDFIUM_LIB_PATH   Path to an existing libpdfium
  RUST_LOG          Log filter for stderr diagnostics (default: off)
"#;

/// Render a slide deck (pptx, ppt, odp, …) to slide-NN.png images.
#[derive(Parser, Debug)]
#[command(
    name = "deck-render",
    version,
    about = "Render a slide deck to one PNG per slide via LibreOffice",
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Slide deck to convert.
    #[arg(required_unless_present = "locate_engine")]
    document: Option<PathBuf>,

    /// Directory for the PNGs; created if absent.
    #[arg(required_unless_present = "locate_engine")]
    output_dir: Option<PathBuf>,

    /// Rasterisation resolution in dots per inch.
    #[arg(required_unless_present = "locate_engine")]
    dpi: Option<u32>,

    /// LibreOffice executable to use instead of searching for one.
    #[arg(long, env = "DECK_OCR_ENGINE")]
    engine: Option<PathBuf>,

    /// Only report which LibreOffice executable would be used.
    #[arg(long)]
    locate_engine: bool,

    /// pdfium shared library to bind.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs on stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = match parse_args::<Cli>(true) {
        Ok(cli) => cli,
        Err(code) => return Ok(code),
    };
    init_tracing(cli.verbose);

    let mut builder = RenderConfig::builder();
    if let Some(ref path) = cli.engine {
        builder = builder.engine_path(path);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library(path);
    }
    let config = builder.build();

    // ── Engine check only ────────────────────────────────────────────────
    if cli.locate_engine {
        return emit(&engine::locate_report(
            config.host_os,
            config.engine_path.as_deref(),
        ));
    }

    // ── Render ───────────────────────────────────────────────────────────
    let (Some(document), Some(output_dir), Some(dpi)) = (cli.document, cli.output_dir, cli.dpi)
    else {
        return emit(&Envelope::<()>::failure(
            "UsageError",
            "document_path, output_dir and dpi are required",
        ));
    };

    let request = RenderRequest::new(document, output_dir, dpi);
    let result: Envelope<RenderOutput> = render(&request, &config).await.into();
    emit(&result)
}
