//! Pipeline stages for slide-deck OCR.
//!
//! Two independent stages, each callable on its own:
//!
//! ## Data Flow
//!
//! ```text
//! render:  deck ──▶ process ──▶ rasterize ──▶ slide-NN.png
//!                (LibreOffice)   (pdfium)
//!
//! ocr:     slide-NN.png ──▶ encode ──▶ provider ──▶ Markdown
//!                          (base64)   (Mistral)
//! ```
//!
//! 1. [`render`]: drive LibreOffice into a private scratch directory and
//!    write one PNG per page of the resulting PDF
//! 2. [`process`]: scoped child-process execution with a hard deadline
//! 3. [`rasterize`]: PDF pages to images; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 4. [`encode`]: base64-wrap a slide file for the vision request body
//! 5. [`ocr`]: the OCR stage boundary; the only stage with network I/O

pub mod encode;
pub mod ocr;
pub mod process;
pub mod rasterize;
pub mod render;
