//! Stage tests with the external collaborators faked out.
//!
//! LibreOffice, pdfium and the vision provider are replaced through the
//! `CommandRunner`, `PageRasterizer` and `VisionModel` seams, so these run
//! anywhere without network access or an office suite installed.

use async_trait::async_trait;
use deck_ocr::envelope::Classify;
use deck_ocr::pipeline::process::{CommandRunner, ProcessOutput, RunOutcome};
use deck_ocr::pipeline::rasterize::{PageRasterizer, PageSink, RasterPage};
use deck_ocr::{
    extract, render, HostOs, OcrConfig, OcrError, OcrRequest, RenderConfig, RenderError,
    RenderRequest, VisionCall, VisionModel,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Engine {
    /// Exit 0 after writing `<stem>.pdf` into `--outdir`.
    WritesPdf,
    /// Exit 0 without writing anything, printing this on stdout.
    Silent(&'static str),
    /// Exit non-zero with this stderr.
    Crashes(&'static str),
    /// Never finishes.
    Hangs,
}

struct FakeRunner {
    engine: Engine,
    spawns: AtomicUsize,
    deadlines: Mutex<Vec<Duration>>,
    outdirs: Mutex<Vec<PathBuf>>,
}

impl FakeRunner {
    fn new(engine: Engine) -> Arc<Self> {
        Arc::new(Self {
            engine,
            spawns: AtomicUsize::new(0),
            deadlines: Mutex::new(Vec::new()),
            outdirs: Mutex::new(Vec::new()),
        })
    }

    fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        _program: &Path,
        args: &[OsString],
        deadline: Duration,
    ) -> std::io::Result<RunOutcome> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.deadlines.lock().unwrap().push(deadline);

        let outdir = args
            .iter()
            .position(|a| a == "--outdir")
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from)
            .expect("engine args must name --outdir");
        self.outdirs.lock().unwrap().push(outdir.clone());

        let exited = |success: bool, stdout: &str, stderr: &str| {
            RunOutcome::Exited(ProcessOutput {
                code: Some(if success { 0 } else { 1 }),
                success,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            })
        };

        Ok(match self.engine {
            Engine::WritesPdf => {
                let source = PathBuf::from(args.last().unwrap());
                let stem = source.file_stem().unwrap().to_owned();
                std::fs::write(outdir.join(stem).with_extension("pdf"), b"%PDF-1.7")?;
                exited(true, "", "")
            }
            Engine::Silent(stdout) => exited(true, stdout, ""),
            Engine::Crashes(stderr) => exited(false, "", stderr),
            Engine::Hangs => RunOutcome::TimedOut,
        })
    }
}

/// Produces `pages` images whose width tracks the requested DPI.
struct FakeRasterizer {
    pages: usize,
    /// Fail instead of producing this 1-based page.
    fail_at: Option<usize>,
    /// Directory whose file count is sampled before each page is produced.
    watch: Option<PathBuf>,
    seen: Mutex<Vec<usize>>,
}

impl FakeRasterizer {
    fn new(pages: usize) -> Self {
        Self {
            pages,
            fail_at: None,
            watch: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn pages(pages: usize) -> Arc<Self> {
        Arc::new(Self::new(pages))
    }
}

impl PageRasterizer for FakeRasterizer {
    fn rasterize(
        &self,
        pdf_path: &Path,
        dpi: u32,
        sink: &mut PageSink<'_>,
    ) -> Result<usize, RenderError> {
        assert!(pdf_path.is_file(), "rasterizer handed a missing PDF");
        let width = (10 * dpi / 72).max(1);
        for index in 1..=self.pages {
            if let Some(ref dir) = self.watch {
                let files = std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0);
                self.seen.lock().unwrap().push(files);
            }
            if self.fail_at == Some(index) {
                return Err(RenderError::RasterisationFailed {
                    page: Some(index),
                    detail: "page tree is damaged".into(),
                });
            }
            sink(RasterPage {
                index,
                total: self.pages,
                image: DynamicImage::ImageRgba8(RgbaImage::new(width, width / 2 + 1)),
            })?;
        }
        Ok(self.pages)
    }
}

struct Fixture {
    dir: TempDir,
    source: PathBuf,
    engine: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("quarterly.pptx");
        std::fs::write(&source, b"PK\x03\x04").unwrap();
        let engine = dir.path().join("soffice");
        std::fs::write(&engine, b"").unwrap();
        Self {
            dir,
            source,
            engine,
        }
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("slides")
    }

    fn config(&self, runner: Arc<FakeRunner>, pages: usize) -> RenderConfig {
        self.config_with(runner, FakeRasterizer::pages(pages))
    }

    fn config_with(&self, runner: Arc<FakeRunner>, rasterizer: Arc<FakeRasterizer>) -> RenderConfig {
        RenderConfig::builder()
            .host_os(HostOs::Unix)
            .engine_path(&self.engine)
            .runner(runner)
            .rasterizer(rasterizer)
            .build()
    }
}

fn slide_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

// ── Rendering ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_slide_deck_at_150_dpi() {
    let fx = Fixture::new();
    let runner = FakeRunner::new(Engine::WritesPdf);
    let request = RenderRequest::new(&fx.source, fx.out(), 150);

    let output = render(&request, &fx.config(runner.clone(), 3)).await.unwrap();

    assert_eq!(output.count, 3);
    assert_eq!(output.dpi, 150);
    assert_eq!(
        slide_names(&fx.out()),
        ["slide-01.png", "slide-02.png", "slide-03.png"]
    );
    assert_eq!(runner.spawns(), 1);

    let json: serde_json::Value =
        serde_json::from_str(&deck_ocr::Envelope::Success(output.clone()).to_json()).unwrap();
    let expected_paths: Vec<String> = output
        .paths()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        json,
        serde_json::json!({
            "success": true,
            "images": expected_paths,
            "count": 3,
            "dpi": 150,
        })
    );
    assert!(expected_paths[0].ends_with("slide-01.png"));
}

#[tokio::test]
async fn page_count_is_independent_of_dpi() {
    for (pages, dpi) in [(1, 72), (5, 96), (12, 300)] {
        let fx = Fixture::new();
        let request = RenderRequest::new(&fx.source, fx.out(), dpi);
        let output = render(&request, &fx.config(FakeRunner::new(Engine::WritesPdf), pages))
            .await
            .unwrap();

        assert_eq!(output.count, pages);
        let indices: Vec<usize> = output.images.iter().map(|i| i.sequence_index).collect();
        assert_eq!(indices, (1..=pages).collect::<Vec<_>>());
        assert_eq!(slide_names(&fx.out()).len(), pages);
    }
}

#[tokio::test]
async fn hundred_slides_use_three_digit_names() {
    let fx = Fixture::new();
    let request = RenderRequest::new(&fx.source, fx.out(), 72);
    render(&request, &fx.config(FakeRunner::new(Engine::WritesPdf), 100))
        .await
        .unwrap();

    let names = slide_names(&fx.out());
    assert_eq!(names.first().map(String::as_str), Some("slide-001.png"));
    assert_eq!(names.last().map(String::as_str), Some("slide-100.png"));
}

#[tokio::test]
async fn missing_deck_never_spawns_engine() {
    let fx = Fixture::new();
    let runner = FakeRunner::new(Engine::WritesPdf);
    let request = RenderRequest::new(fx.dir.path().join("absent.pptx"), fx.out(), 150);

    let err = render(&request, &fx.config(runner.clone(), 3)).await.unwrap_err();

    assert_eq!(err.kind(), "FileNotFoundError");
    assert_eq!(runner.spawns(), 0);
    assert!(!fx.out().exists());
}

#[tokio::test]
async fn zero_dpi_is_rejected_before_spawn() {
    let fx = Fixture::new();
    let runner = FakeRunner::new(Engine::WritesPdf);
    let request = RenderRequest::new(&fx.source, fx.out(), 0);

    let err = render(&request, &fx.config(runner.clone(), 3)).await.unwrap_err();

    assert_eq!(err.kind(), "InvalidArgumentError");
    assert_eq!(runner.spawns(), 0);
}

#[tokio::test]
async fn missing_engine_override_is_not_found() {
    let fx = Fixture::new();
    let runner = FakeRunner::new(Engine::WritesPdf);
    let config = RenderConfig::builder()
        .host_os(HostOs::Unix)
        .engine_path(fx.dir.path().join("no-such-soffice"))
        .runner(runner.clone())
        .rasterizer(FakeRasterizer::pages(1))
        .build();

    let err = render(&RenderRequest::new(&fx.source, fx.out(), 150), &config)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "NotFoundError");
    assert!(err.to_string().contains("no-such-soffice"));
    assert_eq!(runner.spawns(), 0);
}

#[tokio::test]
async fn timeout_names_platform_bound() {
    for (os, secs) in [(HostOs::Unix, 120), (HostOs::MacOs, 120), (HostOs::Windows, 180)] {
        let fx = Fixture::new();
        let runner = FakeRunner::new(Engine::Hangs);
        let config = RenderConfig {
            host_os: os,
            ..fx.config(runner.clone(), 3)
        };

        let err = render(&RenderRequest::new(&fx.source, fx.out(), 150), &config)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "TimeoutError");
        assert!(
            err.to_string().contains(&format!("{secs} seconds")),
            "{os}: {err}"
        );
        assert_eq!(
            runner.deadlines.lock().unwrap().as_slice(),
            [Duration::from_secs(secs)]
        );
        assert!(slide_names(&fx.out()).is_empty());
    }
}

#[tokio::test]
async fn engine_crash_reports_stderr_verbatim() {
    let fx = Fixture::new();
    let stderr = "Error: source file could not be loaded\n";
    let runner = FakeRunner::new(Engine::Crashes(stderr));

    let err = render(
        &RenderRequest::new(&fx.source, fx.out(), 150),
        &fx.config(runner, 3),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "ConversionError");
    match err {
        RenderError::ConversionFailed { diagnostics } => assert_eq!(diagnostics, stderr),
        other => panic!("expected ConversionFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn clean_exit_without_pdf_is_conversion_error() {
    let fx = Fixture::new();
    let err = render(
        &RenderRequest::new(&fx.source, fx.out(), 150),
        &fx.config(FakeRunner::new(Engine::Silent("")), 3),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "ConversionError");
    assert!(err.to_string().contains("did not generate a PDF"));
}

#[tokio::test]
async fn clean_exit_without_pdf_keeps_engine_output() {
    let fx = Fixture::new();
    let runner = FakeRunner::new(Engine::Silent("Error: source file could not be loaded\n"));

    let err = render(
        &RenderRequest::new(&fx.source, fx.out(), 150),
        &fx.config(runner, 3),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "ConversionError");
    assert!(
        err.to_string()
            .ends_with("produced no output): Error: source file could not be loaded"),
        "{err}"
    );
}

#[tokio::test]
async fn empty_pdf_is_conversion_error() {
    let fx = Fixture::new();
    let err = render(
        &RenderRequest::new(&fx.source, fx.out(), 150),
        &fx.config(FakeRunner::new(Engine::WritesPdf), 0),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "ConversionError");
    assert!(err.to_string().contains("No slides"));
    assert!(slide_names(&fx.out()).is_empty());
}

#[tokio::test]
async fn scratch_directory_is_removed_on_every_path() {
    for engine in [
        Engine::WritesPdf,
        Engine::Silent(""),
        Engine::Crashes("boom"),
        Engine::Hangs,
    ] {
        let fx = Fixture::new();
        let runner = FakeRunner::new(engine);
        let _ = render(
            &RenderRequest::new(&fx.source, fx.out(), 150),
            &fx.config(runner.clone(), 2),
        )
        .await;

        let outdirs = runner.outdirs.lock().unwrap();
        assert_eq!(outdirs.len(), 1);
        assert!(!outdirs[0].exists(), "{} left behind", outdirs[0].display());
    }
}

#[tokio::test]
async fn failed_write_leaves_no_partial_images() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.out().join("slide-02.png")).unwrap();

    let err = render(
        &RenderRequest::new(&fx.source, fx.out(), 150),
        &fx.config(FakeRunner::new(Engine::WritesPdf), 3),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "RasterizationError");
    assert!(!fx.out().join("slide-01.png").exists());
    assert!(!fx.out().join("slide-03.png").exists());
}

#[tokio::test]
async fn rasterizer_failure_mid_deck_leaves_no_partial_images() {
    let fx = Fixture::new();
    let rasterizer = Arc::new(FakeRasterizer {
        fail_at: Some(3),
        ..FakeRasterizer::new(5)
    });

    let err = render(
        &RenderRequest::new(&fx.source, fx.out(), 150),
        &fx.config_with(FakeRunner::new(Engine::WritesPdf), rasterizer),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "RasterizationError");
    assert!(err.to_string().contains("slide 3"));
    assert!(slide_names(&fx.out()).is_empty());
}

#[tokio::test]
async fn each_page_is_written_before_the_next_is_rendered() {
    let fx = Fixture::new();
    let rasterizer = Arc::new(FakeRasterizer {
        watch: Some(fx.out()),
        ..FakeRasterizer::new(4)
    });

    render(
        &RenderRequest::new(&fx.source, fx.out(), 96),
        &fx.config_with(FakeRunner::new(Engine::WritesPdf), rasterizer.clone()),
    )
    .await
    .unwrap();

    assert_eq!(rasterizer.seen.lock().unwrap().as_slice(), [0, 1, 2, 3]);
}

#[tokio::test]
async fn concurrent_renders_get_separate_scratch_dirs() {
    let fx = Fixture::new();
    let runner = FakeRunner::new(Engine::WritesPdf);
    let config = fx.config(runner.clone(), 2);
    let a = RenderRequest::new(&fx.source, fx.dir.path().join("a"), 96);
    let b = RenderRequest::new(&fx.source, fx.dir.path().join("b"), 96);

    let (ra, rb) = tokio::join!(render(&a, &config), render(&b, &config));
    assert_eq!(ra.unwrap().count, 2);
    assert_eq!(rb.unwrap().count, 2);

    let outdirs = runner.outdirs.lock().unwrap();
    assert_eq!(outdirs.len(), 2);
    assert_ne!(outdirs[0], outdirs[1]);
}

// ── OCR ──────────────────────────────────────────────────────────────────────

enum Reply {
    Text(&'static str),
    Status(u16, &'static str),
}

struct RecordedCall {
    model: String,
    prompt: String,
    image_url: String,
    temperature: Option<f32>,
}

struct FakeModel {
    reply: Reply,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeModel {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VisionModel for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, call: VisionCall<'_>) -> Result<String, OcrError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: call.model.to_string(),
            prompt: call.prompt.to_string(),
            image_url: call.image.data_uri(),
            temperature: call.temperature,
        });
        match self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Status(status, body) => Err(OcrError::Provider {
                status,
                body: format!("{body} (key {})", call.credential.expose()),
            }),
        }
    }
}

fn slide_png(dir: &Path, width: u32, height: u32) -> PathBuf {
    let path = dir.join("slide-01.png");
    RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
        .save(&path)
        .unwrap();
    path
}

fn ocr_config(model: Arc<FakeModel>) -> OcrConfig {
    OcrConfig::builder().model(model).build().unwrap()
}

#[tokio::test]
async fn ocr_reports_markdown_dimensions_and_model() {
    let dir = tempfile::tempdir().unwrap();
    let image = slide_png(dir.path(), 320, 180);
    let model = FakeModel::new(Reply::Text("# Quarterly Results\n\n- Revenue up 12%\n"));

    let result = extract(
        &OcrRequest::new(&image, "sk-abc", "pixtral-12b-2409"),
        &ocr_config(model.clone()),
    )
    .await;

    let json: serde_json::Value = serde_json::from_str(&result.to_json()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "success": true,
            "markdown": "# Quarterly Results\n\n- Revenue up 12%",
            "dimensions": { "width": 320, "height": 180 },
            "model": "pixtral-12b-2409",
        })
    );
    assert!(result.success().unwrap().markdown.starts_with('#'));
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn ocr_request_carries_prompt_and_data_uri() {
    let dir = tempfile::tempdir().unwrap();
    let image = slide_png(dir.path(), 16, 9);
    let model = FakeModel::new(Reply::Text("# T"));
    let config = OcrConfig::builder()
        .model(model.clone())
        .temperature(0.2)
        .build()
        .unwrap();

    extract(&OcrRequest::new(&image, "k", "pixtral-large-latest"), &config).await;

    let calls = model.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model, "pixtral-large-latest");
    assert_eq!(calls[0].prompt, deck_ocr::prompts::OCR_PROMPT);
    assert_eq!(calls[0].temperature, Some(0.2));
    assert!(calls[0].image_url.starts_with("data:image/png;base64,iVBORw0KGgo"));
}

#[tokio::test]
async fn missing_image_makes_no_model_call() {
    let dir = tempfile::tempdir().unwrap();
    let model = FakeModel::new(Reply::Text("unused"));

    let result = extract(
        &OcrRequest::new(dir.path().join("slide-09.png"), "k", "m"),
        &ocr_config(model.clone()),
    )
    .await;

    assert_eq!(result.as_failure().unwrap().error, "FileNotFoundError");
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn blank_slide_is_success_with_empty_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let image = slide_png(dir.path(), 64, 36);

    let result = extract(
        &OcrRequest::new(&image, "k", "m"),
        &ocr_config(FakeModel::new(Reply::Text("  \n\n "))),
    )
    .await;

    let output = result.success().expect("blank slide still succeeds");
    assert_eq!(output.markdown, "");
    assert_eq!(output.dimensions.width, 64);
}

#[tokio::test]
async fn ocr_is_idempotent_for_a_deterministic_model() {
    let dir = tempfile::tempdir().unwrap();
    let image = slide_png(dir.path(), 50, 50);
    let config = ocr_config(FakeModel::new(Reply::Text("## Agenda\n1. Intro")));
    let request = OcrRequest::new(&image, "k", "m");

    let first = extract(&request, &config).await;
    let second = extract(&request, &config).await;
    assert_eq!(first, second);
    assert_eq!(first.to_json(), second.to_json());
}

#[tokio::test]
async fn provider_error_never_echoes_the_key() {
    let dir = tempfile::tempdir().unwrap();
    let image = slide_png(dir.path(), 8, 8);
    let key = "sk-very-secret-0042";

    let result = extract(
        &OcrRequest::new(&image, key, "m"),
        &ocr_config(FakeModel::new(Reply::Status(401, "Unauthorized"))),
    )
    .await;

    let json = result.to_json();
    assert!(!json.contains(key), "key leaked: {json}");
    let failure = result.as_failure().unwrap();
    assert_eq!(failure.error, "ProviderError");
    assert!(failure.message.contains("401"));
    assert!(failure.message.contains("Unauthorized"));
    assert!(failure.message.contains("***"));
}

#[tokio::test]
async fn undecodable_image_is_image_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("slide-01.png");
    std::fs::write(&image, b"definitely not a png").unwrap();

    let result = extract(
        &OcrRequest::new(&image, "k", "m"),
        &ocr_config(FakeModel::new(Reply::Text("# T"))),
    )
    .await;

    assert_eq!(result.as_failure().unwrap().error, "ImageDecodeError");
}

#[tokio::test]
async fn undecodable_image_is_rejected_before_the_model_call() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("slide-01.png");
    std::fs::write(&image, b"definitely not a png").unwrap();
    let model = FakeModel::new(Reply::Text("# T"));

    extract(&OcrRequest::new(&image, "k", "m"), &ocr_config(model.clone())).await;
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn format_is_detected_from_contents_not_extension() {
    let dir = tempfile::tempdir().unwrap();
    let png = slide_png(dir.path(), 40, 30);

    for name in ["slide-01", "slide-01.img", "slide-01.jpg"] {
        let renamed = dir.path().join(name);
        std::fs::copy(&png, &renamed).unwrap();

        let result = extract(
            &OcrRequest::new(&renamed, "k", "m"),
            &ocr_config(FakeModel::new(Reply::Text("# Title"))),
        )
        .await;

        let output = result.success().unwrap_or_else(|| panic!("{name}: {}", result.to_json()));
        assert_eq!(output.dimensions.width, 40, "{name}");
        assert_eq!(output.dimensions.height, 30, "{name}");
    }
}

#[tokio::test]
async fn failure_envelope_has_no_success_fields() {
    let result = extract(
        &OcrRequest::new("/no/such/slide.png", "k", "m"),
        &ocr_config(FakeModel::new(Reply::Text("# T"))),
    )
    .await;

    let json: serde_json::Value = serde_json::from_str(&result.to_json()).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "FileNotFoundError");
    assert!(json.get("markdown").is_none());
    assert!(json.get("dimensions").is_none());
}
