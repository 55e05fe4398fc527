//! Library-level pipeline tests against fake external tools.
//!
//! Every test installs shell-script stand-ins for the TeX engine and the
//! encryption tools into a scratch directory and points the config at that
//! directory only, so nothing on the host `PATH` is used.

#![cfg(unix)]

mod common;

use axum::{http::StatusCode, routing::get, Router};
use common::*;
use qp2pdf::pipeline::protect::today_password;
use qp2pdf::{
    convert, convert_to_file, CompileProgressCallback, ConvertRequest, ErrorKind, Qp2PdfError,
    ServiceConfig, TemplateMode,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn request(value: serde_json::Value) -> ConvertRequest {
    ConvertRequest::from_json(value.to_string().as_bytes()).unwrap()
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ── Structured documents ─────────────────────────────────────────────────────

#[tokio::test]
async fn question_paper_compiles_to_named_attachment() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_OK);

    let doc = convert(request(question_paper_json()), &tools.config())
        .await
        .unwrap();

    assert_eq!(doc.file_name, "QP1.pdf");
    assert!(!doc.protected);
    let body = text(&doc.bytes);
    assert!(body.starts_with("%PDF-1.5"));
    assert!(body.contains("\"qp_code\": \"QP1\""), "data file present at compile time");
    assert!(body.contains("Reports/question.json"), "Lua template reads the data file");

    let calls = tools.calls();
    assert_eq!(calls.len(), 2, "engine runs twice");
    assert!(calls[0].ends_with("-interaction=nonstopmode question.tex"));
    for ws in tools.workspaces() {
        assert!(!ws.exists(), "workspace {} not released", ws.display());
    }
}

#[tokio::test]
async fn zero_parts_still_compiles() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_OK);
    let config = ServiceConfig::builder()
        .tools(tools.locator())
        .template_mode(TemplateMode::Direct)
        .build()
        .unwrap();

    let mut json = question_paper_json();
    json["parts"] = serde_json::json!([]);
    let doc = convert(request(json), &config).await.unwrap();

    let body = text(&doc.bytes);
    assert!(body.contains("QP1\\hfill  Name"));
    assert!(body.contains("\\begin{enumerate}\n\\end{enumerate}"));
}

#[tokio::test]
async fn direct_template_emits_parts_in_source() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_OK);
    let config = ServiceConfig::builder()
        .tools(tools.locator())
        .template_mode(TemplateMode::Direct)
        .build()
        .unwrap();

    let doc = convert(request(question_paper_json()), &config).await.unwrap();
    let body = text(&doc.bytes);
    assert!(body.contains("\\textbf{A} \\\\"));
    assert!(body.contains("Q1. 2+2=? \\\\\n \\\\"));
    assert!(body.contains("\\texttt{\\textbf{5 marks}} \\\\"));
    assert!(!body.contains("luacode*}\n    json"));
}

#[tokio::test]
async fn structured_path_tolerates_non_zero_exits() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_ALWAYS_FAILS);

    let doc = convert(request(question_paper_json()), &tools.config())
        .await
        .unwrap();

    assert!(text(&doc.bytes).starts_with("%PDF"));
    assert_eq!(tools.calls().len(), 2, "artifact is inspected after both passes");
}

#[tokio::test]
async fn empty_artifact_is_compilation_failure() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_EMPTY);

    let err = convert(request(question_paper_json()), &tools.config())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CompilationFailure);
    for ws in tools.workspaces() {
        assert!(!ws.exists(), "workspace released on failure");
    }
}

#[tokio::test]
async fn hung_engine_times_out_and_releases_workspace() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_HANGS);
    let config = ServiceConfig::builder()
        .tools(tools.locator())
        .document_timeout_secs(1)
        .build()
        .unwrap();

    let err = convert(request(question_paper_json()), &config).await.unwrap_err();

    assert!(matches!(err, Qp2PdfError::Timeout { secs: 1, .. }), "got {err:?}");
    assert_eq!(tools.calls().len(), 1);
    for ws in tools.workspaces() {
        assert!(!ws.exists());
    }
}

#[tokio::test]
async fn password_encrypts_with_todays_date() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_OK).qpdf();

    let mut json = question_paper_json();
    json["password"] = serde_json::json!(true);
    let doc = convert(request(json), &tools.config()).await.unwrap();

    assert!(doc.protected);
    assert_eq!(text(&doc.bytes), format!("ENC:{}", today_password()));
}

#[tokio::test]
async fn password_without_tools_returns_plain_pdf() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_OK);

    let mut json = question_paper_json();
    json["password"] = serde_json::json!(true);
    let doc = convert(request(json), &tools.config()).await.unwrap();

    assert!(!doc.protected);
    assert!(text(&doc.bytes).starts_with("%PDF-1.5"));
}

#[tokio::test]
async fn images_are_resolved_before_rendering() {
    let app = Router::new()
        .route("/static/fig1.png", get(|| async { &b"PNG"[..] }))
        .fallback(|| async { StatusCode::NOT_FOUND });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_OK);

    let mut json = question_paper_json();
    json["parts"][0]["content"] = serde_json::json!([
        format!("Q1. See \\includegraphics[width=0.5\\textwidth]{{{base}/static/fig1.png}}"),
        format!("Q2. \\includegraphics[width=2cm]{{{base}/static/missing.png}}"),
    ]);
    json["images"] = serde_json::json!({
        "logo.png": "data:image/png;base64,TE9HTw==",
        "seal.png": "nowhere-to-be-found",
    });

    let doc = convert(request(json), &tools.config()).await.unwrap();
    let body = text(&doc.bytes);

    assert!(body.contains("{./Photo/Qpbank/fig1.png}"));
    assert!(body.contains("/static/missing.png}"), "failed download left as-is");
    assert!(body.contains("logo.png"));
    assert!(!body.contains("seal.png\n"), "unrecognised source is skipped");
}

#[tokio::test]
async fn progress_callback_sees_both_passes() {
    #[derive(Default)]
    struct Passes(AtomicU32);
    impl CompileProgressCallback for Passes {
        fn on_attempt_complete(&self, _attempt: u32, _exit_code: Option<i32>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_OK);
    let passes = Arc::new(Passes::default());
    let config = ServiceConfig::builder()
        .tools(tools.locator())
        .progress_callback(passes.clone())
        .build()
        .unwrap();

    convert(request(question_paper_json()), &config).await.unwrap();
    assert_eq!(passes.0.load(Ordering::SeqCst), 2);
}

// ── Raw markup ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn markup_uses_requested_engine_strictly() {
    let tools = FakeTools::new();
    tools.engine("xelatex", ENGINE_OK);

    let doc = convert(request(markup_json("xelatex")), &tools.config())
        .await
        .unwrap();

    assert_eq!(doc.file_name, "document.pdf");
    assert!(text(&doc.bytes).contains("Hello"));
    let calls = tools.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].ends_with("-interaction=nonstopmode -halt-on-error document.tex"));
}

#[tokio::test]
async fn markup_fails_on_first_non_zero_exit() {
    let tools = FakeTools::new();
    tools.engine("pdflatex", ENGINE_ALWAYS_FAILS);

    let err = convert(request(markup_json("pdflatex")), &tools.config())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CompilationFailure);
    assert!(err.to_string().contains("Undefined control sequence"));
    assert_eq!(tools.calls().len(), 1);
}

#[tokio::test]
async fn unknown_engine_spawns_nothing() {
    let tools = FakeTools::new();
    tools.engine("pdflatex", ENGINE_OK);

    let err = ConvertRequest::from_json(markup_json("unknown").to_string().as_bytes())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(tools.calls().is_empty());
}

#[tokio::test]
async fn convert_to_file_writes_atomically() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_OK);
    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("nested/QP1.pdf");

    convert_to_file(request(question_paper_json()), &path, &tools.config())
        .await
        .unwrap();

    assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    assert!(!path.with_extension("pdf.tmp").exists());
}
