//! # qp2pdf
//!
//! Turn question-paper data or raw LaTeX into a PDF by driving an external
//! LaTeX engine.
//!
//! ## Why this crate?
//!
//! Typesetting is delegated entirely to the installed TeX distribution; what
//! this crate owns is the orchestration around it. Each request gets an
//! isolated workspace, remote and inline images are made local before the
//! engine runs, the engine is run twice under a hard timeout so page totals
//! and cross-references settle, and success is judged by the artifact on
//! disk. Optional encryption goes through `qpdf` or `pdftk` and degrades to
//! the plain PDF when neither works.
//!
//! ## Pipeline Overview
//!
//! ```text
//! request (JSON)
//!  │
//!  ├─ 1. Validate   engine + required fields, before any side effects
//!  ├─ 2. Workspace  tempdir with Reports/ and Photo/Qpbank/
//!  ├─ 3. Images     concurrent downloads, inline base64, local copies
//!  ├─ 4. Render     Reports/question.json + question.tex (or document.tex)
//!  ├─ 5. Compile    engine x2 with timeout, artifact must be non-empty
//!  ├─ 6. Protect    optional, date-derived password
//!  └─ 7. Output     PDF bytes + attachment name
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qp2pdf::{convert, ConvertRequest, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::default();
//!     let body = br#"{"source_text": "\\documentclass{article}\\begin{document}Hi\\end{document}",
//!                     "engine": "pdflatex"}"#;
//!     let request = ConvertRequest::from_json(body)?;
//!     let pdf = convert(request, &config).await?;
//!     std::fs::write(&pdf.file_name, &pdf.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `qp2pdf` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding the library or the router:
//! ```toml
//! qp2pdf = { version = "0.3", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Tool | Needed for |
//! |------|------------|
//! | `pdflatex` / `lualatex` / `xelatex` | raw markup, per request |
//! | `lualatex` + `dkjson` | question papers |
//! | `qpdf` or `pdftk` | `password: true` (optional) |
//!
//! Tools are looked up through [`ToolLocator`]: directories listed in
//! `QP2PDF_TOOL_DIR` first, then `PATH`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Engine, ServiceConfig, ServiceConfigBuilder, TemplateMode};
pub use convert::{compile_markup, compile_question_paper, convert, convert_to_file};
pub use error::{AssetWarning, ErrorKind, Qp2PdfError};
pub use model::{ConvertRequest, FontOverrides, MarkupRequest, QuestionPaperRequest, QuestionPart};
pub use output::{CompilationResult, ConvertedDocument, ProcessOutput};
pub use progress::{CompileProgressCallback, NoopProgressCallback, ProgressCallback};
pub use server::{router, ApiError, AppState};
pub use tex_toolchain::{ToolLocator, ToolchainError};
