//! Conversion entry points.
//!
//! Every entry point validates the request before touching the filesystem,
//! then acquires a fresh [`Workspace`], runs the pipeline stages in order and
//! releases the workspace on every exit path.

use crate::config::{Engine, ServiceConfig};
use crate::error::Qp2PdfError;
use crate::model::{ConvertRequest, MarkupRequest, QuestionPaperRequest, DEFAULT_FILE_NAME};
use crate::output::ConvertedDocument;
use crate::pipeline::compile::{compile, CompileJob, CompileMode};
use crate::pipeline::images::{resolve_fragments, resolve_named_images, ImageFetcher, ImageReport};
use crate::pipeline::protect::{protect, today_password};
use crate::pipeline::template::{render_question_paper, write_markup};
use crate::pipeline::workspace::Workspace;
use std::path::Path;
use tracing::{info, warn};

/// Convert either payload shape to a PDF.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// * [`Qp2PdfError::InvalidInput`] / [`Qp2PdfError::UnsupportedEngine`]:
///   rejected before any workspace or process is created
/// * [`Qp2PdfError::CompilationFailed`]: non-zero exit on a governing
///   pass, or a missing/empty artifact
/// * [`Qp2PdfError::Timeout`]: the engine or encryption tool hung
pub async fn convert(
    request: ConvertRequest,
    config: &ServiceConfig,
) -> Result<ConvertedDocument, Qp2PdfError> {
    match request {
        ConvertRequest::Markup(req) => compile_markup(&req, config).await,
        ConvertRequest::QuestionPaper(req) => compile_question_paper(*req, config).await,
    }
}

/// Compile raw LaTeX with the requested engine.
///
/// The source is written unchanged and compiled strictly: the first
/// non-zero exit fails the request.
pub async fn compile_markup(
    req: &MarkupRequest,
    config: &ServiceConfig,
) -> Result<ConvertedDocument, Qp2PdfError> {
    let engine = req.validate()?;
    info!("Compiling {} bytes of markup with {}", req.source_text.len(), engine);

    let workspace = Workspace::acquire()?;
    let result = run_markup(&workspace, &req.source_text, engine, config).await;
    workspace.release();
    result
}

async fn run_markup(
    workspace: &Workspace,
    source: &str,
    engine: Engine,
    config: &ServiceConfig,
) -> Result<ConvertedDocument, Qp2PdfError> {
    let stem = write_markup(source, workspace).await?;
    let job = CompileJob {
        engine,
        stem,
        mode: CompileMode::Strict,
        timeout_secs: config.markup_timeout_secs,
    };
    let result = compile(workspace, job, config).await?;

    Ok(ConvertedDocument {
        bytes: result.pdf,
        file_name: DEFAULT_FILE_NAME.to_string(),
        protected: false,
    })
}

/// Render and compile a question paper.
///
/// Images are resolved first (named images, then references inside the
/// content fragments), the document is rendered through the template and
/// compiled leniently with `lualatex`. When `password` is set the artifact
/// is encrypted with today's `YYYYMMDD` password.
pub async fn compile_question_paper(
    req: QuestionPaperRequest,
    config: &ServiceConfig,
) -> Result<ConvertedDocument, Qp2PdfError> {
    req.validate()?;
    info!("Compiling question paper {} ({} parts)", req.code, req.parts.len());

    let workspace = Workspace::acquire()?;
    let result = run_question_paper(&workspace, req, config).await;
    workspace.release();
    result
}

async fn run_question_paper(
    workspace: &Workspace,
    mut doc: QuestionPaperRequest,
    config: &ServiceConfig,
) -> Result<ConvertedDocument, Qp2PdfError> {
    let progress = config.progress_callback.as_deref();
    let fetcher = ImageFetcher::new(config.image_timeout_secs)?;

    // ── Step 1: Resolve images ───────────────────────────────────────────
    let mut report = ImageReport::default();
    if let Some(images) = &doc.images {
        report.merge(resolve_named_images(images, workspace, &fetcher, progress).await);
    }
    report.merge(resolve_content_images(&mut doc, workspace, &fetcher, config).await);
    if !report.warnings.is_empty() {
        warn!(
            "{} images resolved, {} could not be resolved",
            report.resolved.len(),
            report.warnings.len()
        );
    }

    // ── Step 2: Render ───────────────────────────────────────────────────
    let stem = render_question_paper(&doc, workspace, config.template_mode).await?;

    // ── Step 3: Compile ──────────────────────────────────────────────────
    let job = CompileJob {
        engine: Engine::Lualatex,
        stem,
        mode: CompileMode::Lenient,
        timeout_secs: config.document_timeout_secs,
    };
    let result = compile(workspace, job, config).await?;

    // ── Step 4: Protect ──────────────────────────────────────────────────
    let (bytes, protected) = if doc.password {
        let (bytes, tool) = protect(result.pdf, &today_password(), config).await?;
        (bytes, tool.is_some())
    } else {
        (result.pdf, false)
    };

    Ok(ConvertedDocument {
        bytes,
        file_name: doc.file_name(),
        protected,
    })
}

/// Resolve image references across every part in one download batch.
async fn resolve_content_images(
    doc: &mut QuestionPaperRequest,
    workspace: &Workspace,
    fetcher: &ImageFetcher,
    config: &ServiceConfig,
) -> ImageReport {
    let counts: Vec<usize> = doc.parts.iter().map(|p| p.content.len()).collect();
    let mut fragments: Vec<String> = doc
        .parts
        .iter_mut()
        .flat_map(|p| std::mem::take(&mut p.content))
        .collect();

    let report = resolve_fragments(
        &mut fragments,
        workspace,
        fetcher,
        config.progress_callback.as_deref(),
    )
    .await;

    let mut rest = fragments.into_iter();
    for (part, count) in doc.parts.iter_mut().zip(counts) {
        part.content = rest.by_ref().take(count).collect();
    }
    report
}

/// Convert and write the PDF directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    request: ConvertRequest,
    output_path: impl AsRef<Path>,
    config: &ServiceConfig,
) -> Result<ConvertedDocument, Qp2PdfError> {
    let document = convert(request, config).await?;
    let path = output_path.as_ref();
    let write_err = |e: std::io::Error| Qp2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &document.bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {} ({} bytes)", path.display(), document.bytes.len());
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tex_toolchain::ToolLocator;

    fn offline_config() -> ServiceConfig {
        let nowhere = std::env::temp_dir().join("qp2pdf-no-such-tool-dir");
        ServiceConfig::builder()
            .tools(ToolLocator::new(vec![nowhere]).without_system_path())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn unsupported_engine_rejected_before_compiling() {
        let req = MarkupRequest {
            source_text: "\\documentclass{article}".into(),
            engine: "unknown".into(),
        };
        let err = compile_markup(&req, &offline_config()).await.unwrap_err();
        assert!(matches!(err, Qp2PdfError::UnsupportedEngine(ref e) if e == "unknown"));
    }

    #[tokio::test]
    async fn missing_engine_is_internal_fault() {
        let req = MarkupRequest {
            source_text: "\\documentclass{article}".into(),
            engine: "xelatex".into(),
        };
        let err = compile_markup(&req, &offline_config()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InternalFault);
    }
}
