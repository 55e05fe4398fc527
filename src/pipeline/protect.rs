//! Password protection through an external encryption tool.
//!
//! `qpdf` is tried first, then `pdftk`. Both apply 128-bit encryption with
//! the same user and owner password, allow printing and modification, and
//! deny content extraction where the tool can express it. A tool that is
//! missing, exits with an error, or writes nothing is skipped. If no tool
//! succeeds the artifact is returned unprotected with a warning; a tool
//! that hangs past the timeout is an error.

use crate::config::ServiceConfig;
use crate::error::Qp2PdfError;
use crate::pipeline::compile::run_bounded;
use chrono::{Local, NaiveDate};
use std::path::Path;
use tracing::{debug, info, warn};

/// Password for a given day: `YYYYMMDD`.
pub fn date_password(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Password for today in local time.
pub fn today_password() -> String {
    date_password(Local::now().date_naive())
}

// ── Tools ────────────────────────────────────────────────────────────────

trait EncryptTool: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn args(&self, input: &Path, output: &Path, password: &str) -> Vec<String>;

    fn accepts(&self, exit_code: Option<i32>) -> bool {
        exit_code == Some(0)
    }
}

#[derive(Debug)]
struct Qpdf;

impl EncryptTool for Qpdf {
    fn name(&self) -> &'static str {
        "qpdf"
    }

    fn args(&self, input: &Path, output: &Path, password: &str) -> Vec<String> {
        vec![
            "--encrypt".into(),
            password.into(),
            password.into(),
            "128".into(),
            "--print=full".into(),
            "--modify=all".into(),
            "--extract=n".into(),
            "--".into(),
            input.display().to_string(),
            output.display().to_string(),
        ]
    }

    /// Exit code 3 means "succeeded with warnings".
    fn accepts(&self, exit_code: Option<i32>) -> bool {
        matches!(exit_code, Some(0) | Some(3))
    }
}

#[derive(Debug)]
struct Pdftk;

impl EncryptTool for Pdftk {
    fn name(&self) -> &'static str {
        "pdftk"
    }

    fn args(&self, input: &Path, output: &Path, password: &str) -> Vec<String> {
        vec![
            input.display().to_string(),
            "output".into(),
            output.display().to_string(),
            "user_pw".into(),
            password.into(),
            "owner_pw".into(),
            password.into(),
            "encrypt_128bit".into(),
            "allow".into(),
            "Printing".into(),
            "ModifyContents".into(),
        ]
    }
}

/// Tools in preference order.
fn encrypt_tools() -> [Box<dyn EncryptTool>; 2] {
    [Box::new(Qpdf), Box::new(Pdftk)]
}

// ── Protect ──────────────────────────────────────────────────────────────

/// Encrypt `pdf` with `password`.
///
/// Returns the (possibly unprotected) bytes and the name of the tool that
/// encrypted them.
pub async fn protect(
    pdf: Vec<u8>,
    password: &str,
    config: &ServiceConfig,
) -> Result<(Vec<u8>, Option<&'static str>), Qp2PdfError> {
    let scratch = tempfile::Builder::new()
        .prefix("qp2pdf-protect-")
        .tempdir()
        .map_err(|e| Qp2PdfError::workspace(std::env::temp_dir(), e))?;
    let input = scratch.path().join("input.pdf");
    let output = scratch.path().join("protected.pdf");
    tokio::fs::write(&input, &pdf)
        .await
        .map_err(|e| Qp2PdfError::workspace(&input, e))?;

    let mut protected = None;
    for tool in encrypt_tools() {
        let name = tool.name();
        let program = match config.tools.locate(name) {
            Ok(p) => p,
            Err(e) => {
                debug!("{}", e);
                continue;
            }
        };

        let run = run_bounded(
            &program,
            &tool.args(&input, &output, password),
            None,
            config.encrypt_timeout_secs,
            name,
        )
        .await?;

        if !tool.accepts(run.exit_code) {
            warn!("{} exited with {:?}: {}", name, run.exit_code, run.stderr.trim());
            continue;
        }

        match tokio::fs::read(&output).await {
            Ok(bytes) if !bytes.is_empty() => {
                info!("Encrypted PDF with {}", name);
                protected = Some((bytes, name));
                break;
            }
            _ => warn!("{} reported success but wrote no output", name),
        }
    }

    let tool = protected.as_ref().map(|(_, name)| *name);
    if let Some(cb) = config.progress_callback.as_deref() {
        cb.on_protect(tool);
    }

    match protected {
        Some((bytes, name)) => Ok((bytes, Some(name))),
        None => {
            warn!("No encryption tool succeeded; returning unprotected PDF");
            Ok((pdf, None))
        }
    }
}
