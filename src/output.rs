//! Result types produced by the pipeline.

use serde::{Deserialize, Serialize};

/// Captured output of one external process run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl From<std::process::Output> for ProcessOutput {
    fn from(out: std::process::Output) -> Self {
        Self {
            exit_code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        }
    }
}

/// A successfully compiled artifact.
///
/// `pdf` is never empty: an empty output file is reported as
/// [`crate::Qp2PdfError::CompilationFailed`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationResult {
    #[serde(skip)]
    pub pdf: Vec<u8>,
    /// Diagnostics of the last compiler pass.
    pub last_run: ProcessOutput,
    /// Number of compiler passes that ran.
    pub attempts: u32,
    pub duration_ms: u64,
}

/// The artifact returned to the caller.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub bytes: Vec<u8>,
    /// Attachment name, e.g. `QP1.pdf`.
    pub file_name: String,
    /// Whether the bytes were encrypted.
    pub protected: bool,
}
