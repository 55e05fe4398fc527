//! Error types for the qp2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Qp2PdfError`]: **Fatal**: the document cannot be produced (bad
//!   payload, compiler failure, timeout). Returned as `Err(Qp2PdfError)`
//!   from the top-level `compile_*` functions.
//!
//! * [`AssetWarning`]: **Non-fatal**: a single image could not be fetched,
//!   decoded or copied. Collected in [`crate::pipeline::images::ImageReport`]
//!   and logged; the reference simply stays unresolved.
//!
//! [`ErrorKind`] is the coarse classification the HTTP layer maps onto
//! status codes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the qp2pdf library.
#[derive(Debug, Error)]
pub enum Qp2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Payload failed shape or field validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requested engine is not one of the supported engines.
    #[error("Engine must be one of pdflatex, lualatex, xelatex (got '{0}')")]
    UnsupportedEngine(String),

    // ── Compilation errors ────────────────────────────────────────────────
    /// The compiler exited non-zero on a governing attempt, or the output
    /// artifact is missing or empty after all attempts.
    #[error("{reason}\nSTDOUT:\n{stdout}\n\nSTDERR:\n{stderr}")]
    CompilationFailed {
        reason: String,
        stdout: String,
        stderr: String,
    },

    /// A bounded external invocation exceeded its allotted time.
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// A required external binary is not installed.
    #[error("Required tool unavailable: {0}")]
    ToolNotFound(#[from] tex_toolchain::ToolchainError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or populate the per-request workspace.
    #[error("Workspace error at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`Qp2PdfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    CompilationFailure,
    Timeout,
    InternalFault,
}

impl ErrorKind {
    /// HTTP status code for this kind of failure.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::CompilationFailure => 422,
            ErrorKind::Timeout => 408,
            ErrorKind::InternalFault => 500,
        }
    }
}

impl Qp2PdfError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Qp2PdfError::InvalidInput(_) | Qp2PdfError::UnsupportedEngine(_) => {
                ErrorKind::InvalidInput
            }
            Qp2PdfError::CompilationFailed { .. } => ErrorKind::CompilationFailure,
            Qp2PdfError::Timeout { .. } => ErrorKind::Timeout,
            Qp2PdfError::ToolNotFound(_)
            | Qp2PdfError::Workspace { .. }
            | Qp2PdfError::OutputWriteFailed { .. }
            | Qp2PdfError::InvalidConfig(_)
            | Qp2PdfError::Internal(_) => ErrorKind::InternalFault,
        }
    }

    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Qp2PdfError::Workspace {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal failure while resolving a single image.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum AssetWarning {
    /// HTTP fetch failed or returned a non-success status.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Inline base64 payload did not decode.
    #[error("Could not decode inline image '{name}': {reason}")]
    DecodeFailed { name: String, reason: String },

    /// Local file could not be copied into the workspace.
    #[error("Could not copy local image '{name}' from '{source_path}': {reason}")]
    CopyFailed {
        name: String,
        source_path: String,
        reason: String,
    },

    /// The source string is neither a URL, inline data nor an existing file.
    #[error("Image source not recognized for '{name}': {preview}...")]
    Unrecognized { name: String, preview: String },

    /// The image name is not a plain file name.
    #[error("Image name '{0}' is not a plain file name")]
    InvalidName(String),

    /// Bytes were obtained but could not be written to the workspace.
    #[error("Could not write image '{name}': {reason}")]
    WriteFailed { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_failure_display_carries_output() {
        let e = Qp2PdfError::CompilationFailed {
            reason: "LaTeX compilation failed".into(),
            stdout: "! Undefined control sequence.".into(),
            stderr: String::new(),
        };
        let msg = e.to_string();
        assert!(msg.contains("LaTeX compilation failed"), "got: {msg}");
        assert!(msg.contains("Undefined control sequence"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = Qp2PdfError::Timeout {
            tool: "lualatex".into(),
            secs: 60,
        };
        assert_eq!(e.to_string(), "lualatex timed out after 60s");
    }

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(
            Qp2PdfError::UnsupportedEngine("unknown".into()).kind().status_code(),
            400
        );
        assert_eq!(
            Qp2PdfError::InvalidInput("missing qp_code".into()).kind().status_code(),
            400
        );
        let failed = Qp2PdfError::CompilationFailed {
            reason: String::new(),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(failed.kind().status_code(), 422);
        let timeout = Qp2PdfError::Timeout {
            tool: "pdflatex".into(),
            secs: 30,
        };
        assert_eq!(timeout.kind().status_code(), 408);
        assert_eq!(Qp2PdfError::Internal("boom".into()).kind().status_code(), 500);
    }

    #[test]
    fn asset_warning_display() {
        let w = AssetWarning::DownloadFailed {
            url: "https://example.com/a.png".into(),
            reason: "HTTP 404 Not Found".into(),
        };
        assert!(w.to_string().contains("a.png"));
        assert!(w.to_string().contains("404"));
    }
}
