//! Per-request workspace: an isolated temporary directory tree.
//!
//! ## Layout
//!
//! ```text
//! qp2pdf-XXXXXX/
//!  ├─ Reports/question.json   serialised document (structured path)
//!  ├─ Photo/Qpbank/           resolved image assets
//!  ├─ <stem>.tex              source handed to the engine
//!  └─ <stem>.pdf              artifact written by the engine
//! ```
//!
//! The tree is backed by a [`TempDir`], so it is removed when the
//! [`Workspace`] is dropped: on success, on every `?` early return, and on
//! panic. [`Workspace::release`] exists to surface deletion errors on the
//! happy path. Every request acquires its own directory; nothing is shared.

use crate::error::Qp2PdfError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Directory holding the serialised data file, relative to the root.
pub const REPORTS_DIR: &str = "Reports";

/// Directory holding image assets, relative to the root.
pub const PHOTO_DIR: &str = "Photo/Qpbank";

/// An exclusively-owned temporary directory for one request.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    reports: PathBuf,
    photos: PathBuf,
}

impl Workspace {
    /// Create a fresh directory tree with the fixed subdirectories.
    pub fn acquire() -> Result<Self, Qp2PdfError> {
        let dir = tempfile::Builder::new()
            .prefix("qp2pdf-")
            .tempdir()
            .map_err(|e| Qp2PdfError::workspace(std::env::temp_dir(), e))?;

        let reports = dir.path().join(REPORTS_DIR);
        std::fs::create_dir_all(&reports).map_err(|e| Qp2PdfError::workspace(&reports, e))?;

        let photos = dir.path().join(PHOTO_DIR);
        std::fs::create_dir_all(&photos).map_err(|e| Qp2PdfError::workspace(&photos, e))?;

        debug!("Acquired workspace {}", dir.path().display());
        Ok(Self {
            dir,
            reports,
            photos,
        })
    }

    /// Workspace root; the engine's working directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports
    }

    pub fn photo_dir(&self) -> &Path {
        &self.photos
    }

    /// `<root>/<stem>.tex`
    pub fn source_path(&self, stem: &str) -> PathBuf {
        self.root().join(format!("{stem}.tex"))
    }

    /// `<root>/<stem>.pdf`
    pub fn artifact_path(&self, stem: &str) -> PathBuf {
        self.root().join(format!("{stem}.pdf"))
    }

    /// Path of an image as referenced from the `.tex` source.
    pub fn photo_reference(file_name: &str) -> String {
        format!("./{PHOTO_DIR}/{file_name}")
    }

    /// Delete the tree now, reporting (but not failing on) errors.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Released workspace {}", path.display()),
            Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
        }
    }
}
