//! # tex-toolchain
//!
//! Locate the external binaries a LaTeX-to-PDF service shells out to:
//! TeX engines (`pdflatex`, `lualatex`, `xelatex`) and PDF post-processors
//! (`qpdf`, `pdftk`).
//!
//! ## How it works
//!
//! [`ToolLocator::locate`] resolves a bare tool name to an absolute path:
//!
//! 1. Each directory in [`ToolLocator::dirs`] is checked, in order.
//! 2. If `system_path` is enabled, every entry of `PATH` is checked next.
//! 3. The first candidate that is an executable regular file wins.
//!
//! Resolving to an absolute path up front means callers can report a missing
//! tool as such, instead of decoding a spawn failure after the fact.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tex_toolchain::ToolLocator;
//!
//! let tools = ToolLocator::from_env();
//! match tools.locate("lualatex") {
//!     Ok(path) => println!("lualatex at {}", path.display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
//!
//! ## Environment variable overrides
//!
//! - `QP2PDF_TOOL_DIR`: extra search directories (platform path-list
//!   syntax), consulted before `PATH` by [`ToolLocator::from_env`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable holding extra tool directories.
pub const TOOL_DIR_ENV: &str = "QP2PDF_TOOL_DIR";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tool lookups.
#[derive(Error, Debug)]
pub enum ToolchainError {
    /// The tool name is empty or contains a path separator.
    #[error("Invalid tool name '{0}'")]
    InvalidName(String),

    /// No executable with this name was found in any searched directory.
    #[error("'{tool}' not found (searched {searched} directories)")]
    NotFound { tool: String, searched: usize },
}

// ── Locator ──────────────────────────────────────────────────────────────────

/// Resolves external tool names to executable paths.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    /// Directories searched before `PATH`, in order.
    pub dirs: Vec<PathBuf>,
    /// Whether `PATH` is searched after `dirs`. Default: true.
    pub system_path: bool,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            system_path: true,
        }
    }
}

impl ToolLocator {
    /// A locator that searches `dirs` first, then `PATH`.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            system_path: true,
        }
    }

    /// A locator seeded with the directories listed in `QP2PDF_TOOL_DIR`.
    pub fn from_env() -> Self {
        let dirs = std::env::var_os(TOOL_DIR_ENV)
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        Self::new(dirs)
    }

    /// Restrict the search to the configured directories only.
    pub fn without_system_path(mut self) -> Self {
        self.system_path = false;
        self
    }

    /// Add a directory to the front of the search order.
    pub fn prepend_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.insert(0, dir.into());
        self
    }

    /// Resolve `tool` to the first executable found.
    pub fn locate(&self, tool: &str) -> Result<PathBuf, ToolchainError> {
        if tool.is_empty() || tool.contains('/') || tool.contains('\\') {
            return Err(ToolchainError::InvalidName(tool.to_string()));
        }

        let candidates = self.search_dirs();
        for dir in &candidates {
            for name in executable_names(tool) {
                let path = dir.join(&name);
                if is_executable(&path) {
                    return Ok(path);
                }
            }
        }

        Err(ToolchainError::NotFound {
            tool: tool.to_string(),
            searched: candidates.len(),
        })
    }

    /// Returns `true` if [`Self::locate`] would succeed.
    pub fn is_available(&self, tool: &str) -> bool {
        self.locate(tool).is_ok()
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.dirs.clone();
        if self.system_path {
            if let Some(path) = std::env::var_os("PATH") {
                dirs.extend(std::env::split_paths(&path));
            }
        }
        dirs.retain(|d| !d.as_os_str().is_empty());
        dirs
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

#[cfg(windows)]
fn executable_names(tool: &str) -> Vec<OsString> {
    vec![OsString::from(format!("{tool}.exe")), OsString::from(tool)]
}

#[cfg(not(windows))]
fn executable_names(tool: &str) -> Vec<OsString> {
    vec![OsString::from(tool)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
