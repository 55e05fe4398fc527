//! Shared helpers: fake TeX engines and encryption tools written as shell
//! scripts into a scratch directory.

#![allow(dead_code)]

use qp2pdf::{ServiceConfig, ToolLocator};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Every fake engine appends `<cwd> <args...>` to `calls.log`.
const LOG_FILE: &str = "calls.log";

/// Writes the artifact as `%PDF` followed by the data file and photo listing.
pub const ENGINE_OK: &str = "{ printf '%%PDF-1.5\\n'; cat Reports/question.json 2>/dev/null; \
ls Photo/Qpbank; cat \"$stem.tex\"; } > \"$stem.pdf\"";

/// Produces an artifact but always exits non-zero.
pub const ENGINE_ALWAYS_FAILS: &str =
    "printf '%%PDF-1.5\\n' > \"$stem.pdf\"\necho '! Undefined control sequence.'\nexit 1";

/// Exits cleanly but leaves a zero-byte artifact.
pub const ENGINE_EMPTY: &str = ": > \"$stem.pdf\"";

/// Never finishes within a test timeout.
pub const ENGINE_HANGS: &str = "sleep 30";

/// A directory of fake tools plus the config that finds only them.
pub struct FakeTools {
    dir: TempDir,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Install an executable script.
    pub fn script(&self, name: &str, body: &str) -> &Self {
        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        self
    }

    /// Install a fake TeX engine; `tail` runs with `$stem` set to the
    /// source stem.
    pub fn engine(&self, name: &str, tail: &str) -> &Self {
        let log = self.dir.path().join(LOG_FILE);
        self.script(
            name,
            &format!(
                "for a in \"$@\"; do last=\"$a\"; done\n\
                 stem=\"${{last%.tex}}\"\n\
                 echo \"$(pwd) $@\" >> '{}'\n\
                 {tail}",
                log.display()
            ),
        )
    }

    /// Fake `qpdf` that writes `ENC:<password>` to the output file.
    pub fn qpdf(&self) -> &Self {
        self.script(
            "qpdf",
            "for a in \"$@\"; do out=\"$a\"; done\nprintf 'ENC:%s' \"$2\" > \"$out\"",
        )
    }

    /// One line per engine invocation.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join(LOG_FILE))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Working directories the engine ran in.
    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.calls()
            .iter()
            .filter_map(|l| l.split_whitespace().next().map(PathBuf::from))
            .collect()
    }

    pub fn locator(&self) -> ToolLocator {
        ToolLocator::new(vec![self.dir.path().to_path_buf()]).without_system_path()
    }

    pub fn config(&self) -> ServiceConfig {
        ServiceConfig::builder()
            .tools(self.locator())
            .markup_timeout_secs(5)
            .document_timeout_secs(5)
            .encrypt_timeout_secs(5)
            .image_timeout_secs(5)
            .build()
            .unwrap()
    }
}

/// The reference question paper: one part, one question.
pub fn question_paper_json() -> serde_json::Value {
    serde_json::json!({
        "code": "QP1",
        "title": "Mathematics",
        "stream": "Science",
        "course_name": "BSc",
        "admission_year": "2024",
        "time": "1hr",
        "max_marks": "5",
        "parts": [{
            "name": "A",
            "title": "Part A",
            "description": "Answer all",
            "content": ["Q1. 2+2=?"],
            "footer": "5 marks"
        }]
    })
}

/// Minimal raw-markup request.
pub fn markup_json(engine: &str) -> serde_json::Value {
    serde_json::json!({
        "source_text": "\\documentclass{article}\\begin{document}Hello\\end{document}",
        "engine": engine
    })
}
