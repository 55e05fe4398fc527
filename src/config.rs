//! Configuration types for LaTeX-to-PDF compilation.
//!
//! All pipeline behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The config is constructed once at startup and
//! passed down explicitly to every stage; nothing in the library reads
//! process-wide state.

use crate::error::Qp2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tex_toolchain::ToolLocator;

/// Configuration for the compilation pipeline.
///
/// Built via [`ServiceConfig::builder()`] or using
/// [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use qp2pdf::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .document_timeout_secs(90)
///     .image_timeout_secs(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Per-invocation compiler timeout for raw-markup requests. Default: 30.
    pub markup_timeout_secs: u64,

    /// Per-invocation compiler timeout for structured documents. Default: 60.
    ///
    /// The question-paper template loads fontspec, polyglossia and several
    /// script fonts, so a cold lualatex run takes noticeably longer than a
    /// plain pdflatex one.
    pub document_timeout_secs: u64,

    /// Compiler passes per request. Default: 2.
    ///
    /// The second pass resolves forward references (total page count,
    /// cross-references) written to the `.aux` file by the first.
    pub max_attempts: u32,

    /// Timeout for each remote image fetch in seconds. Default: 10.
    pub image_timeout_secs: u64,

    /// Timeout for each encryption tool invocation in seconds. Default: 30.
    pub encrypt_timeout_secs: u64,

    /// Artifacts larger than this many megabytes are logged as a warning. Default: 50.
    pub max_output_mb: u64,

    /// How the question-paper body is produced. Default: [`TemplateMode::Lua`].
    pub template_mode: TemplateMode,

    /// Where external binaries are looked up.
    pub tools: ToolLocator,

    /// Optional observer for compile attempts, image resolution and encryption.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            markup_timeout_secs: 30,
            document_timeout_secs: 60,
            max_attempts: 2,
            image_timeout_secs: 10,
            encrypt_timeout_secs: 30,
            max_output_mb: 50,
            template_mode: TemplateMode::default(),
            tools: ToolLocator::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("markup_timeout_secs", &self.markup_timeout_secs)
            .field("document_timeout_secs", &self.document_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("encrypt_timeout_secs", &self.encrypt_timeout_secs)
            .field("max_output_mb", &self.max_output_mb)
            .field("template_mode", &self.template_mode)
            .field("tools", &self.tools)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn CompileProgressCallback>"),
            )
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn markup_timeout_secs(mut self, secs: u64) -> Self {
        self.config.markup_timeout_secs = secs;
        self
    }

    pub fn document_timeout_secs(mut self, secs: u64) -> Self {
        self.config.document_timeout_secs = secs;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs;
        self
    }

    pub fn encrypt_timeout_secs(mut self, secs: u64) -> Self {
        self.config.encrypt_timeout_secs = secs;
        self
    }

    pub fn max_output_mb(mut self, mb: u64) -> Self {
        self.config.max_output_mb = mb;
        self
    }

    pub fn template_mode(mut self, mode: TemplateMode) -> Self {
        self.config.template_mode = mode;
        self
    }

    pub fn tools(mut self, tools: ToolLocator) -> Self {
        self.config.tools = tools;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, Qp2PdfError> {
        let c = &self.config;
        if c.markup_timeout_secs == 0 || c.document_timeout_secs == 0 {
            return Err(Qp2PdfError::InvalidConfig(
                "Compiler timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.image_timeout_secs == 0 || c.encrypt_timeout_secs == 0 {
            return Err(Qp2PdfError::InvalidConfig(
                "Image and encryption timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_attempts == 0 {
            return Err(Qp2PdfError::InvalidConfig("Attempts must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// TeX engine selectable for raw-markup requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Pdflatex,
    Lualatex,
    Xelatex,
}

impl Engine {
    /// Binary name of the engine.
    pub fn binary(self) -> &'static str {
        match self {
            Engine::Pdflatex => "pdflatex",
            Engine::Lualatex => "lualatex",
            Engine::Xelatex => "xelatex",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

impl FromStr for Engine {
    type Err = Qp2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdflatex" => Ok(Engine::Pdflatex),
            "lualatex" => Ok(Engine::Lualatex),
            "xelatex" => Ok(Engine::Xelatex),
            other => Err(Qp2PdfError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// How the question-paper body reaches the engine.
///
/// | Mode | Body emitted by | Engine input |
/// |------|-----------------|--------------|
/// | `Lua` | `luacode*` block reading `Reports/question.json` at compile time | template + data file |
/// | `Direct` | this crate, in-process | fully expanded `.tex` (data file still written) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemplateMode {
    /// Fixed template whose Lua block reads the data file. (default)
    #[default]
    Lua,
    /// Expanded source emitted in-process.
    Direct,
}
