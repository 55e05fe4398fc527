//! CLI binary for qp2pdf.
//!
//! `qp2pdf serve` runs the HTTP service; `qp2pdf compile` runs the same
//! pipeline once on a JSON request file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qp2pdf::{
    convert, convert_to_file, router, CompileProgressCallback, ConvertRequest, ProgressCallback,
    ServiceConfig, TemplateMode, ToolLocator,
};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback ────────────────────────────────────────────────

/// Prints one line per compiler pass, image and encryption step.
struct CliProgressCallback;

impl CompileProgressCallback for CliProgressCallback {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        eprintln!("{} pass {attempt}/{max_attempts}", dim("…"));
    }

    fn on_attempt_complete(&self, attempt: u32, exit_code: Option<i32>) {
        match exit_code {
            Some(0) => eprintln!("  {} pass {attempt}", green("✓")),
            other => eprintln!("  {} pass {attempt} exited with {other:?}", red("✗")),
        }
    }

    fn on_image_resolved(&self, name: &str, bytes: usize) {
        eprintln!("  {} {name} {}", green("✓"), dim(&format!("{bytes} bytes")));
    }

    fn on_image_failed(&self, name: &str, reason: String) {
        eprintln!("  {} {name}  {}", red("✗"), red(&reason));
    }

    fn on_protect(&self, tool: Option<&str>) {
        match tool {
            Some(t) => eprintln!("  {} encrypted with {t}", green("✓")),
            None => eprintln!("  {} no encryption tool available; PDF left unprotected", red("!")),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on port 5000
  qp2pdf serve

  # Compile a request file offline
  qp2pdf compile paper.json -o paper.pdf

  # Use binaries from a private TeX install
  qp2pdf --tool-dir /opt/texlive/bin/x86_64-linux serve --port 8080

ENDPOINTS:
  GET  /          service banner
  GET  /health    {"status": "healthy"}
  POST /convert   raw markup or question-paper JSON -> application/pdf

ENVIRONMENT VARIABLES:
  QP2PDF_TOOL_DIR   Extra directories searched for lualatex, qpdf, pdftk
  RUST_LOG          Override the log filter
"#;

/// Compile question papers and LaTeX to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "qp2pdf",
    version,
    about = "Compile question papers and LaTeX sources to PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Timeout for each raw-markup compiler pass, in seconds.
    #[arg(long, global = true, env = "QP2PDF_MARKUP_TIMEOUT", default_value_t = 30)]
    markup_timeout: u64,

    /// Timeout for each question-paper compiler pass, in seconds.
    #[arg(long, global = true, env = "QP2PDF_DOCUMENT_TIMEOUT", default_value_t = 60)]
    document_timeout: u64,

    /// Number of compiler passes.
    #[arg(long, global = true, env = "QP2PDF_MAX_ATTEMPTS", default_value_t = 2)]
    max_attempts: u32,

    /// Timeout for each image download, in seconds.
    #[arg(long, global = true, env = "QP2PDF_IMAGE_TIMEOUT", default_value_t = 10)]
    image_timeout: u64,

    /// Timeout for the encryption tool, in seconds.
    #[arg(long, global = true, env = "QP2PDF_ENCRYPT_TIMEOUT", default_value_t = 30)]
    encrypt_timeout: u64,

    /// Warn when a generated PDF exceeds this size (MB).
    #[arg(long, global = true, env = "QP2PDF_MAX_OUTPUT_MB", default_value_t = 50)]
    max_output_mb: u64,

    /// How question papers are rendered: lua or direct.
    #[arg(long, global = true, env = "QP2PDF_TEMPLATE", value_enum, default_value = "lua")]
    template: TemplateArg,

    /// Directory searched for external tools before PATH (repeatable).
    #[arg(long, global = true)]
    tool_dir: Vec<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "QP2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "QP2PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        #[arg(long, env = "QP2PDF_HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "QP2PDF_PORT", default_value_t = 5000)]
        port: u16,
    },
    /// Compile one JSON request file.
    Compile {
        /// Request file (raw markup or question paper).
        input: PathBuf,

        /// Output PDF path. Defaults to the request's attachment name.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum TemplateArg {
    Lua,
    Direct,
}

impl From<TemplateArg> for TemplateMode {
    fn from(v: TemplateArg) -> Self {
        match v {
            TemplateArg::Lua => TemplateMode::Lua,
            TemplateArg::Direct => TemplateMode::Direct,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve { ref host, port } => {
            let config = build_config(&cli, None)?;
            serve(host, port, config).await
        }
        Command::Compile {
            ref input,
            ref output,
        } => {
            let progress: Option<ProgressCallback> = if cli.quiet {
                None
            } else {
                Some(Arc::new(CliProgressCallback) as Arc<dyn CompileProgressCallback>)
            };
            let config = build_config(&cli, progress)?;
            compile_file(input, output.clone(), &config, cli.quiet).await
        }
    }
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ServiceConfig> {
    let tools = cli
        .tool_dir
        .iter()
        .rev()
        .fold(ToolLocator::from_env(), |locator, dir| locator.prepend_dir(dir));

    let mut builder = ServiceConfig::builder()
        .markup_timeout_secs(cli.markup_timeout)
        .document_timeout_secs(cli.document_timeout)
        .max_attempts(cli.max_attempts)
        .image_timeout_secs(cli.image_timeout)
        .encrypt_timeout_secs(cli.encrypt_timeout)
        .max_output_mb(cli.max_output_mb)
        .template_mode(cli.template.clone().into())
        .tools(tools);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn serve(host: &str, port: u16, config: ServiceConfig) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid bind address {host}:{port}"))?;

    for tool in ["lualatex", "pdflatex", "xelatex", "qpdf", "pdftk"] {
        if !config.tools.is_available(tool) {
            info!("{} not found; requests that need it will fail", tool);
        }
    }

    let app = router(config);
    info!("Starting qp2pdf on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

async fn compile_file(
    input: &Path,
    output: Option<PathBuf>,
    config: &ServiceConfig,
    quiet: bool,
) -> Result<()> {
    let body = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request = ConvertRequest::from_json(&body).context("Invalid request")?;

    let (document, path) = match output {
        Some(path) => {
            let document = convert_to_file(request, &path, config)
                .await
                .context("Compilation failed")?;
            (document, path)
        }
        None => {
            let document = convert(request, config).await.context("Compilation failed")?;
            let path = PathBuf::from(&document.file_name);
            tokio::fs::write(&path, &document.bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            (document, path)
        }
    };

    if !quiet {
        eprintln!(
            "{}  {} bytes{}  →  {}",
            green("✔"),
            document.bytes.len(),
            if document.protected { ", encrypted" } else { "" },
            bold(&path.display().to_string()),
        );
    }
    Ok(())
}
