//! Compiler invocation: run the LaTeX engine inside the workspace.
//!
//! The engine runs `max_attempts` times (two by default) so forward
//! references such as page totals resolve on the second pass. Every run is
//! bounded by a timeout; a run that overstays is killed and reported as
//! [`Qp2PdfError::Timeout`], never retried.
//!
//! ## Exit-status handling
//!
//! | Mode                   | Non-zero exit                  | Used for          |
//! |------------------------|--------------------------------|-------------------|
//! | [`CompileMode::Strict`]  | aborts with `CompilationFailed` | raw markup        |
//! | [`CompileMode::Lenient`] | logged, loop continues          | question papers   |
//!
//! In both modes the artifact check after the loop has the final word: the
//! `<stem>.pdf` file must exist and be non-empty.

use crate::config::{Engine, ServiceConfig};
use crate::error::Qp2PdfError;
use crate::output::{CompilationResult, ProcessOutput};
use crate::pipeline::workspace::Workspace;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How non-zero compiler exits are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Any non-zero exit fails the compile immediately; passes
    /// `-halt-on-error` to the engine.
    Strict,
    /// Non-zero exits are logged; only the artifact check decides.
    Lenient,
}

impl CompileMode {
    fn args(self, source: &str) -> Vec<String> {
        let mut args = vec!["-interaction=nonstopmode".to_string()];
        if self == CompileMode::Strict {
            args.push("-halt-on-error".to_string());
        }
        args.push(source.to_string());
        args
    }
}

/// One compile request against a prepared workspace.
#[derive(Debug, Clone, Copy)]
pub struct CompileJob<'a> {
    pub engine: Engine,
    /// Source stem; `<stem>.tex` in, `<stem>.pdf` out.
    pub stem: &'a str,
    pub mode: CompileMode,
    pub timeout_secs: u64,
}

/// Run an external program with a hard deadline.
///
/// The child is killed if the deadline passes (the future owning it is
/// dropped with `kill_on_drop`).
pub(crate) async fn run_bounded(
    program: &Path,
    args: &[String],
    cwd: Option<&Path>,
    timeout_secs: u64,
    tool: &str,
) -> Result<ProcessOutput, Qp2PdfError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    debug!("Running {} {}", program.display(), args.join(" "));

    match tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await {
        Ok(Ok(output)) => Ok(ProcessOutput::from(output)),
        Ok(Err(e)) => Err(Qp2PdfError::Internal(format!(
            "Failed to spawn {}: {e}",
            program.display()
        ))),
        Err(_) => {
            warn!("{} exceeded {}s and was killed", tool, timeout_secs);
            Err(Qp2PdfError::Timeout {
                tool: tool.to_string(),
                secs: timeout_secs,
            })
        }
    }
}

/// Compile `<stem>.tex` in the workspace and return the artifact.
pub async fn compile(
    workspace: &Workspace,
    job: CompileJob<'_>,
    config: &ServiceConfig,
) -> Result<CompilationResult, Qp2PdfError> {
    let binary = job.engine.binary();
    let program = config.tools.locate(binary)?;
    let args = job.mode.args(&format!("{}.tex", job.stem));
    let max_attempts = config.max_attempts;
    let progress = config.progress_callback.as_deref();
    let start = Instant::now();

    let mut last_run = ProcessOutput::default();
    for attempt in 1..=max_attempts {
        info!("{} pass {}/{} ({:?})", binary, attempt, max_attempts, job.mode);
        if let Some(cb) = progress {
            cb.on_attempt_start(attempt, max_attempts);
        }

        let run = run_bounded(
            &program,
            &args,
            Some(workspace.root()),
            job.timeout_secs,
            binary,
        )
        .await?;

        if let Some(cb) = progress {
            cb.on_attempt_complete(attempt, run.exit_code);
        }

        if !run.success() {
            match job.mode {
                CompileMode::Strict => {
                    return Err(Qp2PdfError::CompilationFailed {
                        reason: "LaTeX compilation failed".to_string(),
                        stdout: run.stdout,
                        stderr: run.stderr,
                    });
                }
                CompileMode::Lenient => {
                    warn!(
                        "{} pass {} exited with {:?}; continuing",
                        binary, attempt, run.exit_code
                    );
                    debug!("STDOUT:\n{}\nSTDERR:\n{}", run.stdout, run.stderr);
                }
            }
        }
        last_run = run;
    }

    let artifact = workspace.artifact_path(job.stem);
    let pdf = match tokio::fs::read(&artifact).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Err(Qp2PdfError::CompilationFailed {
                reason: "PDF was not generated".to_string(),
                stdout: last_run.stdout,
                stderr: last_run.stderr,
            });
        }
    };
    if pdf.is_empty() {
        return Err(Qp2PdfError::CompilationFailed {
            reason: "Generated PDF is empty".to_string(),
            stdout: last_run.stdout,
            stderr: last_run.stderr,
        });
    }

    let limit = config.max_output_mb.saturating_mul(1024 * 1024);
    if pdf.len() as u64 > limit {
        warn!(
            "Generated PDF is {} bytes, above the {} MB limit",
            pdf.len(),
            config.max_output_mb
        );
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    info!("Compiled {} ({} bytes) in {}ms", artifact.display(), pdf.len(), duration_ms);

    Ok(CompilationResult {
        pdf,
        last_run,
        attempts: max_attempts,
        duration_ms,
    })
}
