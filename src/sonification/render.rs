//! Delegation to the external content-to-audio rendering routine.
//!
//! The routine is launched as
//! `<interpreter> <scripts_dir>/<variant>.<ext> <input> <output> [preset]`
//! with the host environment and `project_root` as working directory. The
//! slice is staged in a per-request scratch file that is removed once the call
//! returns, whatever the outcome.

use async_trait::async_trait;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SonificationConfig;
use crate::sonification::variant::{RenderPreset, ScriptVariant};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to prepare directory {path}: {source}")]
    Setup { path: PathBuf, source: io::Error },
    #[error("rendering script not found: {0}")]
    ScriptNotFound(PathBuf),
    #[error("failed to stage scratch input: {0}")]
    Scratch(io::Error),
    #[error("failed to launch renderer: {0}")]
    Launch(io::Error),
    #[error("renderer exited with code {exit_code:?}: {stderr}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("renderer timed out after {0:?}")]
    TimedOut(Duration),
    #[error("renderer exited successfully but wrote no file to {0}")]
    MissingOutput(PathBuf),
}

/// One render call.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub request_id: Uuid,
    pub slice: &'a str,
    pub variant: &'a ScriptVariant,
    pub preset: Option<&'a RenderPreset>,
    pub file_name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    /// Captured standard output, treated as opaque result text
    pub stdout: String,
    pub output_path: PathBuf,
}

#[async_trait]
pub trait RenderDelegate: Send + Sync {
    async fn render(&self, request: RenderRequest<'_>) -> Result<RenderOutput, RenderError>;
}

/// Runs rendering scripts through a configured interpreter.
#[derive(Debug, Clone)]
pub struct ScriptRenderer {
    interpreter: PathBuf,
    scripts_dir: PathBuf,
    script_extension: String,
    audio_dir: PathBuf,
    scratch_dir: PathBuf,
    project_root: PathBuf,
    timeout: Duration,
}

impl ScriptRenderer {
    /// Build a renderer, creating the audio and scratch directories if needed.
    ///
    /// All paths are made absolute up front because the subprocess runs with
    /// `project_root` as its working directory.
    pub fn new(config: &SonificationConfig) -> Result<Self, RenderError> {
        let audio_dir = prepare_dir(&config.audio_dir)?;
        let scratch_dir = prepare_dir(&config.scratch_dir)?;

        let interpreter = PathBuf::from(&config.python_path);
        // Bare program names are looked up on PATH, anything else is a path
        let interpreter = if interpreter.components().count() > 1 {
            absolute(&interpreter)?
        } else {
            interpreter
        };

        Ok(Self {
            interpreter,
            scripts_dir: absolute(&config.scripts_dir)?,
            script_extension: config.script_extension.clone(),
            audio_dir,
            scratch_dir,
            project_root: absolute(&config.project_root)?,
            timeout: config.render_timeout(),
        })
    }

    pub fn script_path(&self, variant: &ScriptVariant) -> PathBuf {
        self.scripts_dir
            .join(format!("{}.{}", variant.as_str(), self.script_extension))
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.audio_dir.join(file_name)
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    fn stage_slice(&self, request_id: Uuid, slice: &str) -> Result<tempfile::NamedTempFile, RenderError> {
        let mut scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", request_id))
            .suffix(".html")
            .tempfile_in(&self.scratch_dir)
            .map_err(RenderError::Scratch)?;
        scratch
            .write_all(slice.as_bytes())
            .map_err(RenderError::Scratch)?;
        scratch.flush().map_err(RenderError::Scratch)?;
        Ok(scratch)
    }
}

#[async_trait]
impl RenderDelegate for ScriptRenderer {
    async fn render(&self, request: RenderRequest<'_>) -> Result<RenderOutput, RenderError> {
        let started_at = Instant::now();
        let script_path = self.script_path(request.variant);
        if !tokio::fs::try_exists(&script_path).await.unwrap_or(false) {
            warn!(
                op = "sonify.render",
                request_id = %request.request_id,
                result = "error",
                error_code = "script_not_found",
                script = %script_path.display(),
                "Rendering script not found"
            );
            return Err(RenderError::ScriptNotFound(script_path));
        }

        // Removed from disk when dropped at the end of this call
        let scratch = self.stage_slice(request.request_id, request.slice)?;
        let output_path = self.output_path(request.file_name);

        let mut command = Command::new(&self.interpreter);
        command
            .arg(&script_path)
            .arg(scratch.path())
            .arg(&output_path);
        if let Some(preset) = request.preset {
            command.arg(preset.as_str());
        }
        command
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|err| {
            warn!(
                op = "sonify.render",
                request_id = %request.request_id,
                result = "error",
                error_code = "spawn",
                interpreter = %self.interpreter.display(),
                error = %err,
                "Failed to launch renderer"
            );
            RenderError::Launch(err)
        })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(RenderError::Launch(err)),
            Err(_) => {
                warn!(
                    op = "sonify.render",
                    request_id = %request.request_id,
                    result = "timeout",
                    timeout_ms = self.timeout.as_millis() as u64,
                    variant = %request.variant,
                    "Renderer timed out; process killed"
                );
                return Err(RenderError::TimedOut(self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        if !output.status.success() {
            let exit_code = output.status.code();
            warn!(
                op = "sonify.render",
                request_id = %request.request_id,
                result = "error",
                error_code = "renderer_exit",
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                elapsed_ms,
                stderr = %stderr,
                "Renderer exited with failure"
            );
            return Err(RenderError::Failed { exit_code, stderr });
        }

        if !stderr.trim().is_empty() {
            warn!(
                op = "sonify.render",
                request_id = %request.request_id,
                stderr = %stderr.trim_end(),
                "Renderer reported diagnostics"
            );
        }

        match tokio::fs::metadata(&output_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(RenderError::MissingOutput(output_path)),
        }

        info!(
            op = "sonify.render",
            request_id = %request.request_id,
            result = "ok",
            variant = %request.variant,
            elapsed_ms,
            output = %output_path.display(),
            stdout_bytes = stdout.len(),
            "Audio rendered"
        );

        Ok(RenderOutput {
            stdout,
            output_path,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, RenderError> {
    std::path::absolute(path).map_err(|source| RenderError::Setup {
        path: path.to_path_buf(),
        source,
    })
}

fn prepare_dir(path: &Path) -> Result<PathBuf, RenderError> {
    std::fs::create_dir_all(path).map_err(|source| RenderError::Setup {
        path: path.to_path_buf(),
        source,
    })?;
    absolute(path)
}
