//! Pipeline adapter that runs the rewriting tool as a child process.
//!
//! The tool gets the job as command-line flags and answers with one JSON
//! object per stdout line:
//!
//! ```text
//! {"type":"log","message":"Removed 3 unused styles"}
//! {"type":"status","text":"Scaling images","percent":40}
//! {"type":"error","title":"Image step","text":"could not decode image1.png"}
//! {"type":"finished","path":"C:\\out\\report.xlsx"}
//! ```
//!
//! Lines that are not JSON are forwarded as log lines.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::utils::tokio_command;

use super::pipeline::{Pipeline, PipelineHooks, PipelineRequest};

/// Environment variable naming the pipeline program
pub const PIPELINE_ENV: &str = "EXCEL_SLIMMER_PIPELINE";
pub const DEFAULT_PIPELINE_PROGRAM: &str = "excel-suite-pipeline";

const STDERR_TAIL_LINES: usize = 20;
/// How long to wait for stderr to drain once the process has exited
const STDERR_GRACE: Duration = Duration::from_secs(1);

/// Runs an external program per job.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl CommandPipeline {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Program from `EXCEL_SLIMMER_PIPELINE`, or `excel-suite-pipeline` on the PATH.
    pub fn from_env() -> Self {
        let program = std::env::var_os(PIPELINE_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PIPELINE_PROGRAM));
        Self::new(program)
    }

    /// Argument placed before the job flags, e.g. a script for an interpreter.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn spawn(&self, request: &PipelineRequest) -> anyhow::Result<Child> {
        let args = build_args(request);
        debug!("Spawning {} {:?} {:?}", self.program.display(), self.leading_args, args);

        let mut cmd = tokio_command(&self.program);
        cmd.args(&self.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so cancellation also reaches the tool's children.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.as_std_mut().process_group(0);
        }

        cmd.spawn()
            .with_context(|| format!("Failed to start pipeline '{}'", self.program.display()))
    }

    async fn run_child(
        &self,
        request: &PipelineRequest,
        hooks: &mut PipelineHooks,
    ) -> anyhow::Result<()> {
        let mut child = self.spawn(request)?;
        let stdout = child.stdout.take().context("Pipeline stdout was not captured")?;
        let stderr = child.stderr.take().context("Pipeline stderr was not captured")?;
        let mut stderr_reader = tokio::spawn(tail_lines(stderr, STDERR_TAIL_LINES));
        let cancel = hooks.cancellation_token().clone();

        let finished = tokio::select! {
            result = forward_output(&mut child, stdout, hooks) => Some(result),
            _ = cancel.cancelled() => None,
        };

        let status = match finished {
            Some(Ok(status)) => status,
            Some(Err(e)) => {
                stop(&mut child).await;
                stderr_reader.abort();
                return Err(e);
            }
            None => {
                info!("Stopping pipeline process after cancellation");
                stop(&mut child).await;
                stderr_reader.abort();
                return Ok(());
            }
        };

        let stderr_tail = match tokio::time::timeout(STDERR_GRACE, &mut stderr_reader).await {
            Ok(Ok(tail)) => tail,
            _ => {
                stderr_reader.abort();
                Vec::new()
            }
        };

        if hooks.is_terminated() || hooks.is_cancelled() {
            return Ok(());
        }
        check_exit(status, &stderr_tail)
    }
}

impl Pipeline for CommandPipeline {
    fn name(&self) -> &str {
        "command pipeline"
    }

    fn run(&self, request: &PipelineRequest, hooks: &mut PipelineHooks) -> anyhow::Result<()> {
        // Blocking pool threads carry the runtime context of the executor.
        let runtime = Handle::try_current().context("Command pipeline needs a Tokio runtime")?;
        runtime.block_on(self.run_child(request, hooks))
    }
}

/// Command-line flags for one job; the workbook path comes last.
pub fn build_args(request: &PipelineRequest) -> Vec<OsString> {
    let params = request.params();
    let settings = request.settings();
    let precision = params.precision_options();
    let mut args: Vec<OsString> = Vec::new();

    if params.enable_cleanup() {
        args.push("--cleanup".into());
    }
    if params.enable_image_optimization() {
        args.push("--images".into());
    }
    if params.enable_precision() {
        args.push("--precision".into());
        if precision.aggressive_image_conversion {
            args.push("--aggressive-images".into());
        }
        if precision.xml_cleanup {
            args.push("--xml-cleanup".into());
        }
        if precision.hidden_xml_removal {
            args.push("--remove-hidden-xml".into());
        }
    }

    args.push("--max-edge".into());
    args.push(settings.image_max_edge.to_string().into());
    args.push("--quality".into());
    args.push(settings.image_quality.to_string().into());
    if let Some(dir) = &settings.output_directory {
        args.push("--output-dir".into());
        args.push(dir.into());
    }
    if settings.keep_backup {
        args.push("--keep-backup".into());
    }
    if settings.is_verbose() {
        args.push("--verbose".into());
    }

    args.push(request.file_path().into());
    args
}

/// One line of pipeline output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PipelineMessage {
    Log {
        message: String,
    },
    Status {
        text: String,
        #[serde(default)]
        percent: Option<f32>,
    },
    Error {
        #[serde(default)]
        title: String,
        #[serde(default)]
        text: String,
    },
    Finished {
        path: PathBuf,
    },
}

impl PipelineMessage {
    fn apply(self, hooks: &mut PipelineHooks) {
        match self {
            Self::Log { message } => hooks.log(message),
            Self::Status { text, percent } => hooks.status(text, percent),
            Self::Error { title, text } => hooks.error(&title, text),
            Self::Finished { path } => hooks.finished(path),
        }
    }
}

fn parse_line(line: &str) -> Option<PipelineMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let message = serde_json::from_str(line).unwrap_or_else(|_| PipelineMessage::Log {
        message: line.to_string(),
    });
    Some(message)
}

/// Forwards stdout until EOF, then waits for the process to exit.
async fn forward_output(
    child: &mut Child,
    stdout: ChildStdout,
    hooks: &mut PipelineHooks,
) -> anyhow::Result<ExitStatus> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read pipeline output")?;
        if read == 0 {
            break;
        }
        if let Some(message) = parse_line(&String::from_utf8_lossy(&buf)) {
            message.apply(hooks);
        }
    }
    child.wait().await.context("Failed to wait for pipeline")
}

/// Kills the pipeline and everything it started.
async fn stop(child: &mut Child) {
    kill_process_group(child);
    if let Err(e) = child.kill().await {
        warn!("Failed to kill pipeline process: {}", e);
    }
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // Safety: kill(2) only takes plain integers; the group id is the
    // child's pid because it was spawned with process_group(0).
    let ret = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
    if ret != 0 {
        debug!(
            "Failed to kill process group {}: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

async fn tail_lines(stderr: ChildStderr, keep: usize) -> Vec<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(keep);
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("pipeline stderr: {}", line);
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into()
}

fn check_exit(status: ExitStatus, stderr_tail: &[String]) -> anyhow::Result<()> {
    if status.success() {
        return Ok(());
    }
    match stderr_tail.iter().rev().find(|line| !line.trim().is_empty()) {
        Some(last) => bail!("Pipeline exited with {}: {}", status, last.trim()),
        None => bail!("Pipeline exited with {}", status),
    }
}
