//! Contract between the job bridge and the workbook rewriting pipeline.
//!
//! The pipeline itself is an external collaborator: it gets one
//! [`PipelineRequest`] per job and reports back through [`PipelineHooks`].
//! It runs on a blocking worker thread and may block freely.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use crate::core::{JobParameters, ProgressEvent, Settings};

/// Everything a pipeline needs for one run: the validated parameters and the
/// settings snapshot taken at submission.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    params: JobParameters,
    settings: Settings,
}

impl PipelineRequest {
    pub fn new(params: JobParameters, settings: Settings) -> Self {
        Self { params, settings }
    }

    pub fn params(&self) -> &JobParameters {
        &self.params
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn file_path(&self) -> &Path {
        self.params.target_path()
    }
}

/// The workbook rewriting pipeline.
///
/// Implementations report through `hooks` and should end with exactly one
/// of [`PipelineHooks::finished`] or [`PipelineHooks::error`]. Returning an
/// error, or returning without a terminal hook, still ends the job with a
/// single failure.
pub trait Pipeline: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &str {
        "pipeline"
    }

    fn run(&self, request: &PipelineRequest, hooks: &mut PipelineHooks) -> anyhow::Result<()>;
}

impl<F> Pipeline for F
where
    F: Fn(&PipelineRequest, &mut PipelineHooks) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn run(&self, request: &PipelineRequest, hooks: &mut PipelineHooks) -> anyhow::Result<()> {
        self(request, hooks)
    }
}

/// Wraps a closure as a [`Pipeline`], pinning down its argument lifetimes.
pub fn pipeline_fn<F>(f: F) -> F
where
    F: Fn(&PipelineRequest, &mut PipelineHooks) -> anyhow::Result<()> + Send + Sync + 'static,
{
    f
}

/// Callback surface handed to a running pipeline.
///
/// Every call becomes one [`ProgressEvent`] on the job's channel, in call
/// order. Once a terminal event has gone out, further calls are dropped.
pub struct PipelineHooks {
    tx: UnboundedSender<ProgressEvent>,
    last_percent: Option<f32>,
    terminated: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl PipelineHooks {
    pub(crate) fn new(
        tx: UnboundedSender<ProgressEvent>,
        terminated: Arc<AtomicBool>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tx,
            last_percent: None,
            terminated,
            cancel,
        }
    }

    /// Appends a line to the job log.
    pub fn log(&mut self, message: impl Into<String>) {
        self.send(ProgressEvent::log(message));
    }

    /// Updates the status line. `None` keeps the last percentage that was
    /// reported; explicit values are clamped to 0–100.
    pub fn status(&mut self, text: impl Into<String>, percent: Option<f32>) {
        if let Some(p) = percent.filter(|p| !p.is_nan()) {
            self.last_percent = Some(p.clamp(0.0, 100.0));
        }
        self.send(ProgressEvent::status(text, self.last_percent));
    }

    /// Reports a failure. Ends the job.
    pub fn error(&mut self, title: &str, text: impl Into<String>) {
        let text = text.into();
        warn!("Pipeline reported error: {}: {}", title, text);
        let message = if !text.trim().is_empty() {
            text
        } else if !title.trim().is_empty() {
            title.to_string()
        } else {
            "Unknown pipeline error".to_string()
        };
        self.send(ProgressEvent::failed(message));
    }

    /// Reports the final workbook path. Ends the job.
    pub fn finished(&mut self, final_path: impl Into<PathBuf>) {
        self.send(ProgressEvent::completed(final_path));
    }

    /// True once the user asked to cancel; pipelines check this between stages.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True once a terminal event has been sent.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    fn send(&mut self, event: ProgressEvent) {
        if self.is_terminated() {
            debug!("Dropping event after terminal: {:?}", event);
            return;
        }
        if event.is_terminal() {
            self.terminated.store(true, Ordering::Release);
        }
        // The receiver only goes away when the supervisor is gone; nothing to report to then.
        let _ = self.tx.send(event);
    }
}
