//! Runs one job on a blocking worker and streams its progress.
//!
//! The pipeline is called inside `tokio::task::spawn_blocking` so the async
//! runtime (and with it the UI) is never blocked. A small watcher task waits
//! for the worker and makes sure the channel always ends with exactly one
//! terminal event, whatever the pipeline did.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver};
pub use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{JobId, JobParameters, ProgressEvent, Settings};
use crate::utils::display_name;

use super::pipeline::{Pipeline, PipelineHooks, PipelineRequest};

/// Message used when a job stops because it was cancelled
pub const CANCELLED_MESSAGE: &str = "Job cancelled";

/// One job as handed to the executor.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: JobId,
    pub params: JobParameters,
    /// Snapshot taken at submission; never re-read during the run
    pub settings: Settings,
    pub cancel: CancellationToken,
}

/// Receiving end of a job's progress events.
///
/// Events arrive in the order the pipeline produced them. After the terminal
/// event the channel is closed.
#[derive(Debug)]
pub struct ProgressChannel {
    rx: UnboundedReceiver<ProgressEvent>,
}

impl ProgressChannel {
    /// Waits for the next event, `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Takes an already produced event without waiting.
    ///
    /// `TryRecvError::Empty` means nothing is pending yet,
    /// `TryRecvError::Disconnected` that the job's stream is over.
    pub fn try_recv(&mut self) -> Result<ProgressEvent, TryRecvError> {
        self.rx.try_recv()
    }
}

/// Starts pipeline runs on the blocking thread pool.
#[derive(Clone)]
pub struct JobExecutor {
    pipeline: Arc<dyn Pipeline>,
}

impl JobExecutor {
    pub fn new(pipeline: Arc<dyn Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Begins running `job` and returns immediately with its event channel.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, job: JobSpec) -> ProgressChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        let terminated = Arc::new(AtomicBool::new(false));
        let cancel = job.cancel.clone();

        let mut hooks = PipelineHooks::new(tx.clone(), terminated.clone(), job.cancel);
        let request = PipelineRequest::new(job.params, job.settings);
        let pipeline = self.pipeline.clone();
        let job_id = job.id;

        info!(
            "Starting job {} on '{}' ({}) with {}",
            job_id,
            display_name(request.file_path()),
            request.params().describe(),
            pipeline.name()
        );

        let worker = tokio::task::spawn_blocking(move || pipeline.run(&request, &mut hooks));

        tokio::spawn(async move {
            let result = worker.await;
            if terminated.load(Ordering::Acquire) {
                if let Ok(Err(e)) = &result {
                    debug!("Job {} returned an error after its terminal event: {:#}", job_id, e);
                }
                return;
            }

            let message = match result {
                _ if cancel.is_cancelled() => CANCELLED_MESSAGE.to_string(),
                Ok(Ok(())) => "Pipeline ended without reporting a result".to_string(),
                Ok(Err(e)) => format!("Unexpected error: {e:#}"),
                Err(join_error) if join_error.is_panic() => {
                    format!("Pipeline panicked: {}", panic_message(join_error.into_panic()))
                }
                Err(join_error) => format!("Pipeline task was aborted: {join_error}"),
            };
            warn!("Job {} failed: {}", job_id, message);

            terminated.store(true, Ordering::Release);
            let _ = tx.send(ProgressEvent::failed(message));
            // Dropping the last sender closes the channel.
        });

        ProgressChannel { rx }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunRequest;
    use crate::processing::pipeline::pipeline_fn;
    use crate::utils::validate;
    use anyhow::anyhow;
    use tempfile::TempDir;

    fn spec(dir: &TempDir) -> JobSpec {
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, b"PK").unwrap();
        JobSpec {
            id: JobId::new(),
            params: validate(&RunRequest::new(path).cleanup(true)).unwrap(),
            settings: Settings::default(),
            cancel: CancellationToken::new(),
        }
    }

    async fn collect(mut channel: ProgressChannel) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = channel.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn forwards_hooks_in_order_with_sticky_percent() {
        crate::test_utils::init_tracing();
        let dir = TempDir::new().unwrap();
        let executor = JobExecutor::new(Arc::new(pipeline_fn(
            |_req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.log("starting cleanup");
                hooks.status("cleaning", Some(10.0));
                hooks.status("cleaning", None);
                hooks.finished("report.slim.xlsx");
                Ok(())
            },
        )));

        let events = collect(executor.start(spec(&dir))).await;
        assert_eq!(
            events,
            vec![
                ProgressEvent::log("starting cleanup"),
                ProgressEvent::status("cleaning", Some(10.0)),
                ProgressEvent::status("cleaning", Some(10.0)),
                ProgressEvent::completed("report.slim.xlsx"),
            ]
        );
    }

    #[tokio::test]
    async fn percent_stays_absent_until_first_value() {
        let dir = TempDir::new().unwrap();
        let executor = JobExecutor::new(Arc::new(pipeline_fn(
            |_req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.status("opening", None);
                hooks.status("scaling", Some(150.0));
                hooks.status("scaling", Some(f32::NAN));
                hooks.finished("out.xlsx");
                Ok(())
            },
        )));

        let events = collect(executor.start(spec(&dir))).await;
        assert_eq!(events[0], ProgressEvent::status("opening", None));
        assert_eq!(events[1], ProgressEvent::status("scaling", Some(100.0)));
        assert_eq!(events[2], ProgressEvent::status("scaling", Some(100.0)));
    }

    #[tokio::test]
    async fn error_without_hooks_becomes_single_failure() {
        let dir = TempDir::new().unwrap();
        let executor = JobExecutor::new(Arc::new(pipeline_fn(
            |_req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.log("reading workbook");
                Err(anyhow!("zip archive is corrupt"))
            },
        )));

        let events = collect(executor.start(spec(&dir))).await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            ProgressEvent::Failed { message } => assert!(message.contains("zip archive is corrupt")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn only_the_first_terminal_event_is_sent() {
        let dir = TempDir::new().unwrap();
        let executor = JobExecutor::new(Arc::new(pipeline_fn(
            |_req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.error("Image step", "could not decode image1.png");
                hooks.log("late log line");
                hooks.finished("out.xlsx");
                Err(anyhow!("also returned an error"))
            },
        )));

        let events = collect(executor.start(spec(&dir))).await;
        assert_eq!(events, vec![ProgressEvent::failed("could not decode image1.png")]);
    }

    #[tokio::test]
    async fn silent_return_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let executor = JobExecutor::new(Arc::new(pipeline_fn(
            |_req: &PipelineRequest, _hooks: &mut PipelineHooks| Ok(()),
        )));

        let events = collect(executor.start(spec(&dir))).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ProgressEvent::Failed { message } if !message.is_empty()));
    }

    #[tokio::test]
    async fn panic_is_reported_as_failure() {
        crate::test_utils::init_tracing();
        let dir = TempDir::new().unwrap();
        let executor = JobExecutor::new(Arc::new(pipeline_fn(
            |_req: &PipelineRequest, _hooks: &mut PipelineHooks| -> anyhow::Result<()> {
                panic!("index out of range in sheet3")
            },
        )));

        let events = collect(executor.start(spec(&dir))).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            ProgressEvent::Failed { message } => assert!(message.contains("sheet3")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancelled_run_reports_cancellation() {
        let dir = TempDir::new().unwrap();
        let job = spec(&dir);
        job.cancel.cancel();
        let executor = JobExecutor::new(Arc::new(pipeline_fn(
            |_req: &PipelineRequest, hooks: &mut PipelineHooks| {
                if hooks.is_cancelled() {
                    return Ok(());
                }
                hooks.finished("out.xlsx");
                Ok(())
            },
        )));

        let events = collect(executor.start(job)).await;
        assert_eq!(events, vec![ProgressEvent::failed(CANCELLED_MESSAGE)]);
    }

    #[tokio::test]
    async fn pipeline_sees_settings_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut job = spec(&dir);
        job.settings.image_quality = 92;
        let executor = JobExecutor::new(Arc::new(pipeline_fn(
            |req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.log(format!("quality {}", req.settings().image_quality));
                hooks.finished(req.file_path());
                Ok(())
            },
        )));

        let events = collect(executor.start(job)).await;
        assert_eq!(events[0], ProgressEvent::log("quality 92"));
    }

    #[tokio::test]
    async fn try_recv_reports_closed_channel() {
        let dir = TempDir::new().unwrap();
        let executor = JobExecutor::new(Arc::new(pipeline_fn(
            |_req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.finished("out.xlsx");
                Ok(())
            },
        )));

        let mut channel = executor.start(spec(&dir));
        let first = channel.recv().await;
        assert_eq!(first, Some(ProgressEvent::completed("out.xlsx")));
        assert_eq!(channel.recv().await, None);
        assert_eq!(channel.try_recv(), Err(TryRecvError::Disconnected));
    }
}
