//! Owns the "is a job running" state and consumes job progress.
//!
//! At most one job is in flight. Its handle sits in a `watch` slot that is
//! claimed atomically on submit and released only by the drain task, after
//! the terminal callback has run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{JobHandle, JobId, JobStatus, ProgressEvent, RunOutcome, RunRequest, Settings};
use crate::utils::{
    FileRevealer, SharedSettings, SubmitError, SystemRevealer, describe_size_change, display_name,
    file_size, validate,
};

use super::executor::{JobExecutor, JobSpec, ProgressChannel};
use super::pipeline::Pipeline;

/// Receives a job's progress on the supervisor's drain task.
///
/// Calls arrive in the order the pipeline produced them, and every job ends
/// with exactly one `on_success` or `on_failure`. Implementations must not
/// block; hand the data to the UI and return.
pub trait JobObserver: Send + Sync + 'static {
    fn on_log(&self, message: &str);

    /// `percent` is the last known percentage, kept across updates that
    /// did not carry one.
    fn on_status(&self, text: &str, percent: Option<f32>);

    fn on_success(&self, path: &Path);

    fn on_failure(&self, message: &str);
}

struct ActiveJob {
    handle: JobHandle,
    cancel: CancellationToken,
}

/// Single-job supervisor. Cheap to clone; clones share the same slot.
#[derive(Clone)]
pub struct JobSupervisor {
    executor: JobExecutor,
    settings: SharedSettings,
    revealer: Arc<dyn FileRevealer>,
    slot: Arc<watch::Sender<Option<ActiveJob>>>,
}

impl JobSupervisor {
    pub fn new(pipeline: Arc<dyn Pipeline>, settings: SharedSettings) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            executor: JobExecutor::new(pipeline),
            settings,
            revealer: Arc::new(SystemRevealer),
            slot: Arc::new(slot),
        }
    }

    /// Replaces the action used to show finished files.
    pub fn with_revealer(mut self, revealer: Arc<dyn FileRevealer>) -> Self {
        self.revealer = revealer;
        self
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Validates `request` and starts it with a snapshot of the current settings.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(
        &self,
        request: &RunRequest,
        observer: Arc<dyn JobObserver>,
    ) -> Result<JobHandle, SubmitError> {
        self.submit_with_settings(request, self.settings.snapshot(), observer)
    }

    /// Like [`submit`](Self::submit) but with a snapshot the caller already took.
    pub fn submit_with_settings(
        &self,
        request: &RunRequest,
        settings: Settings,
        observer: Arc<dyn JobObserver>,
    ) -> Result<JobHandle, SubmitError> {
        if let Some(id) = self.current_id() {
            debug!("Rejecting submission, job {} still running", id);
            return Err(SubmitError::Busy(id));
        }

        let params = validate(request)?;
        let handle = JobHandle::new(params.target_path());
        let cancel = CancellationToken::new();

        let mut busy_with = None;
        self.slot.send_if_modified(|slot| match slot {
            Some(active) => {
                busy_with = Some(active.handle.id());
                false
            }
            None => {
                *slot = Some(ActiveJob {
                    handle: handle.clone(),
                    cancel: cancel.clone(),
                });
                true
            }
        });
        if let Some(id) = busy_with {
            return Err(SubmitError::Busy(id));
        }

        let channel = self.executor.start(JobSpec {
            id: handle.id(),
            params,
            settings,
            cancel,
        });
        tokio::spawn(self.clone().drain(handle.id(), channel, observer));

        Ok(handle)
    }

    pub fn is_busy(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Handle of the job in flight.
    pub fn current(&self) -> Option<JobHandle> {
        self.slot.borrow().as_ref().map(|active| active.handle.clone())
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from(self.slot.borrow().as_ref().map(|active| &active.handle))
    }

    /// Asks the running job to stop. Returns false when idle.
    ///
    /// Cancellation is cooperative; the job still ends with its own terminal
    /// event.
    pub fn cancel(&self) -> bool {
        match self.slot.borrow().as_ref() {
            Some(active) => {
                info!("Cancellation requested for job {}", active.handle.id());
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Resolves once no job is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.slot.subscribe();
        // The sender lives in `self`, so this cannot fail while we wait.
        let _ = rx.wait_for(|slot| slot.is_none()).await;
    }

    fn current_id(&self) -> Option<JobId> {
        self.slot.borrow().as_ref().map(|active| active.handle.id())
    }

    async fn drain(self, id: JobId, mut channel: ProgressChannel, observer: Arc<dyn JobObserver>) {
        // Release the slot even if an observer panics.
        let _release = SlotRelease {
            slot: self.slot.clone(),
            id,
        };

        let mut percent = None;
        let mut outcome = None;
        while let Some(event) = channel.recv().await {
            match event {
                ProgressEvent::LogLine { message } => observer.on_log(&message),
                ProgressEvent::StatusUpdate { text, percent: p } => {
                    if p.is_some() {
                        percent = p;
                    }
                    observer.on_status(&text, percent);
                }
                terminal => {
                    outcome = RunOutcome::from_terminal(&terminal);
                    break;
                }
            }
        }

        match outcome {
            Some(RunOutcome::Success { path }) => {
                info!("Job {} finished: {}", id, path.display());
                observer.on_success(&path);
                self.finish_detached(path);
            }
            Some(RunOutcome::Failure { message }) => {
                warn!("Job {} failed: {}", id, message);
                observer.on_failure(&message);
            }
            None => {
                warn!("Job {} channel closed without a result", id);
                observer.on_failure("Job ended without a result");
            }
        }
    }

    /// Logs the size change and shows the result file off the async task.
    /// Reveal failures are only logged.
    fn finish_detached(&self, path: PathBuf) {
        let revealer = self.revealer.clone();
        let original = self.current().map(|handle| handle.target().to_path_buf());
        drop(tokio::task::spawn_blocking(move || {
            if let Some(original) = original {
                log_size_change(&original, &path);
            }
            if let Err(e) = revealer.reveal(&path) {
                warn!("Could not reveal {}: {}", path.display(), e);
            }
        }));
    }
}

fn log_size_change(original: &Path, result: &Path) {
    if let (Some(before), Some(after)) = (file_size(original), file_size(result)) {
        info!("{}: {}", display_name(result), describe_size_change(before, after));
    }
}

/// Clears the slot for one job when dropped.
struct SlotRelease {
    slot: Arc<watch::Sender<Option<ActiveJob>>>,
    id: JobId,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let id = self.id;
        let released = self.slot.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|active| active.handle.id() == id) {
                *slot = None;
                true
            } else {
                false
            }
        });
        if released {
            debug!("Job {} released", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PrecisionOptions;
    use crate::processing::pipeline::{PipelineHooks, PipelineRequest, pipeline_fn};
    use crate::utils::{JsonFileStore, NoopRevealer, ValidationError};
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Log(String),
        Status(String, Option<f32>),
        Success(PathBuf),
        Failure(String),
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Seen>>);

    impl Recorder {
        fn seen(&self) -> Vec<Seen> {
            self.0.lock().unwrap().clone()
        }
    }

    impl JobObserver for Recorder {
        fn on_log(&self, message: &str) {
            self.0.lock().unwrap().push(Seen::Log(message.to_string()));
        }
        fn on_status(&self, text: &str, percent: Option<f32>) {
            self.0.lock().unwrap().push(Seen::Status(text.to_string(), percent));
        }
        fn on_success(&self, path: &Path) {
            self.0.lock().unwrap().push(Seen::Success(path.to_path_buf()));
        }
        fn on_failure(&self, message: &str) {
            self.0.lock().unwrap().push(Seen::Failure(message.to_string()));
        }
    }

    /// Blocks a pipeline until the test opens it.
    #[derive(Default)]
    struct Gate {
        open: Mutex<bool>,
        cond: std::sync::Condvar,
    }

    impl Gate {
        fn wait(&self) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cond.wait(open).unwrap();
            }
        }

        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cond.notify_all();
        }
    }

    struct ChannelRevealer(mpsc::UnboundedSender<PathBuf>);

    impl FileRevealer for ChannelRevealer {
        fn reveal(&self, path: &Path) -> io::Result<()> {
            let _ = self.0.send(path.to_path_buf());
            Ok(())
        }
    }

    struct BrokenRevealer;

    impl FileRevealer for BrokenRevealer {
        fn reveal(&self, _path: &Path) -> io::Result<()> {
            Err(io::Error::other("no file manager"))
        }
    }

    fn settings(dir: &TempDir) -> SharedSettings {
        SharedSettings::load(Arc::new(JsonFileStore::new(dir.path().join("settings.json"))))
    }

    fn workbook(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();
        path
    }

    #[tokio::test]
    async fn example_run_reaches_observer_in_order() {
        crate::test_utils::init_tracing();
        let dir = TempDir::new().unwrap();
        let path = workbook(&dir);
        let (reveal_tx, mut reveal_rx) = mpsc::unbounded_channel();
        let supervisor = JobSupervisor::new(
            Arc::new(pipeline_fn(|_req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.log("starting cleanup");
                hooks.status("cleaning", Some(10.0));
                hooks.status("cleaning", None);
                hooks.finished("report.slim.xlsx");
                Ok(())
            })),
            settings(&dir),
        )
        .with_revealer(Arc::new(ChannelRevealer(reveal_tx)));

        let recorder = Arc::new(Recorder::default());
        supervisor
            .submit(&RunRequest::new(&path).cleanup(true), recorder.clone())
            .unwrap();
        supervisor.wait_idle().await;

        assert_eq!(
            recorder.seen(),
            vec![
                Seen::Log("starting cleanup".into()),
                Seen::Status("cleaning".into(), Some(10.0)),
                Seen::Status("cleaning".into(), Some(10.0)),
                Seen::Success(PathBuf::from("report.slim.xlsx")),
            ]
        );

        let revealed = tokio::time::timeout(Duration::from_secs(5), reveal_rx.recv())
            .await
            .unwrap();
        assert_eq!(revealed, Some(PathBuf::from("report.slim.xlsx")));
    }

    #[tokio::test]
    async fn second_submit_is_rejected_while_busy() {
        let dir = TempDir::new().unwrap();
        let path = workbook(&dir);
        let gate = Arc::new(Gate::default());
        let runs = Arc::new(AtomicUsize::new(0));

        let pipeline = {
            let gate = gate.clone();
            let runs = runs.clone();
            pipeline_fn(move |req: &PipelineRequest, hooks: &mut PipelineHooks| {
                runs.fetch_add(1, Ordering::SeqCst);
                gate.wait();
                hooks.finished(req.file_path());
                Ok(())
            })
        };
        let supervisor = JobSupervisor::new(Arc::new(pipeline), settings(&dir))
            .with_revealer(Arc::new(NoopRevealer));
        let request = RunRequest::new(&path).cleanup(true);

        let first = supervisor
            .submit(&request, Arc::new(Recorder::default()))
            .unwrap();
        assert!(supervisor.is_busy());
        assert_eq!(supervisor.current().map(|h| h.id()), Some(first.id()));

        let second = supervisor.submit(&request, Arc::new(Recorder::default()));
        assert_eq!(second, Err(SubmitError::Busy(first.id())));

        gate.open();
        supervisor.wait_idle().await;
        assert!(!supervisor.is_busy());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let recorder = Arc::new(Recorder::default());
        let third = supervisor.submit(&request, recorder.clone()).unwrap();
        assert_ne!(third.id(), first.id());
        supervisor.wait_idle().await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(matches!(recorder.seen().last(), Some(Seen::Success(_))));
    }

    #[tokio::test]
    async fn invalid_request_never_starts_a_job() {
        let dir = TempDir::new().unwrap();
        let path = workbook(&dir);
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = {
            let runs = runs.clone();
            pipeline_fn(move |_req: &PipelineRequest, _hooks: &mut PipelineHooks| {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let supervisor = JobSupervisor::new(Arc::new(pipeline), settings(&dir));

        let request = RunRequest::new(&path).precision(PrecisionOptions::default());
        let result = supervisor.submit(&request, Arc::new(Recorder::default()));

        assert_eq!(
            result,
            Err(SubmitError::Validation(ValidationError::PrecisionRequiresSubOption))
        );
        assert!(!supervisor.is_busy());
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_returns_supervisor_to_idle() {
        let dir = TempDir::new().unwrap();
        let path = workbook(&dir);
        let supervisor = JobSupervisor::new(
            Arc::new(pipeline_fn(|_req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.status("reading", Some(40.0));
                hooks.error("Read failed", "workbook is password protected");
                Ok(())
            })),
            settings(&dir),
        );

        let recorder = Arc::new(Recorder::default());
        supervisor
            .submit(&RunRequest::new(&path).cleanup(true), recorder.clone())
            .unwrap();
        supervisor.wait_idle().await;

        assert_eq!(
            recorder.seen(),
            vec![
                Seen::Status("reading".into(), Some(40.0)),
                Seen::Failure("workbook is password protected".into()),
            ]
        );
        assert!(!supervisor.status().busy);
    }

    struct PanickingObserver;

    impl JobObserver for PanickingObserver {
        fn on_log(&self, _message: &str) {
            panic!("log view went away");
        }
        fn on_status(&self, _text: &str, _percent: Option<f32>) {}
        fn on_success(&self, _path: &Path) {}
        fn on_failure(&self, _message: &str) {}
    }

    #[tokio::test]
    async fn panicking_observer_does_not_leave_supervisor_busy() {
        let dir = TempDir::new().unwrap();
        let path = workbook(&dir);
        let supervisor = JobSupervisor::new(
            Arc::new(pipeline_fn(|req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.log("starting cleanup");
                hooks.finished(req.file_path());
                Ok(())
            })),
            settings(&dir),
        )
        .with_revealer(Arc::new(NoopRevealer));
        let request = RunRequest::new(&path).cleanup(true);

        supervisor
            .submit(&request, Arc::new(PanickingObserver))
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), supervisor.wait_idle())
            .await
            .expect("supervisor stayed busy after observer panic");
        assert!(!supervisor.is_busy());

        let recorder = Arc::new(Recorder::default());
        supervisor.submit(&request, recorder.clone()).unwrap();
        supervisor.wait_idle().await;
        assert_eq!(
            recorder.seen(),
            vec![
                Seen::Log("starting cleanup".into()),
                Seen::Success(path.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn reveal_errors_do_not_touch_the_outcome() {
        let dir = TempDir::new().unwrap();
        let path = workbook(&dir);
        let supervisor = JobSupervisor::new(
            Arc::new(pipeline_fn(|req: &PipelineRequest, hooks: &mut PipelineHooks| {
                hooks.finished(req.file_path());
                Ok(())
            })),
            settings(&dir),
        )
        .with_revealer(Arc::new(BrokenRevealer));

        let recorder = Arc::new(Recorder::default());
        supervisor
            .submit(&RunRequest::new(&path).cleanup(true), recorder.clone())
            .unwrap();
        supervisor.wait_idle().await;

        assert_eq!(recorder.seen().len(), 1);
        assert!(matches!(&recorder.seen()[0], Seen::Success(p) if p.ends_with("report.xlsx")));
    }

    #[tokio::test]
    async fn cancel_stops_a_cooperative_pipeline() {
        crate::test_utils::init_tracing();
        let dir = TempDir::new().unwrap();
        let path = workbook(&dir);
        let supervisor = JobSupervisor::new(
            Arc::new(pipeline_fn(|_req: &PipelineRequest, hooks: &mut PipelineHooks| {
                let mut stage = 0;
                while !hooks.is_cancelled() {
                    stage += 1;
                    hooks.status(format!("stage {stage}"), None);
                    std::thread::sleep(Duration::from_millis(5));
                }
                Ok(())
            })),
            settings(&dir),
        );

        assert!(!supervisor.cancel());
        let recorder = Arc::new(Recorder::default());
        supervisor
            .submit(&RunRequest::new(&path).cleanup(true), recorder.clone())
            .unwrap();
        assert!(supervisor.cancel());
        supervisor.wait_idle().await;

        assert_eq!(
            recorder.seen().last(),
            Some(&Seen::Failure(crate::processing::CANCELLED_MESSAGE.into()))
        );
    }

    #[tokio::test]
    async fn job_uses_settings_from_submission_time() {
        let dir = TempDir::new().unwrap();
        let path = workbook(&dir);
        let gate = Arc::new(Gate::default());
        let pipeline = {
            let gate = gate.clone();
            pipeline_fn(move |req: &PipelineRequest, hooks: &mut PipelineHooks| {
                gate.wait();
                hooks.log(format!("max edge {}", req.settings().image_max_edge));
                hooks.finished(req.file_path());
                Ok(())
            })
        };
        let shared = settings(&dir);
        let supervisor = JobSupervisor::new(Arc::new(pipeline), shared.clone())
            .with_revealer(Arc::new(NoopRevealer));

        let recorder = Arc::new(Recorder::default());
        supervisor
            .submit(&RunRequest::new(&path).image_optimization(true), recorder.clone())
            .unwrap();
        shared.update(|s| s.image_max_edge = 3600).unwrap();
        gate.open();
        supervisor.wait_idle().await;

        assert_eq!(recorder.seen()[0], Seen::Log("max edge 2000".into()));
    }
}
