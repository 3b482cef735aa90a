use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One message on a job's progress channel.
///
/// The executor is the only producer and the supervisor the only consumer.
/// `Completed` and `Failed` are terminal: a channel carries exactly one of
/// them and nothing after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    /// A line for the log panel
    LogLine { message: String },
    /// Status text plus percentage; `None` means keep the previous value
    StatusUpdate { text: String, percent: Option<f32> },
    /// The pipeline wrote its final file
    Completed { path: PathBuf },
    /// The job failed; `message` is human-readable and never empty
    Failed { message: String },
}

impl ProgressEvent {
    pub fn log(message: impl Into<String>) -> Self {
        Self::LogLine { message: message.into() }
    }

    pub fn status(text: impl Into<String>, percent: Option<f32>) -> Self {
        Self::StatusUpdate { text: text.into(), percent }
    }

    pub fn completed(path: impl Into<PathBuf>) -> Self {
        Self::Completed { path: path.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Final result of a job, derived from its terminal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunOutcome {
    Success { path: PathBuf },
    Failure { message: String },
}

impl RunOutcome {
    /// Returns the outcome for a terminal event, `None` for anything else.
    pub fn from_terminal(event: &ProgressEvent) -> Option<Self> {
        match event {
            ProgressEvent::Completed { path } => Some(Self::Success { path: path.clone() }),
            ProgressEvent::Failed { message } => Some(Self::Failure { message: message.clone() }),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// The supervisor's record of the job in flight.
///
/// Lives from submission until the terminal event has been dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    id: JobId,
    target: PathBuf,
    started_at: Instant,
}

impl JobHandle {
    pub(crate) fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            target: target.into(),
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

/// Serializable view of the supervisor state for the frontend
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub busy: bool,
    pub job_id: Option<JobId>,
    pub target: Option<PathBuf>,
    pub elapsed_ms: Option<u64>,
}

impl From<Option<&JobHandle>> for JobStatus {
    fn from(handle: Option<&JobHandle>) -> Self {
        match handle {
            Some(h) => Self {
                busy: true,
                job_id: Some(h.id),
                target: Some(h.target.clone()),
                elapsed_ms: Some(h.started_at.elapsed().as_millis() as u64),
            },
            None => Self {
                busy: false,
                job_id: None,
                target: None,
                elapsed_ms: None,
            },
        }
    }
}
