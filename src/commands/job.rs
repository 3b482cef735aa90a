//! Tauri command handlers for running a job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::Serialize;
use tauri::{AppHandle, Emitter, State};
use tracing::{debug, warn};

use crate::core::{AppState, JobId, JobStatus, RunRequest};
use crate::processing::JobObserver;
use crate::utils::SlimmerResult;

pub const JOB_LOG_EVENT: &str = "job-log";
pub const JOB_STATUS_EVENT: &str = "job-status";
pub const JOB_FINISHED_EVENT: &str = "job-finished";
pub const JOB_FAILED_EVENT: &str = "job-failed";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload<'a> {
    text: &'a str,
    percent: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct FinishedPayload {
    path: PathBuf,
    /// Frontend clears the file and operation selections; the log stays.
    reset_selections: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailedPayload<'a> {
    message: &'a str,
    open_log_folder: bool,
}

/// Forwards job progress to the webview as Tauri events.
struct EventObserver {
    app: AppHandle,
    open_log_on_error: bool,
}

impl EventObserver {
    fn emit<S: Serialize + Clone>(&self, event: &str, payload: S) {
        if let Err(e) = self.app.emit(event, payload) {
            warn!("Failed to emit {}: {}", event, e);
        }
    }
}

impl JobObserver for EventObserver {
    fn on_log(&self, message: &str) {
        self.emit(JOB_LOG_EVENT, message);
    }

    fn on_status(&self, text: &str, percent: Option<f32>) {
        self.emit(JOB_STATUS_EVENT, StatusPayload { text, percent });
    }

    fn on_success(&self, path: &Path) {
        self.emit(
            JOB_FINISHED_EVENT,
            FinishedPayload {
                path: path.to_path_buf(),
                reset_selections: true,
            },
        );
    }

    fn on_failure(&self, message: &str) {
        self.emit(
            JOB_FAILED_EVENT,
            FailedPayload {
                message,
                open_log_folder: self.open_log_on_error,
            },
        );
    }
}

/// Starts slimming one workbook.
///
/// Returns as soon as the job is running; progress arrives as events.
///
/// # Events Emitted
/// * `job-log` - One log line
/// * `job-status` - `{ text, percent }`, percent is the last known value
/// * `job-finished` - `{ path, resetSelections }`
/// * `job-failed` - `{ message, openLogFolder }`
#[tauri::command]
pub async fn start_job(
    app: AppHandle,
    state: State<'_, AppState>,
    request: RunRequest,
) -> SlimmerResult<JobId> {
    debug!("Received start_job command for {:?}", request.target_path);

    let settings = state.settings().snapshot();
    let observer = Arc::new(EventObserver {
        app,
        open_log_on_error: settings.open_log_on_error,
    });
    let handle = state
        .supervisor()
        .submit_with_settings(&request, settings, observer)?;
    Ok(handle.id())
}

/// Asks the running job to stop. Returns false when nothing was running.
#[tauri::command]
pub async fn cancel_job(state: State<'_, AppState>) -> SlimmerResult<bool> {
    Ok(state.supervisor().cancel())
}

#[tauri::command]
pub async fn job_status(state: State<'_, AppState>) -> SlimmerResult<JobStatus> {
    Ok(state.supervisor().status())
}
