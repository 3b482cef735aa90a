//! Core application types and state management.
//!
//! This module contains the fundamental types used throughout the application:
//! - [`RunRequest`] / [`JobParameters`]: a requested run before and after validation
//! - [`ProgressEvent`]: one message on a job's progress channel
//! - [`RunOutcome`]: the final result of a job
//! - [`JobHandle`]: the supervisor's record of the job in flight
//! - [`Settings`]: persisted user preferences
//! - `AppState`: application state managed by Tauri (desktop builds)

mod types;
mod progress;
mod settings;
#[cfg(feature = "desktop")]
mod state;

pub use types::{JobParameters, PrecisionOptions, RunRequest};
pub use progress::{JobHandle, JobId, JobStatus, ProgressEvent, RunOutcome};
pub use settings::{IMAGE_MAX_EDGE_RANGE, IMAGE_QUALITY_RANGE, LogMode, Settings, Theme};
#[cfg(feature = "desktop")]
pub use state::AppState;
