//! Error types for the slimmer.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use serde::Serialize;
use crate::core::JobId;

/// Problems with a run request that the user can fix before anything starts.
///
/// Checks run in declaration order and stop at the first failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationError {
    /// No target file was given
    #[error("Select a target file first")]
    NoFileSelected,
    /// Target path does not point at an existing file
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// Target file is not a .xlsx / .xlsm workbook
    #[error("Unsupported file type (expected .xlsx or .xlsm): {}", .0.display())]
    UnsupportedExtension(PathBuf),
    /// None of cleanup, image optimization or precision is enabled
    #[error("Select at least one operation to run")]
    NoOperationSelected,
    /// Precision mode is on but none of its options are
    #[error("Precision mode needs at least one of its options enabled")]
    PrecisionRequiresSubOption,
}

/// Reasons a job submission is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SubmitError {
    /// Another job has not reached its terminal event yet
    #[error("A job is already running ({0})")]
    Busy(JobId),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Settings persistence errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Settings could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backend-specific failure (e.g. the Tauri store plugin)
    #[error("Settings store error: {0}")]
    Store(String),
}

/// Main error type returned to the frontend.
///
/// All errors in the application are converted to this type before being
/// returned from a command.
#[derive(Error, Debug, Serialize)]
pub enum SlimmerError {
    /// Run request failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A job is already in flight
    #[error("Busy: job {0} is still running")]
    Busy(JobId),

    /// Settings could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),
}

/// Convenience result type for slimmer operations.
pub type SlimmerResult<T> = Result<T, SlimmerError>;

impl From<SubmitError> for SlimmerError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Busy(id) => Self::Busy(id),
            SubmitError::Validation(e) => Self::Validation(e),
        }
    }
}

impl From<SettingsError> for SlimmerError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err.to_string())
    }
}
