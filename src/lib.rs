// Module declarations in dependency order
#[cfg(feature = "desktop")]
pub mod commands;
pub mod core;
pub mod processing;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

// Public exports for external consumers
pub use crate::core::{
    JobHandle, JobId, JobParameters, JobStatus, PrecisionOptions, ProgressEvent, RunOutcome,
    RunRequest, Settings,
};
#[cfg(feature = "desktop")]
pub use crate::core::AppState;
pub use crate::processing::{
    CommandPipeline, JobExecutor, JobObserver, JobSupervisor, Pipeline, PipelineHooks,
    PipelineRequest, ProgressChannel,
};
pub use crate::utils::{SlimmerError, SlimmerResult, SubmitError, ValidationError};
#[cfg(feature = "desktop")]
pub use crate::commands::*;

// This library file is used as a public API for consuming this crate as a library.
// The desktop entry point is in main.rs.
