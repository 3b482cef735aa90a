//! Job execution: the pipeline contract, the executor that runs one job on
//! a blocking worker, and the supervisor that keeps at most one in flight.

pub mod command;
pub mod executor;
pub mod pipeline;
pub mod supervisor;

pub use command::{CommandPipeline, DEFAULT_PIPELINE_PROGRAM, PIPELINE_ENV};
pub use executor::{CANCELLED_MESSAGE, JobExecutor, JobSpec, ProgressChannel, TryRecvError};
pub use pipeline::{Pipeline, PipelineHooks, PipelineRequest, pipeline_fn};
pub use supervisor::{JobObserver, JobSupervisor};
