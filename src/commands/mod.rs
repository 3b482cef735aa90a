//! Tauri command handlers for the frontend.
//!
//! This module exposes commands that can be invoked from the frontend:
//! - [`start_job`], [`cancel_job`], [`job_status`]: run one workbook through the pipeline
//! - [`get_settings`], [`update_settings`], [`reset_output_directory`]: persisted preferences

mod job;
mod settings;

pub use job::*;
pub use settings::*;
