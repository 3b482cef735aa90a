//! Application state management for Tauri.

use std::sync::Arc;
use tracing::debug;

use crate::core::Settings;
use crate::processing::{CommandPipeline, JobSupervisor, Pipeline};
use crate::utils::{LogControl, OpenerRevealer, SharedSettings, TauriSettingsStore};

/// Application state managed by Tauri.
///
/// Holds the job supervisor, which in turn owns the shared settings. Cloning
/// is cheap and every clone talks to the same supervisor.
#[derive(Clone)]
pub struct AppState {
    supervisor: JobSupervisor,
    log_control: Option<LogControl>,
}

impl AppState {
    /// Loads settings from the store plugin and wires up the pipeline named by
    /// `EXCEL_SLIMMER_PIPELINE`.
    pub fn new(app: tauri::AppHandle, log_control: Option<LogControl>) -> Self {
        let settings = SharedSettings::load(Arc::new(TauriSettingsStore::new(app)));
        let pipeline = CommandPipeline::from_env();
        debug!("Using pipeline program {}", pipeline.program().display());
        Self::with_pipeline(Arc::new(pipeline), settings, log_control)
    }

    pub fn with_pipeline(
        pipeline: Arc<dyn Pipeline>,
        settings: SharedSettings,
        log_control: Option<LogControl>,
    ) -> Self {
        let state = Self {
            supervisor: JobSupervisor::new(pipeline, settings)
                .with_revealer(Arc::new(OpenerRevealer)),
            log_control,
        };
        state.apply_log_mode(&state.settings().snapshot());
        state
    }

    pub fn supervisor(&self) -> &JobSupervisor {
        &self.supervisor
    }

    pub fn settings(&self) -> &SharedSettings {
        self.supervisor.settings()
    }

    /// Follows a log mode change without a restart.
    pub fn apply_log_mode(&self, settings: &Settings) {
        if let Some(control) = &self.log_control {
            control.apply(settings.log_mode);
        }
    }
}
