use tauri::State;
use tracing::debug;

use crate::core::{AppState, Settings};
use crate::utils::SlimmerResult;

#[tauri::command]
pub async fn get_settings(state: State<'_, AppState>) -> SlimmerResult<Settings> {
    Ok(state.settings().snapshot())
}

/// Saves `settings` and returns them as stored, with out-of-range values clamped.
///
/// A running job keeps the settings it started with.
#[tauri::command]
pub async fn update_settings(
    state: State<'_, AppState>,
    settings: Settings,
) -> SlimmerResult<Settings> {
    let stored = state.settings().replace(settings)?;
    state.apply_log_mode(&stored);
    debug!("Settings updated: {:?}", stored);
    Ok(stored)
}

/// Goes back to the pipeline's default output folder.
#[tauri::command]
pub async fn reset_output_directory(state: State<'_, AppState>) -> SlimmerResult<Settings> {
    Ok(state.settings().update(|s| s.output_directory = None)?)
}
