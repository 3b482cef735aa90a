// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// This is the primary entry point for the Excel Slimmer application.
// The job bridge itself lives in the library crate.

use tracing::{debug, info};
use tauri::Manager;
use excel_slimmer_lib::core::{AppState, LogMode};
use excel_slimmer_lib::utils::init_logging;
use excel_slimmer_lib::{
    cancel_job, get_settings, job_status, reset_output_directory, start_job, update_settings,
};

// Import the window-vibrancy crate only on macOS
#[cfg(target_os = "macos")]
use window_vibrancy::{apply_vibrancy, NSVisualEffectMaterial};

fn main() {
    // Switched to the saved log mode once settings are loaded.
    let log_control = init_logging(LogMode::Minimal);

    info!("=== Application Starting ===");

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_process::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_fs::init())
        .plugin(tauri_plugin_os::init())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_store::Builder::new().build())
        .invoke_handler(tauri::generate_handler![
            start_job,
            cancel_job,
            job_status,
            get_settings,
            update_settings,
            reset_output_directory,
        ])
        .setup(move |app| {
            let app_handle = app.app_handle().clone();
            app.manage(AppState::new(app_handle, log_control));
            debug!("✓ AppState initialized");

            // Register updater plugin (desktop only)
            #[cfg(desktop)]
            {
                app.handle()
                    .plugin(tauri_plugin_updater::Builder::new().build())?;
                debug!("✓ Updater plugin initialized");
            }

            #[cfg(target_os = "macos")]
            if let Some(window) = app.get_webview_window("main") {
                info!("Applying vibrancy effect for macOS");
                // Note: This requires macOSPrivateApi=true in tauri.conf.json
                if let Err(e) = apply_vibrancy(&window, NSVisualEffectMaterial::HudWindow, None, None) {
                    tracing::warn!("Failed to apply vibrancy effect on macOS: {}", e);
                }
            }

            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    info!("Starting application event loop...");
    app.run(|app_handle, event| {
        if let tauri::RunEvent::Exit = event {
            // Ask a running pipeline to stop before the process goes away.
            if let Some(state) = app_handle.try_state::<AppState>() {
                if state.supervisor().cancel() {
                    info!("Cancelled running job on exit");
                }
            }
            info!("Application exiting");
        }
    });
}
