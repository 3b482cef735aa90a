//! Settings persistence.
//!
//! [`SharedSettings`] is what the rest of the app talks to: it keeps the
//! current value in memory, writes through to a [`SettingsStore`] on every
//! change and hands out snapshots for jobs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use crate::core::Settings;
use crate::utils::SettingsError;

/// Backend that persists settings across restarts.
pub trait SettingsStore: Send + Sync {
    /// Reads the saved settings, `Ok(None)` when nothing was saved yet.
    fn load(&self) -> Result<Option<Settings>, SettingsError>;

    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Stores settings as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(settings)?;
        // Write to a sibling file first so a crash never leaves half a document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Persists settings through `tauri-plugin-store` in the app config dir.
#[cfg(feature = "desktop")]
pub struct TauriSettingsStore {
    app: tauri::AppHandle,
}

#[cfg(feature = "desktop")]
impl TauriSettingsStore {
    const FILE: &'static str = "settings.json";
    const KEY: &'static str = "settings";

    pub fn new(app: tauri::AppHandle) -> Self {
        Self { app }
    }

    fn store(&self) -> Result<Arc<tauri_plugin_store::Store<tauri::Wry>>, SettingsError> {
        use tauri_plugin_store::StoreExt;
        self.app
            .store(Self::FILE)
            .map_err(|e| SettingsError::Store(e.to_string()))
    }
}

#[cfg(feature = "desktop")]
impl SettingsStore for TauriSettingsStore {
    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        let value = self.store()?.get(Self::KEY);
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let store = self.store()?;
        store.set(Self::KEY, serde_json::to_value(settings)?);
        store.save().map_err(|e| SettingsError::Store(e.to_string()))
    }
}

/// In-memory settings with write-through persistence.
#[derive(Clone)]
pub struct SharedSettings {
    current: Arc<RwLock<Settings>>,
    store: Arc<dyn SettingsStore>,
}

impl SharedSettings {
    /// Loads settings from `store`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(store: Arc<dyn SettingsStore>) -> Self {
        let settings = match store.load() {
            Ok(Some(s)) => s.normalized(),
            Ok(None) => {
                debug!("No saved settings, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        };

        Self {
            current: Arc::new(RwLock::new(settings)),
            store,
        }
    }

    /// An owned copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the settings and persists them. Returns the stored value
    /// after normalization.
    pub fn replace(&self, settings: Settings) -> Result<Settings, SettingsError> {
        self.update(|current| *current = settings)
    }

    /// Applies `change` to the current settings and persists the result.
    pub fn update(&self, change: impl FnOnce(&mut Settings)) -> Result<Settings, SettingsError> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = guard.clone();
        change(&mut next);
        let next = next.normalized();
        self.store.save(&next)?;
        *guard = next.clone();
        debug!("Settings saved");
        Ok(next)
    }
}
