//! User preferences that shape a run.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// Allowed longest-edge limit for embedded images, in pixels
pub const IMAGE_MAX_EDGE_RANGE: RangeInclusive<u32> = 1400..=4000;
/// Allowed JPEG quality
pub const IMAGE_QUALITY_RANGE: RangeInclusive<u32> = 70..=100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    #[default]
    Minimal,
    Verbose,
}

/// Persisted user settings.
///
/// Jobs never read these live: the supervisor hands each job a clone taken
/// at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    /// Longest edge embedded images are scaled down to
    pub image_max_edge: u32,
    /// JPEG quality used when recompressing images
    pub image_quality: u32,
    /// Where finished workbooks go; `None` uses the pipeline's default folder
    pub output_directory: Option<PathBuf>,
    /// Keep a backup copy of the original next to the result
    pub keep_backup: bool,
    pub log_mode: LogMode,
    /// Ask the frontend to open the log folder when a job fails
    pub open_log_on_error: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            image_max_edge: 2000,
            image_quality: 85,
            output_directory: None,
            keep_backup: true,
            log_mode: LogMode::Minimal,
            open_log_on_error: false,
        }
    }
}

impl Settings {
    /// Clamps numeric fields into their allowed ranges and treats an empty
    /// output directory as unset.
    pub fn normalized(mut self) -> Self {
        self.image_max_edge = self
            .image_max_edge
            .clamp(*IMAGE_MAX_EDGE_RANGE.start(), *IMAGE_MAX_EDGE_RANGE.end());
        self.image_quality = self
            .image_quality
            .clamp(*IMAGE_QUALITY_RANGE.start(), *IMAGE_QUALITY_RANGE.end());
        if self
            .output_directory
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            self.output_directory = None;
        }
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.log_mode == LogMode::Verbose
    }
}
