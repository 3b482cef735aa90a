//! Run request and validated job parameters.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::utils::WorkbookFormat;

/// Raw run request as it arrives from the frontend.
///
/// Nothing here has been checked yet; [`crate::utils::validate`] turns it
/// into [`JobParameters`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunRequest {
    /// Workbook to slim, `None` when nothing was picked
    pub target_path: Option<PathBuf>,
    /// Clean up broken / unused defined names
    pub enable_cleanup: bool,
    /// Resize and recompress embedded images
    pub enable_image_optimization: bool,
    /// Precision mode (XML level stripping)
    pub enable_precision: bool,
    /// Convert PNG images to JPEG and rewrite references (precision only)
    pub enable_aggressive_image_conversion: bool,
    /// Drop calcChain, printer settings and similar parts (precision only)
    pub enable_xml_cleanup: bool,
    /// Drop customXml parts (precision only)
    pub enable_hidden_xml_removal: bool,
}

impl RunRequest {
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: Some(target_path.into()),
            ..Self::default()
        }
    }

    pub fn cleanup(mut self, enabled: bool) -> Self {
        self.enable_cleanup = enabled;
        self
    }

    pub fn image_optimization(mut self, enabled: bool) -> Self {
        self.enable_image_optimization = enabled;
        self
    }

    /// Enables precision mode with the given sub-options.
    pub fn precision(mut self, options: PrecisionOptions) -> Self {
        self.enable_precision = true;
        self.enable_aggressive_image_conversion = options.aggressive_image_conversion;
        self.enable_xml_cleanup = options.xml_cleanup;
        self.enable_hidden_xml_removal = options.hidden_xml_removal;
        self
    }
}

/// Sub-options that only apply in precision mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecisionOptions {
    pub aggressive_image_conversion: bool,
    pub xml_cleanup: bool,
    pub hidden_xml_removal: bool,
}

impl PrecisionOptions {
    pub fn any(&self) -> bool {
        self.aggressive_image_conversion || self.xml_cleanup || self.hidden_xml_removal
    }
}

/// A validated, immutable description of one run.
///
/// Only [`crate::utils::validate`] builds these, so holding one means the
/// target existed with a supported extension and the flag invariants held at
/// validation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobParameters {
    target_path: PathBuf,
    format: WorkbookFormat,
    enable_cleanup: bool,
    enable_image_optimization: bool,
    precision: Option<PrecisionOptions>,
}

impl JobParameters {
    pub(crate) fn new(
        target_path: PathBuf,
        format: WorkbookFormat,
        enable_cleanup: bool,
        enable_image_optimization: bool,
        precision: Option<PrecisionOptions>,
    ) -> Self {
        Self {
            target_path,
            format,
            enable_cleanup,
            enable_image_optimization,
            precision,
        }
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn format(&self) -> WorkbookFormat {
        self.format
    }

    pub fn enable_cleanup(&self) -> bool {
        self.enable_cleanup
    }

    pub fn enable_image_optimization(&self) -> bool {
        self.enable_image_optimization
    }

    pub fn enable_precision(&self) -> bool {
        self.precision.is_some()
    }

    /// Precision sub-options; all false when precision is off.
    pub fn precision_options(&self) -> PrecisionOptions {
        self.precision.unwrap_or_default()
    }

    /// Short human-readable list of the enabled operations, for logs.
    pub fn describe(&self) -> String {
        let mut ops = Vec::new();
        if self.enable_cleanup {
            ops.push("cleanup");
        }
        if self.enable_image_optimization {
            ops.push("images");
        }
        if let Some(p) = self.precision {
            ops.push("precision");
            if p.aggressive_image_conversion {
                ops.push("aggressive-images");
            }
            if p.xml_cleanup {
                ops.push("xml-cleanup");
            }
            if p.hidden_xml_removal {
                ops.push("hidden-xml");
            }
        }
        ops.join(", ")
    }
}
