use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Workbook container formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkbookFormat {
    Xlsx,
    Xlsm,
}

impl WorkbookFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xlsm => "xlsm",
        }
    }
}

impl FromStr for WorkbookFormat {
    type Err = String;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "xlsx" => Ok(Self::Xlsx),
            "xlsm" => Ok(Self::Xlsm),
            _ => Err(format!("Unsupported workbook format: {}", ext)),
        }
    }
}

/// Get format from file extension, `None` when missing or unsupported
pub fn format_from_path(path: &Path) -> Option<WorkbookFormat> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| WorkbookFormat::from_str(e).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_ignores_case() {
        assert_eq!(format_from_path(Path::new("Report.XLSX")), Some(WorkbookFormat::Xlsx));
        assert_eq!(format_from_path(Path::new("macro.XlsM")), Some(WorkbookFormat::Xlsm));
    }

    #[test]
    fn legacy_and_missing_extensions_are_rejected() {
        assert_eq!(format_from_path(Path::new("old.xls")), None);
        assert_eq!(format_from_path(Path::new("book.csv")), None);
        assert_eq!(format_from_path(Path::new("noext")), None);
        assert_eq!(format_from_path(Path::new("archive.xlsx.zip")), None);
    }
}
