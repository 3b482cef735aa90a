use std::borrow::Cow;
use std::path::Path;

/// File name for log messages, falling back to the full path
pub fn display_name(path: &Path) -> Cow<'_, str> {
    match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => path.to_string_lossy(),
    }
}

/// Get file size in bytes, `None` if the file cannot be read
pub fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Human-readable size change between the original and the slimmed file.
pub fn describe_size_change(original: u64, result: u64) -> String {
    let saved = original as i64 - result as i64;
    let ratio = if original > 0 {
        saved as f64 / original as f64 * 100.0
    } else {
        0.0
    };
    format!(
        "{:.2} MB -> {:.2} MB ({:.1}% saved)",
        original as f64 / 1_048_576.0,
        result as f64 / 1_048_576.0,
        ratio
    )
}
