use std::path::Path;
use crate::core::{JobParameters, PrecisionOptions, RunRequest};
use crate::utils::{ValidationError, format_from_path};

/// Validates a run request into immutable job parameters.
///
/// Checks run in a fixed order and stop at the first failure: path given,
/// file exists, extension supported, an operation selected, precision
/// sub-option selected.
pub fn validate(request: &RunRequest) -> Result<JobParameters, ValidationError> {
    let path = request
        .target_path
        .as_deref()
        .filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
        .ok_or(ValidationError::NoFileSelected)?;

    validate_input_path(path)?;

    let format = format_from_path(path)
        .ok_or_else(|| ValidationError::UnsupportedExtension(path.to_path_buf()))?;

    if !(request.enable_cleanup || request.enable_image_optimization || request.enable_precision) {
        return Err(ValidationError::NoOperationSelected);
    }

    let precision = if request.enable_precision {
        let options = PrecisionOptions {
            aggressive_image_conversion: request.enable_aggressive_image_conversion,
            xml_cleanup: request.enable_xml_cleanup,
            hidden_xml_removal: request.enable_hidden_xml_removal,
        };
        if !options.any() {
            return Err(ValidationError::PrecisionRequiresSubOption);
        }
        Some(options)
    } else {
        None
    };

    let target = std::path::absolute(path)
        .map_err(|_| ValidationError::FileNotFound(path.to_path_buf()))?;

    Ok(JobParameters::new(
        target,
        format,
        request.enable_cleanup,
        request.enable_image_optimization,
        precision,
    ))
}

/// Validates that the input path is an existing regular file
pub fn validate_input_path(path: &Path) -> Result<(), ValidationError> {
    if !path.is_file() {
        return Err(ValidationError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}
