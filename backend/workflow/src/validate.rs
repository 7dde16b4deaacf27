//! Pure validation of uploaded files and project metadata. No side effects.

use crate::errors::{Result, WorkflowError};
use crate::types::{FileUpload, ProjectMetadata};

/// Maximum accepted file size: 10 MiB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum length of `projectName`.
pub const MAX_PROJECT_NAME_LEN: usize = 100;

/// Maximum `estimatedCredits` value (inclusive).
pub const MAX_ESTIMATED_CREDITS: u64 = 1_000_000;

/// MIME types accepted for supporting documents.
pub const ALLOWED_FILE_TYPES: [&str; 6] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "image/jpeg",
    "image/png",
];

/// Validate an uploaded file against the accepted type and size constraints.
pub fn validate_file(file: &FileUpload) -> Result<()> {
    if file.data.is_empty() {
        return Err(WorkflowError::InvalidFile);
    }
    if file.filename.trim().is_empty() {
        return Err(WorkflowError::InvalidFileName);
    }
    if !ALLOWED_FILE_TYPES.contains(&file.content_type.as_str()) {
        return Err(WorkflowError::UnsupportedFileType {
            mime: file.content_type.clone(),
        });
    }
    if file.size() > MAX_FILE_SIZE {
        return Err(WorkflowError::FileTooLarge {
            size: file.size(),
            max: MAX_FILE_SIZE,
        });
    }
    Ok(())
}

/// Validate project metadata. Only `project_name` is required; estimated
/// credits, when present, must lie in `[0, MAX_ESTIMATED_CREDITS]`.
pub fn validate_metadata(meta: &ProjectMetadata) -> Result<()> {
    if meta.project_name.trim().is_empty() {
        return Err(WorkflowError::MissingField {
            field: "projectName",
        });
    }
    if meta.project_name.chars().count() > MAX_PROJECT_NAME_LEN {
        return Err(WorkflowError::FieldTooLong {
            field: "projectName",
            max: MAX_PROJECT_NAME_LEN,
        });
    }
    if let Some(credits) = meta.estimated_credits {
        if credits > MAX_ESTIMATED_CREDITS {
            return Err(WorkflowError::CreditsOutOfRange {
                value: credits,
                max: MAX_ESTIMATED_CREDITS,
            });
        }
    }
    Ok(())
}
