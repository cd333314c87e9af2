//! Image upload policy.
//!
//! These limits are a contract with the server's `/images` endpoint, which
//! enforces the same rules; a batch that passes here should not be rejected
//! there for count, type, or size.

use crate::models::CandidateFile;

pub const MAX_FILE_COUNT: usize = 5;
pub const MAX_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
pub const ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of checking a batch; `error` is set exactly when `valid` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValidation {
    pub valid: bool,
    pub error: Option<String>,
}

impl FileValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Check a standalone batch.
pub fn validate_files(files: &[CandidateFile]) -> FileValidation {
    validate_batch(0, files)
}

/// Check a batch that would be appended to `staged_count` already staged files.
///
/// The first failing rule wins; no part of a rejected batch is accepted.
pub fn validate_batch(staged_count: usize, files: &[CandidateFile]) -> FileValidation {
    if files.is_empty() {
        return FileValidation::rejected("Please select at least one file");
    }

    if files.len() > MAX_FILE_COUNT || staged_count + files.len() > MAX_FILE_COUNT {
        return FileValidation::rejected(format!(
            "You can upload at most {} files",
            MAX_FILE_COUNT
        ));
    }

    for file in files {
        if let Some(error) = check_file(file) {
            return FileValidation::rejected(error);
        }
    }

    FileValidation::ok()
}

fn check_file(file: &CandidateFile) -> Option<String> {
    if !ALLOWED_TYPES.contains(&file.media_type.as_str()) {
        return Some(format!(
            "\"{}\" has an unsupported file type. Allowed: JPEG, PNG, WebP",
            file.name
        ));
    }

    match file_extension(&file.name, &file.media_type) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => {
            return Some(format!(
                "\"{}\" has an unsupported file extension. Allowed: {}",
                file.name,
                ALLOWED_EXTENSIONS.join(", ")
            ));
        }
    }

    let size = file.size();
    if size > MAX_FILE_SIZE_BYTES {
        return Some(format!(
            "\"{}\" is too large ({:.2}MB). Maximum: 5MB",
            file.name,
            size as f64 / BYTES_PER_MB
        ));
    }

    if size == 0 {
        return Some(format!("\"{}\" is empty", file.name));
    }

    None
}

/// Lower-cased extension taken from the file name, falling back to the
/// canonical extension of the media type when the name has none.
pub fn file_extension(name: &str, media_type: &str) -> Option<String> {
    if let Some((_, ext)) = name.rsplit_once('.') {
        return Some(ext.to_ascii_lowercase());
    }

    match media_type {
        "image/jpeg" => Some("jpg".to_string()),
        "image/png" => Some("png".to_string()),
        "image/webp" => Some("webp".to_string()),
        _ => None,
    }
}

/// Media type for a file name, used when reading files from disk.
pub fn media_type_for(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
