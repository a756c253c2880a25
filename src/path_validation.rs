//! Path Validation module for file name and suffix handling
//!
//! The pipeline never passes file names through a shell, so the concern here
//! is not injection but well-formedness:
//!
//! - Input extensions must look like `.ext` so suffix matching is unambiguous
//! - Derived output names must fit within filesystem name limits
//! - Names must not contain null bytes or path separators
//! - Language codes handed to the OCR engine must be `lang[+lang...]`
//!
//! ## Usage Examples
//!
//! ```rust
//! use batch_ocr::path_validation::{validate_extension, validate_filename};
//!
//! assert!(validate_extension(".jpg").is_ok());
//! assert!(validate_extension("jpg").is_err());
//! assert!(validate_filename("photo_m.jpg").is_ok());
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Errors that can occur during path validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathValidationError {
    /// Empty name or extension provided
    #[error("empty value")]
    Empty,
    /// Extension does not start with '.'
    #[error("extension '{0}' must start with '.'")]
    MissingLeadingDot(String),
    /// Extension contains characters other than ASCII alphanumerics
    #[error("extension '{0}' must be '.' followed by ASCII letters or digits")]
    InvalidExtension(String),
    /// Filename is too long
    #[error("file name is {0} bytes, the limit is {limit}", limit = MAX_FILENAME_LENGTH)]
    FilenameTooLong(usize),
    /// Name contains null bytes
    #[error("name contains a null byte")]
    NullByte,
    /// Name contains a path separator
    #[error("name '{0}' contains a path separator")]
    PathSeparator(String),
    /// Language code is malformed
    #[error("language '{0}' must look like 'eng' or 'eng+fra'")]
    InvalidLanguage(String),
}

/// Result type for path validation operations
pub type PathValidationResult<T> = Result<T, PathValidationError>;

/// Maximum allowed filename length (255 bytes on most filesystems)
pub const MAX_FILENAME_LENGTH: usize = 255;

lazy_static! {
    static ref EXTENSION_RE: Regex =
        Regex::new(r"^\.[A-Za-z0-9]+$").expect("extension pattern is valid");
    static ref LANGUAGE_RE: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\+[A-Za-z][A-Za-z0-9_]*)*$")
            .expect("language pattern is valid");
}

/// Validate a user-supplied input extension such as `.jpg`
pub fn validate_extension(ext: &str) -> PathValidationResult<()> {
    if ext.is_empty() {
        return Err(PathValidationError::Empty);
    }
    if !ext.starts_with('.') {
        return Err(PathValidationError::MissingLeadingDot(ext.to_string()));
    }
    if !EXTENSION_RE.is_match(ext) {
        return Err(PathValidationError::InvalidExtension(ext.to_string()));
    }
    Ok(())
}

/// Validate a single file name (no directory part)
pub fn validate_filename(filename: &str) -> PathValidationResult<()> {
    if filename.is_empty() {
        return Err(PathValidationError::Empty);
    }
    if filename.contains('\0') {
        return Err(PathValidationError::NullByte);
    }
    if filename.contains('/') || filename.contains(std::path::MAIN_SEPARATOR) {
        return Err(PathValidationError::PathSeparator(filename.to_string()));
    }
    if filename.len() > MAX_FILENAME_LENGTH {
        return Err(PathValidationError::FilenameTooLong(filename.len()));
    }
    Ok(())
}

/// Validate an OCR language code (`eng`, `eng+fra`, `chi_sim`)
pub fn validate_language(lang: &str) -> PathValidationResult<()> {
    if lang.is_empty() {
        return Err(PathValidationError::Empty);
    }
    if !LANGUAGE_RE.is_match(lang) {
        return Err(PathValidationError::InvalidLanguage(lang.to_string()));
    }
    Ok(())
}
