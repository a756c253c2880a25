//! # Filename Conventions
//!
//! Every stage writes a new file next to its input, named by appending a fixed
//! token to the input's stem. The helpers here are pure string functions; a
//! `None` result means the input did not carry the expected extension (or
//! stripping it would leave nothing), and callers must not build a path from it.
//!
//! ```rust
//! use batch_ocr::naming::{bitmap_name, filtered_name, text_stem};
//!
//! assert_eq!(filtered_name("photo.jpg", ".jpg").as_deref(), Some("photo_m.jpg"));
//! assert_eq!(bitmap_name("photo_m.jpg", ".jpg").as_deref(), Some("photo_m.tif"));
//! assert_eq!(text_stem("photo_m.tif"), Some("photo_m"));
//! ```

/// Marker appended to the stem of a threshold-filtered copy
pub const FILTER_MARKER: &str = "_m";
/// Marker appended to the stem of a grayscale copy
pub const GRAYSCALE_MARKER: &str = "_y";
/// Extension of the intermediate bitmap handed to the OCR engine
pub const BITMAP_EXT: &str = ".tif";
/// Extension the OCR engine appends to its output stem
pub const TEXT_EXT: &str = ".txt";

/// Strip `ext` from `file_name`.
///
/// Returns `None` when `file_name` does not end with `ext`, or when it is
/// exactly `ext` (the stem would be empty and the output a dot-file).
pub fn derive_stem<'a>(file_name: &'a str, ext: &str) -> Option<&'a str> {
    file_name
        .strip_suffix(ext)
        .filter(|stem| !stem.is_empty())
}

/// `photo.jpg` -> `photo_m.jpg`
pub fn filtered_name(file_name: &str, ext: &str) -> Option<String> {
    derive_stem(file_name, ext).map(|stem| format!("{stem}{FILTER_MARKER}{ext}"))
}

/// `photo.jpg` -> `photo_y.jpg`
pub fn grayscale_name(file_name: &str, ext: &str) -> Option<String> {
    derive_stem(file_name, ext).map(|stem| format!("{stem}{GRAYSCALE_MARKER}{ext}"))
}

/// `photo_m.jpg` -> `photo_m.tif`
pub fn bitmap_name(file_name: &str, ext: &str) -> Option<String> {
    derive_stem(file_name, ext).map(|stem| format!("{stem}{BITMAP_EXT}"))
}

/// `photo_m.tif` -> `photo_m`; the OCR engine writes `photo_m.txt`
pub fn text_stem(file_name: &str) -> Option<&str> {
    derive_stem(file_name, BITMAP_EXT)
}

/// Suffix identifying the filter stage's outputs for a given input extension
pub fn filtered_suffix(ext: &str) -> String {
    format!("{FILTER_MARKER}{ext}")
}

/// Suffix identifying the grayscale stage's outputs for a given input extension
pub fn grayscale_suffix(ext: &str) -> String {
    format!("{GRAYSCALE_MARKER}{ext}")
}

/// Suffix identifying the convert stage's outputs
pub fn bitmap_suffix() -> String {
    format!("{FILTER_MARKER}{BITMAP_EXT}")
}

/// True when `file_name` is a pipeline artifact rather than an original input
pub fn is_derived(file_name: &str, ext: &str) -> bool {
    file_name.ends_with(&filtered_suffix(ext)) || file_name.ends_with(&grayscale_suffix(ext))
}
