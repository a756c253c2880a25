//! # File Locator
//!
//! Non-recursive directory scan by file-name suffix. A missing directory is
//! an empty batch, not an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::error_logging;

/// One image on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ImageFile {
    path: PathBuf,
    name: String,
}

impl ImageFile {
    /// Build a record from a path whose file name is valid UTF-8
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let name = path.file_name()?.to_str()?.to_string();
        Some(Self { path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name including extension
    pub fn file_name(&self) -> &str {
        &self.name
    }

    /// Directory containing the file
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Sibling path with a different base name
    pub fn sibling(&self, file_name: &str) -> PathBuf {
        self.dir().join(file_name)
    }
}

/// Ordered result of one directory scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Batch {
    files: Vec<ImageFile>,
}

impl Batch {
    /// Build a batch, sorting by file name for a deterministic processing order
    pub fn new(mut files: Vec<ImageFile>) -> Self {
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageFile> {
        self.files.iter()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Keep only the files matching `keep`
    pub fn retain(&mut self, keep: impl FnMut(&ImageFile) -> bool) {
        self.files.retain(keep);
    }
}

impl IntoIterator for Batch {
    type Item = ImageFile;
    type IntoIter = std::vec::IntoIter<ImageFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a ImageFile;
    type IntoIter = std::slice::Iter<'a, ImageFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

impl FromIterator<ImageFile> for Batch {
    fn from_iter<I: IntoIterator<Item = ImageFile>>(iter: I) -> Self {
        Batch::new(iter.into_iter().collect())
    }
}

/// Find regular files in `dir` (non-recursive) whose name ends with `ext`.
///
/// Names equal to `ext` itself are skipped, as are names that are not UTF-8.
pub fn find_files(dir: &Path, ext: &str) -> Batch {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Scan directory does not exist, nothing to do");
            return Batch::default();
        }
        Err(e) => {
            error_logging::log_filesystem_error(&e, "read_dir", Some(dir));
            return Batch::default();
        }
    };

    let files = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            // fs::metadata follows symlinks
            if !fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
                return None;
            }
            match ImageFile::from_path(path.clone()) {
                Some(file) => Some(file),
                None => {
                    warn!(path = %path.display(), "Skipping file with non UTF-8 name");
                    None
                }
            }
        })
        .filter(|file| file.name.len() > ext.len() && file.name.ends_with(ext))
        .collect::<Vec<_>>();

    debug!(dir = %dir.display(), ext = %ext, found = files.len(), "Directory scan complete");
    Batch::new(files)
}
