//! Recursive collection of classifiable files.
//!
//! Scans are pure: they return what they found and leave notification to
//! the caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use super::mime::MimeClassifier;

/// A file found by [`scan`], with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Lowercase MIME type.
    pub mime_type: String,
}

/// Walk `root` and collect every file with a known MIME type.
///
/// A plain file as `root` yields at most that one file. Results are sorted by
/// path. Files without an extension or with an unknown one are skipped, and
/// symlinks below `root` are neither followed nor reported.
pub fn scan(root: &Path, classifier: &dyn MimeClassifier) -> io::Result<Vec<ScannedFile>> {
    fs::metadata(root)?;

    let mut found = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
    for entry in walker.into_iter().filter_map(|e| match e {
        Ok(entry) => Some(entry),
        Err(e) => {
            debug!(error = %e, "skipping unreadable entry");
            None
        }
    }) {
        if entry.file_type().is_file() {
            push_if_known(entry.path(), classifier, &mut found);
        }
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

fn push_if_known(path: &Path, classifier: &dyn MimeClassifier, found: &mut Vec<ScannedFile>) {
    match classifier.mime_for_path(path) {
        Some(mime_type) => found.push(ScannedFile {
            path: path.to_path_buf(),
            mime_type,
        }),
        None => debug!(path = %path.display(), "no MIME type, skipped"),
    }
}
