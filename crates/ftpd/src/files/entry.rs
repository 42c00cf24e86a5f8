//! File metadata snapshots.

use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use nix::unistd::{access, AccessFlags};
use tracing::debug;

/// Kind of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Folder,
}

/// One filesystem object under the root, captured on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// Entry kind.
    pub kind: EntryKind,
    /// Size in bytes (0 for folders).
    pub size: u64,
    /// Last modified timestamp.
    pub modified: SystemTime,
    /// Readable by this process.
    pub readable: bool,
    /// Writable by this process.
    pub writable: bool,
}

impl FileEntry {
    /// Snapshot the object at `path`, following symlinks.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());
        Ok(Self::from_metadata(name, path.to_path_buf(), &metadata))
    }

    fn from_metadata(name: String, path: PathBuf, metadata: &Metadata) -> Self {
        let kind = if metadata.is_dir() {
            EntryKind::Folder
        } else {
            EntryKind::File
        };
        let readable = permitted(&path, metadata, 0o444, AccessFlags::R_OK);
        let writable = permitted(&path, metadata, 0o222, AccessFlags::W_OK);

        Self {
            name,
            path,
            kind,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            readable,
            writable,
        }
    }

    /// Whether this entry is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Whether this process may modify the object at `path`.
///
/// An object with no write bit set is locked even for a privileged process.
/// Missing objects are not writable.
pub fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| permitted(path, &metadata, 0o222, AccessFlags::W_OK))
        .unwrap_or(false)
}

fn permitted(path: &Path, metadata: &Metadata, bits: u32, flags: AccessFlags) -> bool {
    metadata.permissions().mode() & bits != 0 && access(path, flags).is_ok()
}

/// List the direct children of a folder.
///
/// Folders sort before files, then names compare case-insensitively.
/// Entries that vanish or cannot be inspected mid-listing are skipped.
pub fn list_directory(path: &Path) -> io::Result<Vec<FileEntry>> {
    let mut results = Vec::new();

    for entry_result in fs::read_dir(path)? {
        let entry = match entry_result {
            Ok(e) => e,
            Err(_) => continue,
        };

        // Follow symlinks so a link to a folder lists as a folder
        let metadata = match fs::metadata(entry.path()) {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "skipping entry");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        results.push(FileEntry::from_metadata(name, entry.path(), &metadata));
    }

    results.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });

    Ok(results)
}
