//! Path resolution confined to the shared root.
//!
//! Clients only ever send single path segments: a NAME header and the
//! SETPATH backup/create flags. The jail turns those into absolute paths and
//! guarantees the result stays under the configured root, including when a
//! symlink inside the tree points elsewhere.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors that can occur while resolving a client path.
#[derive(Debug, Error)]
pub enum JailError {
    /// `.` or `..` used as a name.
    #[error("reserved name: {0}")]
    ReservedName(String),

    /// Name is empty or not a single path segment.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// The requested path does not exist or is not a folder.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The resolved path escapes the root.
    #[error("path is outside the shared root: {0}")]
    OutsideJail(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Whether a name is one of the dot segments clients may never send.
pub fn is_reserved(name: &str) -> bool {
    name == "." || name == ".."
}

/// Check that `name` is a usable single path segment.
pub fn validate_segment(name: &str) -> Result<&str, JailError> {
    if is_reserved(name) {
        return Err(JailError::ReservedName(name.to_string()));
    }
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return Err(JailError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Path resolver bound to a root folder.
#[derive(Debug, Clone)]
pub struct Jail {
    root: PathBuf,
}

impl Jail {
    /// Create a jail rooted at `root`.
    ///
    /// The root is kept as given so paths reported to listeners keep the
    /// configured prefix.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a SETPATH request against `current`.
    ///
    /// With `backup` the name is ignored and the result is the parent of
    /// `current`, or the root when already there. Without `backup` an absent
    /// or empty name resets to the root, and any other name is entered as a
    /// child folder, created first when `create` is set.
    pub fn resolve(
        &self,
        current: &Path,
        name: Option<&str>,
        backup: bool,
        create: bool,
    ) -> Result<PathBuf, JailError> {
        if let Some(n) = name {
            if is_reserved(n) {
                return Err(JailError::ReservedName(n.to_string()));
            }
        }

        let candidate = if backup {
            self.parent_of(current)
        } else {
            match name.filter(|n| !n.is_empty()) {
                None => self.root.clone(),
                Some(n) => current.join(validate_segment(n)?),
            }
        };

        if !candidate.exists() {
            if !create {
                return Err(JailError::NotFound(candidate));
            }
            fs::create_dir(&candidate)?;
            debug!(path = %candidate.display(), "created folder");
        } else if !candidate.is_dir() {
            return Err(JailError::NotFound(candidate));
        }

        if !self.contains(&candidate)? {
            return Err(JailError::OutsideJail(candidate));
        }

        Ok(candidate)
    }

    /// Join a single validated segment onto `current`.
    ///
    /// The child does not need to exist. Any existing ancestor chain must
    /// stay under the root.
    pub fn child(&self, current: &Path, name: &str) -> Result<PathBuf, JailError> {
        let child = current.join(validate_segment(name)?);
        let existing = if child.exists() { child.as_path() } else { current };
        if !self.contains(existing)? {
            return Err(JailError::OutsideJail(child));
        }
        Ok(child)
    }

    /// Whether an existing path lies under the root once symlinks are
    /// resolved.
    pub fn contains(&self, path: &Path) -> Result<bool, JailError> {
        let root = fs::canonicalize(&self.root)?;
        let canonical = fs::canonicalize(path)?;
        Ok(canonical.starts_with(root))
    }

    fn parent_of(&self, current: &Path) -> PathBuf {
        if current == self.root {
            return self.root.clone();
        }
        match current.parent() {
            Some(parent) if parent.starts_with(&self.root) => parent.to_path_buf(),
            _ => self.root.clone(),
        }
    }
}
