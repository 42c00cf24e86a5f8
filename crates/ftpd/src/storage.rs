//! Storage volume state.
//!
//! The server refuses work while the shared volume is unavailable and refuses
//! uploads that would not fit.

use std::path::{Path, PathBuf};

use nix::sys::statvfs::statvfs;
use tracing::warn;

/// Mount and free-space queries for the shared volume.
pub trait StorageVolume: Send + Sync {
    /// Whether the volume is available.
    fn is_mounted(&self) -> bool;

    /// Whether `bytes` more bytes fit on the volume.
    fn has_space_for(&self, bytes: u64) -> bool;
}

/// Volume backing a local folder.
#[derive(Debug, Clone)]
pub struct LocalVolume {
    root: PathBuf,
    reserve_bytes: u64,
}

impl LocalVolume {
    /// Volume for `root` keeping `reserve_bytes` free at all times.
    pub fn new(root: impl Into<PathBuf>, reserve_bytes: u64) -> Self {
        Self {
            root: root.into(),
            reserve_bytes,
        }
    }

    /// Folder this volume serves.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bytes available to unprivileged writers, or `None` if unknown.
    pub fn available_bytes(&self) -> Option<u64> {
        match statvfs(&self.root) {
            Ok(stat) => Some((stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64)),
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "statvfs failed");
                None
            }
        }
    }
}

impl StorageVolume for LocalVolume {
    fn is_mounted(&self) -> bool {
        self.root.is_dir()
    }

    fn has_space_for(&self, bytes: u64) -> bool {
        self.available_bytes()
            .is_some_and(|free| free.saturating_sub(self.reserve_bytes) >= bytes)
    }
}
