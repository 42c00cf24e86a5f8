//! Shared tree access for the folder browsing server.
//!
//! This module provides the filesystem side of a session:
//! - Path confinement under the shared root
//! - Folder listings and their XML rendering
//! - MIME classification and recursive scans for change notifications
//! - Packet-sized PUT and GET body transfers
//!
//! # Security
//!
//! Every client-supplied name is a single path segment. `.` and `..` are
//! refused, and resolved paths are canonicalized so symlinks cannot lead
//! outside the root.

pub mod entry;
pub mod jail;
pub mod listing;
pub mod mime;
pub mod scanner;
pub mod transfer;

pub use entry::{list_directory, EntryKind, FileEntry};
pub use jail::{Jail, JailError};
pub use mime::{ExtensionTable, MimeClassifier};
pub use scanner::{scan, ScannedFile};
pub use transfer::{TransferError, TransferOutcome};
