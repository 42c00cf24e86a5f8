//! Error types for the folder browsing server.

use std::io;
use std::path::PathBuf;

use obex::{ObexError, ResponseCode};
use thiserror::Error;

use crate::files::jail::JailError;
use crate::files::transfer::TransferError;

/// Error raised while serving a request.
#[derive(Debug, Error)]
pub enum FtpError {
    /// Request other than CONNECT on a session that is not connected.
    #[error("session is not connected")]
    NotConnected,

    /// The storage volume is unavailable.
    #[error("storage volume is not mounted")]
    Unmounted,

    /// CONNECT did not target the folder browsing service.
    #[error("unsupported service target")]
    BadTarget,

    /// A required header was absent or empty.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// Unsupported TYPE on GET.
    #[error("unsupported object type: {0}")]
    UnsupportedType(String),

    /// The object does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// A listing named a folder that does not exist.
    #[error("nothing to list: {0}")]
    NoListing(PathBuf),

    /// A listing named something other than a folder.
    #[error("not a folder: {0}")]
    NotAFolder(PathBuf),

    /// The destination of a copy or rename already exists.
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    /// The client may not modify this object.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Malformed header.
    #[error("header error: {0}")]
    Header(#[from] ObexError),

    /// Path resolution failed.
    #[error("path error: {0}")]
    Jail(#[from] JailError),

    /// Transfer failed.
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FtpError {
    /// Response code reported to the client.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            FtpError::NotConnected
            | FtpError::MissingHeader(_)
            | FtpError::UnsupportedType(_) => ResponseCode::BadRequest,
            FtpError::Unmounted | FtpError::NoListing(_) => ResponseCode::NoContent,
            FtpError::BadTarget | FtpError::AlreadyExists(_) => ResponseCode::NotAcceptable,
            FtpError::NotFound(_) => ResponseCode::NotFound,
            FtpError::PermissionDenied(_) => ResponseCode::Unauthorized,
            FtpError::NotAFolder(_) | FtpError::Header(_) | FtpError::Io(_) => {
                ResponseCode::InternalError
            }
            FtpError::Jail(e) => match e {
                JailError::ReservedName(_)
                | JailError::InvalidName(_)
                | JailError::OutsideJail(_) => ResponseCode::NotAcceptable,
                JailError::NotFound(_) => ResponseCode::NotFound,
                JailError::Io(_) => ResponseCode::InternalError,
            },
            FtpError::Transfer(e) => e.response_code(),
        }
    }
}
