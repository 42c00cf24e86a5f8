//! Folder browsing session state machine.
//!
//! [`FtpSession`] answers the OBEX requests of one client. It tracks whether
//! the client is connected, the folder it is browsing and the SRM state of
//! the last transfer, and it reports changes to the shared tree through a
//! [`NotificationSink`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use obex::{
    HeaderId, HeaderSet, HeaderValue, RequestHandler, ResponseCode, ServerOperation,
    SrmCapability, SrmStatus, FOLDER_LISTING_TYPE, FTP_TARGET, SRM_ENABLE, UUID_LENGTH,
};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::abort::AbortSignal;
use crate::error::FtpError;
use crate::events::{FtpEvent, NotificationSink};
use crate::files::entry::{is_writable, list_directory};
use crate::files::jail::{is_reserved, Jail, JailError};
use crate::files::listing;
use crate::files::mime::MimeClassifier;
use crate::files::scanner::{scan, ScannedFile};
use crate::files::transfer::{self, TransferOutcome};
use crate::storage::StorageVolume;

/// Connection state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No client connected.
    Disconnected,
    /// A client is connected and browsing `current_path`.
    Connected {
        /// Identifier returned in the CONNECT reply.
        connection_id: u32,
        /// Folder the client is in. Always under the root.
        current_path: PathBuf,
    },
}

/// Folder browsing server for one client session.
pub struct FtpSession {
    jail: Jail,
    state: SessionState,
    srm_enabled: bool,
    abort: AbortSignal,
    storage: Arc<dyn StorageVolume>,
    mime: Arc<dyn MimeClassifier>,
    notifier: Arc<dyn NotificationSink>,
}

type Outcome = Result<ResponseCode, FtpError>;

impl FtpSession {
    /// Create a disconnected session serving `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        storage: Arc<dyn StorageVolume>,
        mime: Arc<dyn MimeClassifier>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            jail: Jail::new(root),
            state: SessionState::Disconnected,
            srm_enabled: false,
            abort: AbortSignal::new(),
            storage,
            mime,
            notifier,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Folder the client is browsing, if connected.
    pub fn current_path(&self) -> Option<&Path> {
        match &self.state {
            SessionState::Connected { current_path, .. } => Some(current_path),
            SessionState::Disconnected => None,
        }
    }

    /// Connection identifier, if connected.
    pub fn connection_id(&self) -> Option<u32> {
        match &self.state {
            SessionState::Connected { connection_id, .. } => Some(*connection_id),
            SessionState::Disconnected => None,
        }
    }

    /// Whether SRM was enabled for the last transfer.
    pub fn srm_enabled(&self) -> bool {
        self.srm_enabled
    }

    /// Signal that cancels the transfer in flight.
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Shared root.
    pub fn root(&self) -> &Path {
        self.jail.root()
    }

    fn current(&self) -> Result<PathBuf, FtpError> {
        self.current_path()
            .map(Path::to_path_buf)
            .ok_or(FtpError::NotConnected)
    }

    /// Current folder of a connected session on a mounted volume.
    fn ready(&self) -> Result<PathBuf, FtpError> {
        let current = self.current()?;
        if !self.storage.is_mounted() {
            return Err(FtpError::Unmounted);
        }
        Ok(current)
    }

    fn set_current(&mut self, path: PathBuf) {
        if let SessionState::Connected { current_path, .. } = &mut self.state {
            *current_path = path;
        }
    }

    fn respond(&self, request: &'static str, result: Outcome) -> ResponseCode {
        match result {
            Ok(code) => {
                debug!(request, %code, "request served");
                code
            }
            Err(e) => {
                let code = e.response_code();
                if code == ResponseCode::InternalError {
                    error!(request, error = %e, %code, "request failed");
                } else {
                    info!(request, error = %e, %code, "request refused");
                }
                code
            }
        }
    }

    fn negotiate_srm(&mut self, op: &mut dyn ServerOperation, requested: Option<u8>) {
        let enabled = op.local_srm_capable() && requested == Some(SRM_ENABLE);
        op.set_local_srm_status(if enabled {
            SrmStatus::Enabled
        } else {
            SrmStatus::Disabled
        });
        self.srm_enabled = enabled;
        debug!(capable = op.local_srm_capable(), enabled, "SRM negotiated");
    }

    fn scan_or_empty(&self, root: &Path) -> Vec<ScannedFile> {
        scan(root, self.mime.as_ref()).unwrap_or_else(|e| {
            warn!(path = %root.display(), error = %e, "scan failed, notifying without it");
            Vec::new()
        })
    }

    fn connect(&mut self, request: &HeaderSet, reply: &mut HeaderSet) -> Outcome {
        let target = request.target().ok().flatten();
        match target {
            Some(t) if t.len() == UUID_LENGTH && t == FTP_TARGET => {}
            _ => return Err(FtpError::BadTarget),
        }

        reply.set(HeaderId::WHO, HeaderValue::Bytes(FTP_TARGET.to_vec()))?;
        if let Some(who) = request.who().ok().flatten() {
            reply.set(HeaderId::TARGET, HeaderValue::Bytes(who.to_vec()))?;
        }
        let connection_id: u32 = rand::random();
        reply.set(HeaderId::CONNECTION_ID, HeaderValue::U32(connection_id))?;

        self.state = SessionState::Connected {
            connection_id,
            current_path: self.jail.root().to_path_buf(),
        };
        self.srm_enabled = false;
        info!(connection_id, root = %self.jail.root().display(), "session established");
        self.notifier.notify(FtpEvent::SessionEstablished);
        Ok(ResponseCode::Ok)
    }

    fn set_path(&mut self, request: &HeaderSet, backup: bool, create: bool) -> Outcome {
        let current = self.ready()?;
        let name = request.name()?;
        let resolved = self.jail.resolve(&current, name, backup, create)?;
        debug!(path = %resolved.display(), backup, create, "path changed");
        self.set_current(resolved);
        Ok(ResponseCode::Ok)
    }

    fn delete(&mut self, request: &HeaderSet) -> Outcome {
        let current = self.ready()?;
        let name = required(request.name()?, "NAME")?;
        if is_reserved(name) {
            return Err(FtpError::PermissionDenied(current.join(name)));
        }

        let path = self.jail.child(&current, name)?;
        let metadata = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(_) => return Err(FtpError::NotFound(path)),
        };
        // Unlinking a symlink changes its folder, never its target
        let guarded = if metadata.file_type().is_symlink() {
            current.as_path()
        } else {
            path.as_path()
        };
        if !is_writable(guarded) {
            return Err(FtpError::PermissionDenied(path));
        }

        if metadata.is_dir() {
            let removed = self.scan_or_empty(&path);
            fs::remove_dir_all(&path).map_err(|e| {
                warn!(path = %path.display(), error = %e, "folder delete failed");
                FtpError::PermissionDenied(path.clone())
            })?;
            info!(path = %path.display(), files = removed.len(), "folder deleted");
            if !removed.is_empty() {
                self.notifier.notify(FtpEvent::FilesDeleted { files: removed });
            }
        } else {
            fs::remove_file(&path).map_err(|e| {
                warn!(path = %path.display(), error = %e, "file delete failed");
                FtpError::PermissionDenied(path.clone())
            })?;
            info!(path = %path.display(), "file deleted");
            self.notifier.notify(FtpEvent::FileDeleted { path });
        }
        Ok(ResponseCode::Ok)
    }

    /// Source and destination of a COPY or RENAME, both under `current`.
    fn action_paths(&self, request: &HeaderSet) -> Result<(PathBuf, PathBuf), FtpError> {
        let current = self.ready()?;
        let source_name = required(request.name()?, "NAME")?;
        let dest_name = required(request.dest_name()?, "DEST_NAME")?;
        if is_reserved(dest_name) {
            return Err(JailError::ReservedName(dest_name.to_string()).into());
        }

        let source = self.jail.child(&current, source_name)?;
        let dest = self.jail.child(&current, dest_name)?;
        if fs::symlink_metadata(&source).is_err() {
            return Err(FtpError::NotFound(source));
        }
        if fs::symlink_metadata(&dest).is_ok() {
            return Err(FtpError::AlreadyExists(dest));
        }
        Ok((source, dest))
    }

    fn copy(&mut self, request: &HeaderSet) -> Outcome {
        let (source, dest) = self.action_paths(request)?;

        if source.is_dir() {
            if let Err(e) = copy_tree(&source, &dest) {
                if let Err(cleanup) = fs::remove_dir_all(&dest) {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!(path = %dest.display(), error = %cleanup, "partial copy left behind");
                    }
                }
                return Err(e.into());
            }
            let added = self.scan_or_empty(&dest);
            info!(from = %source.display(), to = %dest.display(), files = added.len(), "folder copied");
            if !added.is_empty() {
                self.notifier.notify(FtpEvent::FilesReceived { files: added });
            }
        } else {
            fs::copy(&source, &dest)?;
            info!(from = %source.display(), to = %dest.display(), "file copied");
            self.notifier.notify(FtpEvent::FileReceived { path: dest });
        }
        Ok(ResponseCode::Ok)
    }

    fn rename(&mut self, request: &HeaderSet) -> Outcome {
        let (source, dest) = self.action_paths(request)?;

        let removed = self.scan_or_empty(&source);
        fs::rename(&source, &dest)?;
        info!(from = %source.display(), to = %dest.display(), "renamed");

        if !removed.is_empty() {
            self.notifier.notify(FtpEvent::FilesDeleted { files: removed });
        }
        let added = self.scan_or_empty(&dest);
        if !added.is_empty() {
            self.notifier.notify(FtpEvent::FilesReceived { files: added });
        }
        Ok(ResponseCode::Ok)
    }

    fn put(&mut self, op: &mut dyn ServerOperation) -> Outcome {
        let current = self.ready()?;
        let headers = op.received_headers();
        let name = headers.name()?.map(str::to_owned);
        let declared_length = headers.length()?.unwrap_or(0);
        let mime_type = headers.mime_type()?.map(str::to_owned);
        let srm = headers.single_response_mode()?;

        if let Some(n) = name.as_deref().filter(|n| is_reserved(n)) {
            return Err(JailError::ReservedName(n.to_string()).into());
        }
        self.negotiate_srm(op, srm);

        let name = required(name.as_deref(), "NAME")?;
        let path = self.jail.child(&current, name)?;
        debug!(
            path = %path.display(),
            length = declared_length,
            mime_type = mime_type.as_deref().unwrap_or(""),
            "receiving file"
        );

        let armed = self.abort.arm();
        let outcome =
            transfer::receive_file(op, &path, declared_length, self.storage.as_ref(), armed.token())?;
        drop(armed);

        if let TransferOutcome::Complete { .. } = outcome {
            self.notifier.notify(FtpEvent::FileReceived { path });
        }
        Ok(outcome.response_code())
    }

    fn get(&mut self, op: &mut dyn ServerOperation) -> Outcome {
        let current = self.ready()?;
        let headers = op.received_headers();
        let name = headers.name()?.filter(|n| !n.is_empty()).map(str::to_owned);
        let mime_type = headers.mime_type()?.map(str::to_owned);
        let srm = headers.single_response_mode()?;

        if let Some(n) = name.as_deref().filter(|n| is_reserved(n)) {
            return Err(JailError::ReservedName(n.to_string()).into());
        }
        self.negotiate_srm(op, srm);

        let outcome = match (mime_type.as_deref(), name.as_deref()) {
            (Some(FOLDER_LISTING_TYPE), name) => {
                let folder = self.listing_folder(&current, name)?;
                let document = listing::render(&list_directory(&folder)?);
                debug!(path = %folder.display(), bytes = document.len(), "sending listing");
                let armed = self.abort.arm();
                transfer::send_listing(op, &folder, document.as_bytes(), armed.token())?
            }
            (Some(other), None) => return Err(FtpError::UnsupportedType(other.to_string())),
            (_, None) => return Err(FtpError::MissingHeader("NAME")),
            (_, Some(name)) => {
                let path = self.jail.child(&current, name)?;
                debug!(path = %path.display(), "sending file");
                let armed = self.abort.arm();
                transfer::send_file(op, &path, armed.token())?
            }
        };
        Ok(outcome.response_code())
    }

    /// Folder a listing GET refers to.
    ///
    /// No name, or the name of the current folder itself, lists the current
    /// folder. Any other name lists that child without entering it. A
    /// missing child has nothing to list; a file cannot be listed at all.
    fn listing_folder(&self, current: &Path, name: Option<&str>) -> Result<PathBuf, FtpError> {
        let Some(name) = name else {
            return Ok(current.to_path_buf());
        };
        if current.file_name().and_then(|n| n.to_str()) == Some(name) {
            return Ok(current.to_path_buf());
        }
        let child = self.jail.child(current, name)?;
        match fs::metadata(&child) {
            Ok(metadata) if metadata.is_dir() => Ok(child),
            Ok(_) => Err(FtpError::NotAFolder(child)),
            Err(_) => Err(FtpError::NoListing(child)),
        }
    }
}

fn required<'a>(value: Option<&'a str>, header: &'static str) -> Result<&'a str, FtpError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(FtpError::MissingHeader(header))
}

/// Recreate the folder `from` as `to`.
///
/// Symlinks are not followed or copied, so nothing outside `from` is read.
/// Sockets, FIFOs and devices fail the copy.
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let target = to.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir(&target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
        } else if file_type.is_symlink() {
            debug!(path = %entry.path().display(), "symlink not copied");
        } else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("cannot copy special file {}", entry.path().display()),
            ));
        }
    }
    Ok(())
}

impl RequestHandler for FtpSession {
    fn on_connect(&mut self, request: &HeaderSet, reply: &mut HeaderSet) -> ResponseCode {
        let result = self.connect(request, reply);
        self.respond("CONNECT", result)
    }

    fn on_disconnect(&mut self, _request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        if self.state != SessionState::Disconnected {
            self.state = SessionState::Disconnected;
            self.srm_enabled = false;
            info!("session disconnected");
            self.notifier.notify(FtpEvent::SessionDisconnected);
        }
        ResponseCode::Ok
    }

    fn on_abort(&mut self, _request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        self.abort.abort();
        ResponseCode::Ok
    }

    fn on_set_path(
        &mut self,
        request: &HeaderSet,
        _reply: &mut HeaderSet,
        backup: bool,
        create: bool,
    ) -> ResponseCode {
        let result = self.set_path(request, backup, create);
        self.respond("SETPATH", result)
    }

    fn on_delete(&mut self, request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        let result = self.delete(request);
        self.respond("DELETE", result)
    }

    fn on_copy(&mut self, request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        let result = self.copy(request);
        self.respond("COPY", result)
    }

    fn on_rename(&mut self, request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        let result = self.rename(request);
        self.respond("RENAME", result)
    }

    fn on_put(&mut self, op: &mut dyn ServerOperation) -> ResponseCode {
        let result = self.put(op);
        self.respond("PUT", result)
    }

    fn on_get(&mut self, op: &mut dyn ServerOperation) -> ResponseCode {
        let result = self.get(op);
        self.respond("GET", result)
    }

    fn on_close(&mut self) {
        self.abort.abort();
        self.state = SessionState::Disconnected;
        info!("server session closed");
        self.notifier.notify(FtpEvent::ServerSessionClosed);
    }
}
