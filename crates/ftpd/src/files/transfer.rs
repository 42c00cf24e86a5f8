//! Packet-sized transfers between local files and OBEX operation streams.
//!
//! This module moves object bodies for PUT and GET:
//! - Inbound: transport input stream into a freshly created file
//! - Outbound: a file or a rendered folder listing into the transport output
//!
//! Every chunk is bounded by the operation's max packet size, queried once
//! per transfer. Both directions poll a cancellation token before each chunk,
//! and outbound transfers also poll the operation's abort state before each
//! write when SRM is active. Streams and the operation handle are closed on
//! every exit path, with close failures aggregated.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use obex::{
    HeaderSet, InputStream, OutputStream, ResponseCode, ServerOperation, SrmCapability, SrmStatus,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::entry::is_writable;
use crate::storage::StorageVolume;

/// Buffer size for the local file side of a transfer (16KB).
pub const FILE_BUFFER_SIZE: usize = 0x4000;

/// Errors that can occur during a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The volume cannot hold the declared length.
    #[error("not enough space for {0} bytes")]
    InsufficientSpace(u64),

    /// The transport refused to open a body stream.
    #[error("failed to open transport stream: {0}")]
    StreamOpen(#[source] io::Error),

    /// The destination folder is read-only.
    #[error("folder is read-only: {0}")]
    FolderLocked(PathBuf),

    /// The existing destination file is read-only.
    #[error("file is read-only: {0}")]
    FileLocked(PathBuf),

    /// The destination exists and is a folder.
    #[error("path is a folder: {0}")]
    IsAFolder(PathBuf),

    /// The requested file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Reading or writing a chunk failed mid-transfer.
    #[error("transfer interrupted after {transferred} bytes: {source}")]
    Interrupted {
        transferred: u64,
        #[source]
        source: io::Error,
    },

    /// Writing a folder listing to the transport failed.
    #[error("failed to push listing: {0}")]
    PushFailed(#[source] io::Error),

    /// Flushing the received file failed; the file was removed.
    #[error("failed to finalize {path}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// One or more streams failed to close.
    #[error("failed to close: {0}")]
    Close(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TransferError {
    /// Response code reported to the client.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            TransferError::InsufficientSpace(_) => ResponseCode::EntityTooLarge,
            TransferError::FolderLocked(_) | TransferError::FileLocked(_) => {
                ResponseCode::DatabaseLocked
            }
            TransferError::IsAFolder(_) => ResponseCode::NotAcceptable,
            TransferError::FileNotFound(_) => ResponseCode::NotFound,
            TransferError::Interrupted { .. } => ResponseCode::BadRequest,
            TransferError::StreamOpen(_)
            | TransferError::PushFailed(_)
            | TransferError::Finalize { .. }
            | TransferError::Close(_)
            | TransferError::Io(_) => ResponseCode::InternalError,
        }
    }
}

/// How a transfer ended when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every byte was moved.
    Complete { bytes: u64 },
    /// Cancelled or aborted by the client.
    Aborted { bytes: u64 },
    /// The source ended early; the client should continue with another GET.
    Partial { bytes: u64 },
}

impl TransferOutcome {
    /// Response code reported to the client.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            TransferOutcome::Complete { .. } | TransferOutcome::Aborted { .. } => ResponseCode::Ok,
            TransferOutcome::Partial { .. } => ResponseCode::Continue,
        }
    }

    /// Bytes moved.
    pub fn bytes(&self) -> u64 {
        match self {
            TransferOutcome::Complete { bytes }
            | TransferOutcome::Aborted { bytes }
            | TransferOutcome::Partial { bytes } => *bytes,
        }
    }
}

/// State of one in-flight transfer.
#[derive(Debug)]
pub struct TransferDescriptor {
    /// Local file, or the listed folder for listings.
    pub path: PathBuf,
    /// Declared length; 0 means unknown.
    pub declared_length: u64,
    /// Bytes moved so far.
    pub transferred: u64,
    buffer: Vec<u8>,
    cancel: CancellationToken,
}

impl TransferDescriptor {
    /// Create a descriptor with a packet buffer of `packet_size` bytes.
    pub fn new(
        path: PathBuf,
        declared_length: u64,
        packet_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            path,
            declared_length,
            transferred: 0,
            buffer: vec![0; packet_size.max(1)],
            cancel,
        }
    }

    /// Size of the next chunk: one packet, clamped to the remaining
    /// declared length when that length is known.
    pub fn chunk_len(&self) -> usize {
        let packet = self.buffer.len();
        if self.declared_length == 0 {
            return packet;
        }
        let remaining = self.declared_length.saturating_sub(self.transferred);
        usize::try_from(remaining).map_or(packet, |r| r.min(packet))
    }

    /// Whether the declared length has been reached.
    pub fn is_complete(&self) -> bool {
        self.declared_length > 0 && self.transferred >= self.declared_length
    }

    /// Whether the transfer was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn advance(&mut self, n: usize) {
        self.transferred += n as u64;
    }
}

#[derive(Default)]
struct CloseErrors(Vec<String>);

impl CloseErrors {
    fn record(&mut self, what: &str, result: io::Result<()>) {
        if let Err(e) = result {
            warn!(stream = what, error = %e, "close failed");
            self.0.push(format!("{what}: {e}"));
        }
    }

    /// A primary error wins over close failures.
    fn finish(self, result: Result<TransferOutcome, TransferError>) -> Result<TransferOutcome, TransferError> {
        let outcome = result?;
        if self.0.is_empty() {
            Ok(outcome)
        } else {
            Err(TransferError::Close(self.0.join("; ")))
        }
    }
}

/// Receive a PUT body into `path`.
///
/// Checks run in this order: free space for `declared_length`, the input
/// stream, a writable parent folder, and a writable (then removed) existing
/// file. A cancelled or aborted upload deletes the partial file and reports
/// [`TransferOutcome::Aborted`]. A read or write failure deletes the partial
/// file and reports [`TransferError::Interrupted`].
pub fn receive_file(
    op: &mut dyn ServerOperation,
    path: &Path,
    declared_length: u64,
    storage: &dyn StorageVolume,
    cancel: CancellationToken,
) -> Result<TransferOutcome, TransferError> {
    let mut input: Option<Box<dyn InputStream>> = None;
    let result = receive_into(op, &mut input, path, declared_length, storage, cancel);

    let mut closes = CloseErrors::default();
    if let Some(mut stream) = input {
        closes.record("input", stream.close());
    }
    closes.record("operation", op.close());
    closes.finish(result)
}

fn receive_into(
    op: &mut dyn ServerOperation,
    input: &mut Option<Box<dyn InputStream>>,
    path: &Path,
    declared_length: u64,
    storage: &dyn StorageVolume,
    cancel: CancellationToken,
) -> Result<TransferOutcome, TransferError> {
    if !storage.has_space_for(declared_length) {
        return Err(TransferError::InsufficientSpace(declared_length));
    }

    let input = input.insert(op.open_input_stream().map_err(TransferError::StreamOpen)?);

    let parent = path
        .parent()
        .ok_or_else(|| TransferError::FolderLocked(path.to_path_buf()))?;
    if !is_writable(parent) {
        return Err(TransferError::FolderLocked(parent.to_path_buf()));
    }

    if let Ok(existing) = fs::symlink_metadata(path) {
        if existing.is_dir() {
            return Err(TransferError::IsAFolder(path.to_path_buf()));
        }
        if existing.is_file() && !is_writable(path) {
            return Err(TransferError::FileLocked(path.to_path_buf()));
        }
        fs::remove_file(path)?;
        debug!(path = %path.display(), "replacing existing file");
    }

    let mut descriptor =
        TransferDescriptor::new(path.to_path_buf(), declared_length, op.max_packet_size(), cancel);
    let mut writer = BufWriter::with_capacity(FILE_BUFFER_SIZE, File::create(path)?);
    let started = Instant::now();

    while !descriptor.is_complete() {
        if descriptor.is_cancelled() || op.is_aborted() {
            op.set_aborted(true);
            drop(writer);
            remove_partial(path);
            info!(
                path = %path.display(),
                bytes = descriptor.transferred,
                "upload aborted"
            );
            return Ok(TransferOutcome::Aborted {
                bytes: descriptor.transferred,
            });
        }

        let want = descriptor.chunk_len();
        let step = match input.read(&mut descriptor.buffer[..want]) {
            Ok(0) => break,
            Ok(n) => writer.write_all(&descriptor.buffer[..n]).map(|_| n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };

        match step {
            Ok(n) => descriptor.advance(n),
            Err(e) => {
                op.set_aborted(true);
                drop(writer);
                remove_partial(path);
                return Err(TransferError::Interrupted {
                    transferred: descriptor.transferred,
                    source: e,
                });
            }
        }
    }

    if let Err(e) = writer.into_inner().map_err(|e| e.into_error()) {
        remove_partial(path);
        return Err(TransferError::Finalize {
            path: path.to_path_buf(),
            source: e,
        });
    }

    info!(
        path = %path.display(),
        bytes = descriptor.transferred,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "file received"
    );
    Ok(TransferOutcome::Complete {
        bytes: descriptor.transferred,
    })
}

/// Send the file at `path` as a GET body, announcing its LENGTH first.
///
/// The result is [`TransferOutcome::Partial`] when the file shrank while it
/// was being sent.
pub fn send_file(
    op: &mut dyn ServerOperation,
    path: &Path,
    cancel: CancellationToken,
) -> Result<TransferOutcome, TransferError> {
    let mut output: Option<Box<dyn OutputStream>> = None;
    let result = send_file_into(op, &mut output, path, cancel);
    close_outbound(op, output, result)
}

fn send_file_into(
    op: &mut dyn ServerOperation,
    output: &mut Option<Box<dyn OutputStream>>,
    path: &Path,
    cancel: CancellationToken,
) -> Result<TransferOutcome, TransferError> {
    let metadata = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return Err(TransferError::FileNotFound(path.to_path_buf())),
    };
    let length = metadata.len();
    let source = BufReader::with_capacity(FILE_BUFFER_SIZE, File::open(path)?);
    let out = output.insert(op.open_output_stream().map_err(TransferError::StreamOpen)?);

    match u32::try_from(length) {
        Ok(announced) => {
            op.send_headers(&HeaderSet::new().with_length(announced))
                .map_err(|e| {
                    op.set_aborted(true);
                    TransferError::Interrupted {
                        transferred: 0,
                        source: e,
                    }
                })?;
        }
        Err(_) => debug!(path = %path.display(), length, "too large for LENGTH header"),
    }

    let srm = op.local_srm_status() == SrmStatus::Enabled;
    let mut descriptor =
        TransferDescriptor::new(path.to_path_buf(), length, op.max_packet_size(), cancel);
    pump(op, &mut **out, source, &mut descriptor, srm, Source::File)
}

/// Send a rendered folder listing as a GET body.
///
/// The operation's abort state is polled before every write, and a write
/// failure reports [`TransferError::PushFailed`].
pub fn send_listing(
    op: &mut dyn ServerOperation,
    folder: &Path,
    document: &[u8],
    cancel: CancellationToken,
) -> Result<TransferOutcome, TransferError> {
    let mut output: Option<Box<dyn OutputStream>> = None;
    let result = send_listing_into(op, &mut output, folder, document, cancel);
    close_outbound(op, output, result)
}

fn send_listing_into(
    op: &mut dyn ServerOperation,
    output: &mut Option<Box<dyn OutputStream>>,
    folder: &Path,
    document: &[u8],
    cancel: CancellationToken,
) -> Result<TransferOutcome, TransferError> {
    let out = output.insert(op.open_output_stream().map_err(TransferError::StreamOpen)?);
    let mut descriptor = TransferDescriptor::new(
        folder.to_path_buf(),
        document.len() as u64,
        op.max_packet_size(),
        cancel,
    );
    pump(op, &mut **out, document, &mut descriptor, true, Source::Listing)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    File,
    Listing,
}

fn pump<R: Read>(
    op: &mut dyn ServerOperation,
    out: &mut dyn OutputStream,
    mut source: R,
    descriptor: &mut TransferDescriptor,
    check_op_abort: bool,
    kind: Source,
) -> Result<TransferOutcome, TransferError> {
    let started = Instant::now();

    while descriptor.transferred < descriptor.declared_length {
        if descriptor.is_cancelled() {
            op.set_aborted(true);
            return Ok(aborted(descriptor, kind));
        }

        let want = descriptor.chunk_len();
        let read = match source.read(&mut descriptor.buffer[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                op.set_aborted(true);
                return Err(TransferError::Interrupted {
                    transferred: descriptor.transferred,
                    source: e,
                });
            }
        };

        // Nothing goes on the wire once the peer has aborted
        if check_op_abort && op.is_aborted() {
            op.set_aborted(true);
            return Ok(aborted(descriptor, kind));
        }

        if let Err(e) = out.write_all(&descriptor.buffer[..read]) {
            return Err(match kind {
                Source::Listing => TransferError::PushFailed(e),
                Source::File => {
                    op.set_aborted(true);
                    TransferError::Interrupted {
                        transferred: descriptor.transferred,
                        source: e,
                    }
                }
            });
        }
        descriptor.advance(read);
    }

    let bytes = descriptor.transferred;
    if bytes < descriptor.declared_length {
        debug!(
            path = %descriptor.path.display(),
            bytes,
            length = descriptor.declared_length,
            "source ended early"
        );
        return Ok(TransferOutcome::Partial { bytes });
    }

    info!(
        path = %descriptor.path.display(),
        bytes,
        listing = kind == Source::Listing,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "object sent"
    );
    Ok(TransferOutcome::Complete { bytes })
}

fn aborted(descriptor: &TransferDescriptor, kind: Source) -> TransferOutcome {
    info!(
        path = %descriptor.path.display(),
        bytes = descriptor.transferred,
        listing = kind == Source::Listing,
        "download aborted"
    );
    TransferOutcome::Aborted {
        bytes: descriptor.transferred,
    }
}

fn close_outbound(
    op: &mut dyn ServerOperation,
    output: Option<Box<dyn OutputStream>>,
    result: Result<TransferOutcome, TransferError>,
) -> Result<TransferOutcome, TransferError> {
    let mut closes = CloseErrors::default();
    if let Some(mut stream) = output {
        closes.record("output", stream.close());
    }
    closes.record("operation", op.close());
    closes.finish(result)
}

fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to remove partial file");
    }
}
