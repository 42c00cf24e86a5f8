//! Per-session request worker.
//!
//! The transport hands requests to a [`SessionHandle`]. A single worker
//! thread owns the [`FtpSession`] and serves them strictly in order, so
//! transfers may block on packet I/O without stalling the async side.
//! ABORT is the exception: [`SessionHandle::abort`] reaches the armed
//! transfer directly instead of waiting behind it in the queue.

use std::thread::{self, JoinHandle};

use obex::{HeaderSet, RequestHandler, ResponseCode, ServerOperation};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use super::abort::AbortSignal;
use super::state::FtpSession;

/// Depth of the request queue.
const REQUEST_QUEUE_DEPTH: usize = 16;

/// Errors raised by the worker plumbing.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker thread could not be started.
    #[error("failed to spawn session worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker is gone and cannot take requests.
    #[error("session worker stopped")]
    Stopped,

    /// The worker thread panicked.
    #[error("session worker panicked")]
    Panicked,
}

/// A request for the session, as decoded by the transport.
pub enum Request {
    /// Open the session. Must target the folder browsing service.
    Connect(HeaderSet),
    /// Close the session.
    Disconnect(HeaderSet),
    /// Stop the running transfer, if any.
    Abort(HeaderSet),
    /// Change the current folder.
    SetPath {
        /// Request headers, with the NAME of the folder to enter.
        headers: HeaderSet,
        /// Go to the parent before applying NAME.
        backup: bool,
        /// Create the named folder when it does not exist.
        create: bool,
    },
    /// Delete the NAME'd file or folder.
    Delete(HeaderSet),
    /// Copy NAME to DEST_NAME.
    Copy(HeaderSet),
    /// Move NAME to DEST_NAME.
    Rename(HeaderSet),
    /// Upload a file into the current folder.
    Put(Box<dyn ServerOperation>),
    /// Download a file or a folder listing.
    Get(Box<dyn ServerOperation>),
}

impl Request {
    /// Protocol name of the request.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Connect(_) => "CONNECT",
            Request::Disconnect(_) => "DISCONNECT",
            Request::Abort(_) => "ABORT",
            Request::SetPath { .. } => "SETPATH",
            Request::Delete(_) => "DELETE",
            Request::Copy(_) => "COPY",
            Request::Rename(_) => "RENAME",
            Request::Put(_) => "PUT",
            Request::Get(_) => "GET",
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Response to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Final response code.
    pub code: ResponseCode,
    /// Reply headers. Empty for PUT and GET, whose headers travel on the
    /// operation.
    pub headers: HeaderSet,
}

struct Job {
    request: Request,
    reply_tx: oneshot::Sender<Reply>,
}

/// Cloneable handle for submitting requests to a session worker.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    request_tx: mpsc::Sender<Job>,
    abort: AbortSignal,
}

impl SessionHandle {
    /// Queue a request and wait for its reply.
    pub async fn submit(&self, request: Request) -> Result<Reply, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        trace!(request = request.name(), "queueing request");
        self.request_tx
            .send(Job { request, reply_tx })
            .await
            .map_err(|_| WorkerError::Stopped)?;
        reply_rx.await.map_err(|_| WorkerError::Stopped)
    }

    /// Cancel the transfer in flight. Returns whether one was running.
    pub fn abort(&self) -> bool {
        let aborted = self.abort.abort();
        debug!(aborted, "abort requested");
        aborted
    }

    /// Whether the worker has stopped taking requests.
    pub fn is_closed(&self) -> bool {
        self.request_tx.is_closed()
    }
}

/// The thread serving one session.
#[derive(Debug)]
pub struct SessionWorker {
    thread: JoinHandle<()>,
}

impl SessionWorker {
    /// Start serving `session` on a dedicated thread.
    ///
    /// The worker runs until every [`SessionHandle`] is dropped, then calls
    /// [`RequestHandler::on_close`].
    pub fn spawn(session: FtpSession) -> Result<(Self, SessionHandle), WorkerError> {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let abort = session.abort_signal();

        let thread = thread::Builder::new()
            .name("obex-session".to_string())
            .spawn(move || serve(session, request_rx))
            .map_err(WorkerError::Spawn)?;

        Ok((Self { thread }, SessionHandle { request_tx, abort }))
    }

    /// Wait for the worker to finish.
    pub async fn join(self) -> Result<(), WorkerError> {
        let thread = self.thread;
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|_| WorkerError::Panicked)?
            .map_err(|_| WorkerError::Panicked)
    }
}

fn serve(mut session: FtpSession, mut request_rx: mpsc::Receiver<Job>) {
    info!(root = %session.root().display(), "session worker started");

    while let Some(job) = request_rx.blocking_recv() {
        let name = job.request.name();
        let reply = dispatch(&mut session, job.request);
        debug!(request = name, code = %reply.code, "request answered");
        if job.reply_tx.send(reply).is_err() {
            trace!(request = name, "requester went away before the reply");
        }
    }

    session.on_close();
    info!("session worker stopped");
}

fn dispatch(handler: &mut dyn RequestHandler, request: Request) -> Reply {
    let mut headers = HeaderSet::new();
    let code = match request {
        Request::Connect(req) => handler.on_connect(&req, &mut headers),
        Request::Disconnect(req) => handler.on_disconnect(&req, &mut headers),
        Request::Abort(req) => handler.on_abort(&req, &mut headers),
        Request::SetPath {
            headers: req,
            backup,
            create,
        } => handler.on_set_path(&req, &mut headers, backup, create),
        Request::Delete(req) => handler.on_delete(&req, &mut headers),
        Request::Copy(req) => handler.on_copy(&req, &mut headers),
        Request::Rename(req) => handler.on_rename(&req, &mut headers),
        Request::Put(mut op) => handler.on_put(op.as_mut()),
        Request::Get(mut op) => handler.on_get(op.as_mut()),
    };
    Reply { code, headers }
}
