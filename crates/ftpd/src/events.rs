//! Server events delivered to the embedding application.
//!
//! The session reports what happened to the shared tree so an application
//! can refresh media indexes or show progress. Delivery is fire-and-forget.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::files::scanner::ScannedFile;

/// Capacity of the broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FtpEvent {
    /// A client connected to the folder browsing service.
    SessionEstablished,
    /// The client disconnected.
    SessionDisconnected,
    /// A file was stored.
    FileReceived { path: PathBuf },
    /// A file was deleted.
    FileDeleted { path: PathBuf },
    /// A set of files appeared (copy or rename destination).
    FilesReceived { files: Vec<ScannedFile> },
    /// A set of files went away (folder delete or rename source).
    FilesDeleted { files: Vec<ScannedFile> },
    /// The transport closed the session.
    ServerSessionClosed,
}

/// Receiver of session events.
pub trait NotificationSink: Send + Sync {
    /// Deliver an event. Must not block.
    fn notify(&self, event: FtpEvent);
}

/// Sink fanning events out over a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    event_tx: broadcast::Sender<FtpEvent>,
}

impl BroadcastNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { event_tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<FtpEvent> {
        self.event_tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for BroadcastNotifier {
    fn notify(&self, event: FtpEvent) {
        trace!(?event, "notify");
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
