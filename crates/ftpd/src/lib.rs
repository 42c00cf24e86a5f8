//! # obexftpd
//!
//! Server core for the OBEX Folder Browsing (FTP) service.
//!
//! ## Overview
//!
//! A Bluetooth stack decodes OBEX packets and hands each request to a
//! session. This crate answers them against a shared folder:
//!
//! - **Sessions**: CONNECT target check, current folder tracking, and
//!   dispatch of SETPATH, GET, PUT, DELETE, COPY and RENAME
//! - **Path confinement**: clients never leave the configured root
//! - **Transfers**: packet-sized file and folder listing bodies, with
//!   Single Response Mode and per-transfer abort
//! - **Notifications**: events describing what changed on the shared tree
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 transport (OBEX decoder)                  │
//! └────────────┬───────────────────────────────┬──────────────┘
//!              │ Request                       │ abort()
//!              ▼                               ▼
//! ┌──────────────────────────┐      ┌──────────────────────┐
//! │      SessionWorker       │      │     AbortSignal      │
//! │  ┌────────────────────┐  │      └──────────┬───────────┘
//! │  │     FtpSession     │◄─┼─────────────────┘
//! │  └──┬──────┬───────┬──┘  │
//! └─────┼──────┼───────┼─────┘
//!       ▼      ▼       ▼
//!    Jail  transfer  NotificationSink
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ftpd::{BroadcastNotifier, ExtensionTable, FtpSession, LocalVolume, SessionWorker};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let root = "/srv/shared";
//! let notifier = Arc::new(BroadcastNotifier::new());
//! let session = FtpSession::new(
//!     root,
//!     Arc::new(LocalVolume::new(root, 1024 * 1024)),
//!     Arc::new(ExtensionTable::builtin()),
//!     notifier.clone(),
//! );
//! let (worker, handle) = SessionWorker::spawn(session)?;
//!
//! // Hand `handle` to the transport, then wait for the session to end
//! drop(handle);
//! worker.join().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`session`]: Session state machine and worker
//! - [`files`]: Path confinement, listings, scans and transfers
//! - [`storage`]: Volume mount and free space checks
//! - [`events`]: Change notifications

pub mod config;
pub mod error;
pub mod events;
pub mod files;
pub mod session;
pub mod storage;

// Re-export the OBEX layer for convenience
pub use obex;

pub use config::Config;
pub use error::FtpError;
pub use events::{BroadcastNotifier, FtpEvent, NotificationSink};
pub use files::{ExtensionTable, Jail, MimeClassifier, ScannedFile};
pub use session::{FtpSession, Reply, Request, SessionHandle, SessionState, SessionWorker};
pub use storage::{LocalVolume, StorageVolume};
