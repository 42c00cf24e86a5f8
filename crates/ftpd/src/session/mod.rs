//! Session handling.
//!
//! A session answers the requests of one client. [`FtpSession`] holds the
//! protocol state and [`SessionWorker`] runs it on a dedicated blocking
//! thread, fed by a request queue.

pub mod abort;
pub mod state;
pub mod worker;

pub use abort::{AbortSignal, ArmedTransfer};
pub use state::{FtpSession, SessionState};
pub use worker::{Reply, Request, SessionHandle, SessionWorker, WorkerError};
