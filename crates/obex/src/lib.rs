//! # OBEX Session Layer
//!
//! This crate provides the OBEX (Object Exchange) types that the folder
//! browsing server consumes from its transport.
//!
//! ## Overview
//!
//! The wire framing of OBEX packets belongs to the transport. What this crate
//! models is the API the transport hands to a server once a request has been
//! decoded:
//!
//! - **Header Sets**: typed access to NAME, TYPE, LENGTH, TARGET, WHO and friends
//! - **Response Codes**: the HTTP-like status codes a request is answered with
//! - **Server Operations**: streamed PUT/GET bodies plus SRM and abort state
//! - **Request Handler**: one callback per OBEX request
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        RequestHandler (server)          │  on_connect / on_put / on_get ...
//! ├─────────────────────────────────────────┤
//! │   HeaderSet  │  ServerOperation streams │
//! ├─────────────────────────────────────────┤
//! │      OBEX packet framing (transport)    │
//! ├─────────────────────────────────────────┤
//! │         Bluetooth RFCOMM / L2CAP        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use obex::{HeaderSet, ResponseCode, FTP_TARGET};
//!
//! let request = HeaderSet::new().with_target(FTP_TARGET.to_vec());
//! assert_eq!(request.target().unwrap(), Some(&FTP_TARGET[..]));
//! assert_eq!(ResponseCode::Ok.as_u8(), 0xA0);
//! ```
//!
//! ## Modules
//!
//! - [`headers`]: Header identifiers, values and header sets
//! - [`response`]: Response codes
//! - [`operation`]: Streamed operation and SRM capability traits
//! - [`handler`]: Server request handler trait
//! - [`ftp`]: Folder browsing service constants
//! - [`memory`]: In-memory operation for tests and local tooling
//! - [`error`]: Error types

pub mod error;
pub mod ftp;
pub mod handler;
pub mod headers;
pub mod memory;
pub mod operation;
pub mod response;

pub use error::{ObexError, Result};
pub use ftp::{FOLDER_LISTING_TYPE, FTP_TARGET, FTP_TARGET_UUID, SRM_DISABLE, SRM_ENABLE, UUID_LENGTH};
pub use handler::RequestHandler;
pub use headers::{HeaderEncoding, HeaderId, HeaderSet, HeaderValue};
pub use memory::MemoryOperation;
pub use operation::{InputStream, OutputStream, ServerOperation, SrmCapability, SrmStatus};
pub use response::ResponseCode;
