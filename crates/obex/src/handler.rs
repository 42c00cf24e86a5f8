//! Server request handler trait.

use crate::headers::HeaderSet;
use crate::operation::ServerOperation;
use crate::response::ResponseCode;

/// Callbacks invoked by the transport, one per decoded OBEX request.
///
/// Every method has a default answer of [`ResponseCode::NotImplemented`],
/// so a server only overrides the requests its service supports.
pub trait RequestHandler: Send {
    /// CONNECT request. Reply headers are written into `reply`.
    fn on_connect(&mut self, _request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        ResponseCode::NotImplemented
    }

    /// DISCONNECT request.
    fn on_disconnect(&mut self, _request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        ResponseCode::NotImplemented
    }

    /// ABORT request received while an operation was in flight.
    fn on_abort(&mut self, _request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        ResponseCode::NotImplemented
    }

    /// SETPATH request.
    ///
    /// `backup` moves to the parent folder, `create` allows a missing folder
    /// to be created.
    fn on_set_path(
        &mut self,
        _request: &HeaderSet,
        _reply: &mut HeaderSet,
        _backup: bool,
        _create: bool,
    ) -> ResponseCode {
        ResponseCode::NotImplemented
    }

    /// PUT without a body, which deletes the named object.
    fn on_delete(&mut self, _request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        ResponseCode::NotImplemented
    }

    /// ACTION copy request.
    fn on_copy(&mut self, _request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        ResponseCode::NotImplemented
    }

    /// ACTION move/rename request.
    fn on_rename(&mut self, _request: &HeaderSet, _reply: &mut HeaderSet) -> ResponseCode {
        ResponseCode::NotImplemented
    }

    /// PUT request carrying a body.
    fn on_put(&mut self, _op: &mut dyn ServerOperation) -> ResponseCode {
        ResponseCode::NotImplemented
    }

    /// GET request.
    fn on_get(&mut self, _op: &mut dyn ServerOperation) -> ResponseCode {
        ResponseCode::NotImplemented
    }

    /// The transport closed the session.
    fn on_close(&mut self) {}
}
