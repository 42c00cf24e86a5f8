//! OBEX response codes.
//!
//! Codes are listed with the final bit (`0x80`) already set, which is how
//! they appear in a final response packet.

use std::fmt;

/// Response code answering an OBEX request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// More packets follow for the same operation.
    Continue,
    /// Success.
    Ok,
    /// Object created.
    Created,
    /// No content; also used when the storage volume is unavailable.
    NoContent,
    /// Malformed request or failed transfer.
    BadRequest,
    /// Permission denied.
    Unauthorized,
    /// Request understood but refused.
    Forbidden,
    /// Object or path does not exist.
    NotFound,
    /// Forbidden name or unsupported service.
    NotAcceptable,
    /// Conflicting state.
    Conflict,
    /// Not enough storage for the object.
    EntityTooLarge,
    /// Unexpected server-side failure.
    InternalError,
    /// Request not supported by this server.
    NotImplemented,
    /// Service temporarily unavailable.
    ServiceUnavailable,
    /// Storage full.
    DatabaseFull,
    /// Target is locked (read-only).
    DatabaseLocked,
}

impl ResponseCode {
    /// Wire value including the final bit.
    pub fn as_u8(self) -> u8 {
        match self {
            ResponseCode::Continue => 0x90,
            ResponseCode::Ok => 0xA0,
            ResponseCode::Created => 0xA1,
            ResponseCode::NoContent => 0xA4,
            ResponseCode::BadRequest => 0xC0,
            ResponseCode::Unauthorized => 0xC1,
            ResponseCode::Forbidden => 0xC3,
            ResponseCode::NotFound => 0xC4,
            ResponseCode::NotAcceptable => 0xC6,
            ResponseCode::Conflict => 0xC9,
            ResponseCode::EntityTooLarge => 0xCD,
            ResponseCode::InternalError => 0xD0,
            ResponseCode::NotImplemented => 0xD1,
            ResponseCode::ServiceUnavailable => 0xD3,
            ResponseCode::DatabaseFull => 0xE0,
            ResponseCode::DatabaseLocked => 0xE1,
        }
    }

    /// Parse a wire value. The final bit is optional.
    pub fn from_u8(value: u8) -> Option<Self> {
        let code = match value | 0x80 {
            0x90 => ResponseCode::Continue,
            0xA0 => ResponseCode::Ok,
            0xA1 => ResponseCode::Created,
            0xA4 => ResponseCode::NoContent,
            0xC0 => ResponseCode::BadRequest,
            0xC1 => ResponseCode::Unauthorized,
            0xC3 => ResponseCode::Forbidden,
            0xC4 => ResponseCode::NotFound,
            0xC6 => ResponseCode::NotAcceptable,
            0xC9 => ResponseCode::Conflict,
            0xCD => ResponseCode::EntityTooLarge,
            0xD0 => ResponseCode::InternalError,
            0xD1 => ResponseCode::NotImplemented,
            0xD3 => ResponseCode::ServiceUnavailable,
            0xE0 => ResponseCode::DatabaseFull,
            0xE1 => ResponseCode::DatabaseLocked,
            _ => return None,
        };
        Some(code)
    }

    /// Whether the code reports success or continuation.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            ResponseCode::Continue | ResponseCode::Ok | ResponseCode::Created | ResponseCode::NoContent
        )
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:#04x})", self, self.as_u8())
    }
}
