//! OBEX header identifiers, values and header sets.
//!
//! The two high bits of a header identifier select how its value is encoded:
//!
//! | Bits   | Encoding                                  |
//! |--------|-------------------------------------------|
//! | `0x00` | null-terminated Unicode text              |
//! | `0x40` | byte sequence                             |
//! | `0x80` | single byte                               |
//! | `0xC0` | four-byte unsigned integer (big-endian)   |
//!
//! A [`HeaderSet`] refuses values whose kind disagrees with the identifier,
//! so typed getters only fail when a peer managed to smuggle in a mismatched
//! value through a permissive decoder.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ObexError, Result};

/// Encoding class of a header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderEncoding {
    /// Null-terminated Unicode text.
    Unicode,
    /// Length-prefixed byte sequence.
    Bytes,
    /// Single byte.
    Byte,
    /// Four-byte unsigned integer.
    FourBytes,
}

/// OBEX header identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeaderId(pub u8);

impl HeaderId {
    /// Object name (text).
    pub const NAME: HeaderId = HeaderId(0x01);
    /// Text description of the object.
    pub const DESCRIPTION: HeaderId = HeaderId(0x05);
    /// Destination name for COPY and RENAME actions.
    pub const DEST_NAME: HeaderId = HeaderId(0x15);
    /// Object type, null-terminated ASCII.
    pub const TYPE: HeaderId = HeaderId(0x42);
    /// ISO 8601 timestamp.
    pub const TIME: HeaderId = HeaderId(0x44);
    /// Service the operation is directed to.
    pub const TARGET: HeaderId = HeaderId(0x46);
    /// HTTP 1.x header.
    pub const HTTP: HeaderId = HeaderId(0x47);
    /// Chunk of the object body.
    pub const BODY: HeaderId = HeaderId(0x48);
    /// Final chunk of the object body.
    pub const END_OF_BODY: HeaderId = HeaderId(0x49);
    /// Identifies the OBEX application.
    pub const WHO: HeaderId = HeaderId(0x4A);
    /// Application parameters.
    pub const APP_PARAMETERS: HeaderId = HeaderId(0x4C);
    /// Action selector for ACTION requests.
    pub const ACTION_ID: HeaderId = HeaderId(0x94);
    /// Single Response Mode negotiation.
    pub const SINGLE_RESPONSE_MODE: HeaderId = HeaderId(0x97);
    /// Single Response Mode parameters.
    pub const SRM_PARAMETERS: HeaderId = HeaderId(0x98);
    /// Number of objects.
    pub const COUNT: HeaderId = HeaderId(0xC0);
    /// Object length in bytes.
    pub const LENGTH: HeaderId = HeaderId(0xC3);
    /// Connection identifier.
    pub const CONNECTION_ID: HeaderId = HeaderId(0xCB);
    /// Permission bits for SET_PERMISSIONS actions.
    pub const PERMISSIONS: HeaderId = HeaderId(0xD6);

    /// Encoding class derived from the two high bits.
    #[inline]
    pub fn encoding(self) -> HeaderEncoding {
        match self.0 & 0xC0 {
            0x00 => HeaderEncoding::Unicode,
            0x40 => HeaderEncoding::Bytes,
            0x80 => HeaderEncoding::Byte,
            _ => HeaderEncoding::FourBytes,
        }
    }
}

impl fmt::Display for HeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// A decoded header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Text value.
    Unicode(String),
    /// Byte sequence value.
    Bytes(Vec<u8>),
    /// Single byte value.
    Byte(u8),
    /// Four-byte integer value.
    U32(u32),
}

impl HeaderValue {
    /// Encoding class of this value.
    pub fn encoding(&self) -> HeaderEncoding {
        match self {
            HeaderValue::Unicode(_) => HeaderEncoding::Unicode,
            HeaderValue::Bytes(_) => HeaderEncoding::Bytes,
            HeaderValue::Byte(_) => HeaderEncoding::Byte,
            HeaderValue::U32(_) => HeaderEncoding::FourBytes,
        }
    }
}

/// Collection of headers carried by a request or a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: BTreeMap<HeaderId, HeaderValue>,
}

impl HeaderSet {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any previous value.
    pub fn set(&mut self, id: HeaderId, value: HeaderValue) -> Result<()> {
        let expected = id.encoding();
        let got = value.encoding();
        if expected != got {
            return Err(ObexError::HeaderTypeMismatch { id, expected, got });
        }
        self.headers.insert(id, value);
        Ok(())
    }

    /// Insert a header without checking its encoding class.
    ///
    /// Mirrors what a lenient decoder may hand over; typed getters still
    /// validate on access.
    pub fn set_unchecked(&mut self, id: HeaderId, value: HeaderValue) {
        self.headers.insert(id, value);
    }

    /// Get the raw value of a header.
    pub fn get(&self, id: HeaderId) -> Option<&HeaderValue> {
        self.headers.get(&id)
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, id: HeaderId) -> Option<HeaderValue> {
        self.headers.remove(&id)
    }

    /// Whether a header is present.
    pub fn contains(&self, id: HeaderId) -> bool {
        self.headers.contains_key(&id)
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the set has no headers.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over headers in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderId, &HeaderValue)> {
        self.headers.iter()
    }

    fn text(&self, id: HeaderId) -> Result<Option<&str>> {
        match self.headers.get(&id) {
            None => Ok(None),
            Some(HeaderValue::Unicode(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(mismatch(id, other)),
        }
    }

    fn bytes(&self, id: HeaderId) -> Result<Option<&[u8]>> {
        match self.headers.get(&id) {
            None => Ok(None),
            Some(HeaderValue::Bytes(b)) => Ok(Some(b.as_slice())),
            Some(other) => Err(mismatch(id, other)),
        }
    }

    fn byte(&self, id: HeaderId) -> Result<Option<u8>> {
        match self.headers.get(&id) {
            None => Ok(None),
            Some(HeaderValue::Byte(b)) => Ok(Some(*b)),
            Some(other) => Err(mismatch(id, other)),
        }
    }

    fn four_bytes(&self, id: HeaderId) -> Result<Option<u32>> {
        match self.headers.get(&id) {
            None => Ok(None),
            Some(HeaderValue::U32(v)) => Ok(Some(*v)),
            Some(other) => Err(mismatch(id, other)),
        }
    }

    /// NAME header.
    pub fn name(&self) -> Result<Option<&str>> {
        self.text(HeaderId::NAME)
    }

    /// DEST_NAME header.
    pub fn dest_name(&self) -> Result<Option<&str>> {
        self.text(HeaderId::DEST_NAME)
    }

    /// TYPE header with its trailing NUL removed.
    pub fn mime_type(&self) -> Result<Option<&str>> {
        let Some(raw) = self.bytes(HeaderId::TYPE)? else {
            return Ok(None);
        };
        let trimmed = raw.strip_suffix(&[0]).unwrap_or(raw);
        std::str::from_utf8(trimmed)
            .map(Some)
            .map_err(|_| ObexError::InvalidText(HeaderId::TYPE))
    }

    /// LENGTH header.
    pub fn length(&self) -> Result<Option<u64>> {
        Ok(self.four_bytes(HeaderId::LENGTH)?.map(u64::from))
    }

    /// TARGET header.
    pub fn target(&self) -> Result<Option<&[u8]>> {
        self.bytes(HeaderId::TARGET)
    }

    /// WHO header.
    pub fn who(&self) -> Result<Option<&[u8]>> {
        self.bytes(HeaderId::WHO)
    }

    /// SINGLE_RESPONSE_MODE header.
    pub fn single_response_mode(&self) -> Result<Option<u8>> {
        self.byte(HeaderId::SINGLE_RESPONSE_MODE)
    }

    /// CONNECTION_ID header.
    pub fn connection_id(&self) -> Result<Option<u32>> {
        self.four_bytes(HeaderId::CONNECTION_ID)
    }

    /// Builder: set NAME.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.headers
            .insert(HeaderId::NAME, HeaderValue::Unicode(name.into()));
        self
    }

    /// Builder: set DEST_NAME.
    pub fn with_dest_name(mut self, name: impl Into<String>) -> Self {
        self.headers
            .insert(HeaderId::DEST_NAME, HeaderValue::Unicode(name.into()));
        self
    }

    /// Builder: set TYPE, appending the terminating NUL.
    pub fn with_type(mut self, mime_type: &str) -> Self {
        let mut raw = mime_type.as_bytes().to_vec();
        raw.push(0);
        self.headers.insert(HeaderId::TYPE, HeaderValue::Bytes(raw));
        self
    }

    /// Builder: set LENGTH.
    pub fn with_length(mut self, length: u32) -> Self {
        self.headers.insert(HeaderId::LENGTH, HeaderValue::U32(length));
        self
    }

    /// Builder: set TARGET.
    pub fn with_target(mut self, target: Vec<u8>) -> Self {
        self.headers.insert(HeaderId::TARGET, HeaderValue::Bytes(target));
        self
    }

    /// Builder: set WHO.
    pub fn with_who(mut self, who: Vec<u8>) -> Self {
        self.headers.insert(HeaderId::WHO, HeaderValue::Bytes(who));
        self
    }

    /// Builder: set SINGLE_RESPONSE_MODE.
    pub fn with_single_response_mode(mut self, mode: u8) -> Self {
        self.headers
            .insert(HeaderId::SINGLE_RESPONSE_MODE, HeaderValue::Byte(mode));
        self
    }

    /// Builder: set CONNECTION_ID.
    pub fn with_connection_id(mut self, id: u32) -> Self {
        self.headers
            .insert(HeaderId::CONNECTION_ID, HeaderValue::U32(id));
        self
    }
}

fn mismatch(id: HeaderId, value: &HeaderValue) -> ObexError {
    ObexError::HeaderTypeMismatch {
        id,
        expected: id.encoding(),
        got: value.encoding(),
    }
}
