//! Streamed server operations.
//!
//! A PUT or GET is more than a header exchange: the body travels through
//! streams opened on the operation, and the transport tracks Single Response
//! Mode negotiation plus whether the peer aborted the exchange.

use std::io::{self, Read, Write};

use crate::headers::HeaderSet;

/// Local Single Response Mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SrmStatus {
    /// SRM is active; the peer does not wait for per-packet responses.
    Enabled,
    /// SRM is inactive.
    #[default]
    Disabled,
}

/// SRM negotiation and abort state carried by an operation.
pub trait SrmCapability {
    /// Whether the local transport supports SRM at all.
    fn local_srm_capable(&self) -> bool;

    /// Record the negotiated local SRM state.
    fn set_local_srm_status(&mut self, status: SrmStatus);

    /// Current local SRM state.
    fn local_srm_status(&self) -> SrmStatus;

    /// Whether the peer aborted the operation.
    fn is_aborted(&self) -> bool;

    /// Mark the operation as aborted from the server side.
    fn set_aborted(&mut self, aborted: bool);
}

/// Inbound body stream of a PUT.
pub trait InputStream: Read + Send {
    /// Release the stream.
    fn close(&mut self) -> io::Result<()>;
}

/// Outbound body stream of a GET.
pub trait OutputStream: Write + Send {
    /// Flush and release the stream.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// A PUT or GET in progress, as handed to the server by the transport.
///
/// Streams are returned as owned boxes so a handler can hold a stream and
/// still query abort state on the operation.
pub trait ServerOperation: SrmCapability + Send {
    /// Headers received with the request.
    fn received_headers(&self) -> &HeaderSet;

    /// Largest body chunk the transport accepts per packet.
    fn max_packet_size(&self) -> usize;

    /// Open the inbound body stream.
    fn open_input_stream(&mut self) -> io::Result<Box<dyn InputStream>>;

    /// Open the outbound body stream.
    fn open_output_stream(&mut self) -> io::Result<Box<dyn OutputStream>>;

    /// Queue response headers ahead of the body.
    fn send_headers(&mut self, headers: &HeaderSet) -> io::Result<()>;

    /// Finish the operation.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: Read + Send> InputStream for io::BufReader<T> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputStream for Vec<u8> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srm_status_default_disabled() {
        assert_eq!(SrmStatus::default(), SrmStatus::Disabled);
    }

    #[test]
    fn test_vec_output_stream_close_flushes() {
        let mut out: Vec<u8> = Vec::new();
        out.write_all(b"abc").unwrap();
        OutputStream::close(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_buf_reader_input_stream() {
        let mut input = io::BufReader::new(&b"hello"[..]);
        let mut buf = String::new();
        input.read_to_string(&mut buf).unwrap();
        InputStream::close(&mut input).unwrap();
        assert_eq!(buf, "hello");
    }
}
