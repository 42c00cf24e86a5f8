//! In-memory [`ServerOperation`] for tests and local tooling.
//!
//! The inbound body is fed from a queue of packets and the outbound body is
//! captured in a shared buffer. Failures can be injected at every step a real
//! transport may fail, and hooks run before each read or write so a test can
//! abort a transfer at a precise point.
//!
//! Because handlers usually take ownership of the operation, everything a
//! test wants to inspect afterwards lives behind a [`MemoryRecorder`].

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::error::ObexError;
use crate::headers::HeaderSet;
use crate::operation::{InputStream, OutputStream, ServerOperation, SrmCapability, SrmStatus};

/// Default body chunk size.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 4096;

type Hook = Box<dyn FnMut(usize) + Send>;

/// Shared view of a [`MemoryOperation`]'s observable state.
#[derive(Clone, Default)]
pub struct MemoryRecorder {
    output: Arc<Mutex<Vec<u8>>>,
    write_sizes: Arc<Mutex<Vec<usize>>>,
    sent_headers: Arc<Mutex<Vec<HeaderSet>>>,
    aborted: Arc<AtomicBool>,
    input_closed: Arc<AtomicBool>,
    output_closed: Arc<AtomicBool>,
    op_closed: Arc<AtomicBool>,
}

impl MemoryRecorder {
    /// Bytes written to the output stream.
    pub fn output(&self) -> Vec<u8> {
        self.output.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Size of each individual write on the output stream.
    pub fn write_sizes(&self) -> Vec<usize> {
        self.write_sizes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Header sets sent ahead of the body, in order.
    pub fn sent_headers(&self) -> Vec<HeaderSet> {
        self.sent_headers.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Whether the operation is flagged aborted.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Flag the operation as aborted by the peer.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Whether the input stream was closed.
    pub fn input_closed(&self) -> bool {
        self.input_closed.load(Ordering::SeqCst)
    }

    /// Whether the output stream was closed.
    pub fn output_closed(&self) -> bool {
        self.output_closed.load(Ordering::SeqCst)
    }

    /// Whether the operation itself was closed.
    pub fn op_closed(&self) -> bool {
        self.op_closed.load(Ordering::SeqCst)
    }
}

/// In-memory operation.
pub struct MemoryOperation {
    headers: HeaderSet,
    packets: VecDeque<Vec<u8>>,
    max_packet_size: usize,
    srm_capable: bool,
    srm_status: SrmStatus,
    recorder: MemoryRecorder,
    fail_open_input: bool,
    fail_open_output: bool,
    fail_read_after: Option<usize>,
    fail_write_after: Option<usize>,
    fail_close: bool,
    on_read: Option<Hook>,
    on_write: Option<Hook>,
    input_taken: bool,
    output_taken: bool,
}

impl MemoryOperation {
    /// Create an operation carrying `headers` and no body.
    pub fn new(headers: HeaderSet) -> Self {
        Self {
            headers,
            packets: VecDeque::new(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            srm_capable: false,
            srm_status: SrmStatus::Disabled,
            recorder: MemoryRecorder::default(),
            fail_open_input: false,
            fail_open_output: false,
            fail_read_after: None,
            fail_write_after: None,
            fail_close: false,
            on_read: None,
            on_write: None,
            input_taken: false,
            output_taken: false,
        }
    }

    /// Append a body, split into packets of the current max packet size.
    pub fn with_body(mut self, body: &[u8]) -> Self {
        let size = self.max_packet_size.max(1);
        self.packets
            .extend(body.chunks(size).map(|chunk| chunk.to_vec()));
        self
    }

    /// Append a single inbound packet as-is.
    pub fn with_packet(mut self, packet: Vec<u8>) -> Self {
        self.packets.push_back(packet);
        self
    }

    /// Set the max packet size.
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Declare whether the local transport supports SRM.
    pub fn with_srm_capable(mut self, capable: bool) -> Self {
        self.srm_capable = capable;
        self
    }

    /// Make `open_input_stream` fail.
    pub fn fail_open_input(mut self) -> Self {
        self.fail_open_input = true;
        self
    }

    /// Make `open_output_stream` fail.
    pub fn fail_open_output(mut self) -> Self {
        self.fail_open_output = true;
        self
    }

    /// Fail every read after `reads` successful ones.
    pub fn fail_read_after(mut self, reads: usize) -> Self {
        self.fail_read_after = Some(reads);
        self
    }

    /// Fail every write after `writes` successful ones.
    pub fn fail_write_after(mut self, writes: usize) -> Self {
        self.fail_write_after = Some(writes);
        self
    }

    /// Make `close` fail.
    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Run `hook` with the read index before each read.
    pub fn on_read(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_read = Some(Box::new(hook));
        self
    }

    /// Run `hook` with the write index before each write.
    pub fn on_write(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_write = Some(Box::new(hook));
        self
    }

    /// Handle on the observable state.
    pub fn recorder(&self) -> MemoryRecorder {
        self.recorder.clone()
    }
}

impl SrmCapability for MemoryOperation {
    fn local_srm_capable(&self) -> bool {
        self.srm_capable
    }

    fn set_local_srm_status(&mut self, status: SrmStatus) {
        self.srm_status = status;
    }

    fn local_srm_status(&self) -> SrmStatus {
        self.srm_status
    }

    fn is_aborted(&self) -> bool {
        self.recorder.is_aborted()
    }

    fn set_aborted(&mut self, aborted: bool) {
        self.recorder.aborted.store(aborted, Ordering::SeqCst);
    }
}

impl ServerOperation for MemoryOperation {
    fn received_headers(&self) -> &HeaderSet {
        &self.headers
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn open_input_stream(&mut self) -> io::Result<Box<dyn InputStream>> {
        if self.fail_open_input {
            return Err(io::Error::other("input stream refused"));
        }
        if self.input_taken {
            return Err(ObexError::StreamUnavailable("input already open".to_string()).into());
        }
        self.input_taken = true;
        Ok(Box::new(MemoryInput {
            packets: std::mem::take(&mut self.packets),
            reads: 0,
            fail_after: self.fail_read_after,
            hook: self.on_read.take(),
            closed: Arc::clone(&self.recorder.input_closed),
        }))
    }

    fn open_output_stream(&mut self) -> io::Result<Box<dyn OutputStream>> {
        if self.fail_open_output {
            return Err(io::Error::other("output stream refused"));
        }
        if self.output_taken {
            return Err(ObexError::StreamUnavailable("output already open".to_string()).into());
        }
        self.output_taken = true;
        Ok(Box::new(MemoryOutput {
            recorder: self.recorder.clone(),
            writes: 0,
            fail_after: self.fail_write_after,
            hook: self.on_write.take(),
        }))
    }

    fn send_headers(&mut self, headers: &HeaderSet) -> io::Result<()> {
        self.recorder
            .sent_headers
            .lock()
            .map_err(|_| io::Error::other("header log poisoned"))?
            .push(headers.clone());
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.recorder.op_closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(io::Error::other("operation close failed"));
        }
        Ok(())
    }
}

struct MemoryInput {
    packets: VecDeque<Vec<u8>>,
    reads: usize,
    fail_after: Option<usize>,
    hook: Option<Hook>,
    closed: Arc<AtomicBool>,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let index = self.reads;
        self.reads += 1;
        if let Some(hook) = self.hook.as_mut() {
            hook(index);
        }
        if self.fail_after.is_some_and(|n| index >= n) {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "link lost"));
        }

        let Some(front) = self.packets.front_mut() else {
            return Ok(0);
        };
        let n = front.len().min(buf.len());
        buf[..n].copy_from_slice(&front[..n]);
        if n == front.len() {
            self.packets.pop_front();
        } else {
            front.drain(..n);
        }
        trace!(bytes = n, "memory input read");
        Ok(n)
    }
}

impl InputStream for MemoryInput {
    fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryOutput {
    recorder: MemoryRecorder,
    writes: usize,
    fail_after: Option<usize>,
    hook: Option<Hook>,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let index = self.writes;
        self.writes += 1;
        if let Some(hook) = self.hook.as_mut() {
            hook(index);
        }
        if self.fail_after.is_some_and(|n| index >= n) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link lost"));
        }

        self.recorder
            .output
            .lock()
            .map_err(|_| io::Error::other("output buffer poisoned"))?
            .extend_from_slice(buf);
        self.recorder
            .write_sizes
            .lock()
            .map_err(|_| io::Error::other("write log poisoned"))?
            .push(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputStream for MemoryOutput {
    fn close(&mut self) -> io::Result<()> {
        self.recorder.output_closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_body_is_split_into_packets() {
        let mut op = MemoryOperation::new(HeaderSet::new())
            .with_max_packet_size(4)
            .with_body(b"abcdefghij");
        let mut input = op.open_input_stream().unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(input.read(&mut buf).unwrap(), 4);
        assert_eq!(input.read(&mut buf).unwrap(), 4);
        assert_eq!(input.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ij");
        assert_eq!(input.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_partial_packet_reads() {
        let mut op = MemoryOperation::new(HeaderSet::new()).with_packet(b"hello".to_vec());
        let mut input = op.open_input_stream().unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(input.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(input.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
    }

    #[test]
    fn test_input_stream_opens_once() {
        let mut op = MemoryOperation::new(HeaderSet::new());
        assert!(op.open_input_stream().is_ok());
        assert!(op.open_input_stream().is_err());
    }

    #[test]
    fn test_injected_open_failures() {
        let mut op = MemoryOperation::new(HeaderSet::new())
            .fail_open_input()
            .fail_open_output();
        assert!(op.open_input_stream().is_err());
        assert!(op.open_output_stream().is_err());
    }

    #[test]
    fn test_read_failure_after_count() {
        let mut op = MemoryOperation::new(HeaderSet::new())
            .with_max_packet_size(2)
            .with_body(b"abcdef")
            .fail_read_after(1);
        let mut input = op.open_input_stream().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(input.read(&mut buf).unwrap(), 2);
        let err = input.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_streams_open_once() {
        let mut op = MemoryOperation::new(HeaderSet::new()).with_body(b"abc");
        let _input = op.open_input_stream().unwrap();
        let _output = op.open_output_stream().unwrap();

        let err = match op.open_input_stream() {
            Ok(_) => panic!("input opened twice"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(err.to_string(), "stream unavailable: input already open");

        let err = match op.open_output_stream() {
            Ok(_) => panic!("output opened twice"),
            Err(e) => e,
        };
        assert_eq!(err.to_string(), "stream unavailable: output already open");
    }

    #[test]
    fn test_output_is_captured() {
        let mut op = MemoryOperation::new(HeaderSet::new());
        let recorder = op.recorder();
        let mut out = op.open_output_stream().unwrap();
        out.write_all(b"abc").unwrap();
        out.write_all(b"de").unwrap();
        out.close().unwrap();

        assert_eq!(recorder.output(), b"abcde");
        assert_eq!(recorder.write_sizes(), vec![3, 2]);
        assert!(recorder.output_closed());
    }

    #[test]
    fn test_write_failure_after_count() {
        let mut op = MemoryOperation::new(HeaderSet::new()).fail_write_after(1);
        let mut out = op.open_output_stream().unwrap();
        assert!(out.write(b"a").is_ok());
        assert!(out.write(b"b").is_err());
    }

    #[test]
    fn test_hooks_see_indices() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_hook = Arc::clone(&seen);
        let mut op = MemoryOperation::new(HeaderSet::new())
            .with_body(b"xy")
            .on_read(move |index| {
                seen_hook.fetch_max(index + 1, Ordering::SeqCst);
            });
        let mut input = op.open_input_stream().unwrap();
        let mut buf = Vec::new();
        input.read_to_end(&mut buf).unwrap();

        assert_eq!(buf, b"xy");
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_abort_is_shared_with_recorder() {
        let mut op = MemoryOperation::new(HeaderSet::new());
        let recorder = op.recorder();
        assert!(!op.is_aborted());

        recorder.abort();
        assert!(op.is_aborted());

        op.set_aborted(false);
        assert!(!recorder.is_aborted());
    }

    #[test]
    fn test_send_headers_and_close_recorded() {
        let mut op = MemoryOperation::new(HeaderSet::new()).fail_close();
        let recorder = op.recorder();
        op.send_headers(&HeaderSet::new().with_length(12)).unwrap();
        assert!(op.close().is_err());

        let sent = recorder.sent_headers();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].length().unwrap(), Some(12));
        assert!(recorder.op_closed());
    }

    #[test]
    fn test_srm_state() {
        let mut op = MemoryOperation::new(HeaderSet::new()).with_srm_capable(true);
        assert!(op.local_srm_capable());
        assert_eq!(op.local_srm_status(), SrmStatus::Disabled);
        op.set_local_srm_status(SrmStatus::Enabled);
        assert_eq!(op.local_srm_status(), SrmStatus::Enabled);
    }
}
