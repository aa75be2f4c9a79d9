//! Sequential reader over a remote recording stream.

use std::io::{self, Read};
use std::sync::Arc;

use flight_recorder_core::{ManagementTransport, MgmtValue, ObjectName, ProtocolFault, RecorderError};

const READ_OPERATION: &str = "readStream";
const CLOSE_OPERATION: &str = "closeStream";

/// Byte stream over recorded data held by the target.
///
/// Each refill issues one remote read returning up to the block size chosen
/// when the stream was opened. The remote handle is closed once, either
/// explicitly, at end of data, or on drop.
pub struct RemoteRecordingStream<T: ManagementTransport> {
    transport: Arc<T>,
    object: ObjectName,
    handle: i64,
    chunk: Vec<u8>,
    offset: usize,
    exhausted: bool,
    closed: bool,
}

impl<T: ManagementTransport> RemoteRecordingStream<T> {
    pub(crate) fn new(transport: Arc<T>, object: ObjectName, handle: i64) -> Self {
        Self {
            transport,
            object,
            handle,
            chunk: Vec::new(),
            offset: 0,
            exhausted: false,
            closed: false,
        }
    }

    /// Remote stream handle.
    pub fn handle(&self) -> i64 {
        self.handle
    }

    /// Release the remote stream. Later calls are no-ops.
    pub fn close(&mut self) -> Result<(), RecorderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.exhausted = true;
        log::debug!("closing remote stream {}", self.handle);
        self.transport
            .invoke(&self.object, CLOSE_OPERATION, &[MgmtValue::Long(self.handle)])
            .map(|_| ())
            .map_err(|e| RecorderError::from_remote(CLOSE_OPERATION, e))
    }

    /// Pull the next chunk. Returns false once the remote side has no more data.
    fn refill(&mut self) -> Result<bool, RecorderError> {
        let reply = self
            .transport
            .invoke(&self.object, READ_OPERATION, &[MgmtValue::Long(self.handle)])
            .map_err(|e| RecorderError::from_remote(READ_OPERATION, e))?;
        match reply {
            MgmtValue::Bytes(bytes) if !bytes.is_empty() => {
                self.chunk = bytes;
                self.offset = 0;
                Ok(true)
            }
            MgmtValue::Bytes(_) | MgmtValue::Void => Ok(false),
            other => Err(RecorderError::internal(
                READ_OPERATION,
                ProtocolFault::UnexpectedReply(format!(
                    "expected byte[], got {}",
                    other.kind()
                )),
            )),
        }
    }
}

impl<T: ManagementTransport> Read for RemoteRecordingStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.offset >= self.chunk.len() {
            if self.exhausted {
                return Ok(0);
            }
            let more = self.refill().map_err(io::Error::other)?;
            if !more {
                self.close().map_err(io::Error::other)?;
                return Ok(0);
            }
        }
        let available = &self.chunk[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

impl<T: ManagementTransport> Drop for RemoteRecordingStream<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close remote stream {}: {}", self.handle, e);
        }
    }
}
