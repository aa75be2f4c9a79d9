use std::io::Read;

use crate::models::configuration::ConfigurationSpec;
use crate::models::error::RecorderError;
use crate::models::options::OptionSet;
use crate::models::state::RecordingId;
use crate::models::stream_request::StreamRequest;

/// Remote recording capability as seen by [`Recording`](crate::Recording).
///
/// Implemented once per protocol generation. The variant is picked at
/// connect time; nothing above this trait branches on it.
pub trait SessionBackend: Send + Sync {
    /// Byte stream over captured data returned by [`open_stream`](Self::open_stream).
    type Stream: Read + Send;

    /// Create a remote session, apply configuration and options, and start it.
    fn start_recording(
        &self,
        options: &OptionSet,
        configuration: &ConfigurationSpec,
    ) -> Result<RecordingId, RecorderError>;

    fn stop_recording(&self, id: RecordingId) -> Result<(), RecorderError>;

    /// Write recorded data to `path` on the target host.
    fn dump_recording(&self, id: RecordingId, path: &str) -> Result<(), RecorderError>;

    /// Copy a session remotely. With `stop`, the copy is stopped immediately.
    fn clone_recording(&self, id: RecordingId, stop: bool) -> Result<RecordingId, RecorderError>;

    fn open_stream(&self, id: RecordingId, request: &StreamRequest) -> Result<Self::Stream, RecorderError>;

    /// Release the remote session.
    fn close_recording(&self, id: RecordingId) -> Result<(), RecorderError>;
}
