//! Structured flight recorder management object.
//!
//! One remote operation per capability; supports the full feature set.

use std::sync::Arc;

use flight_recorder_core::{
    ConfigurationSpec, KeyValueEncoder, ManagementTransport, MgmtValue, ObjectName, OptionSet, ProtocolFault,
    RecorderError, RecordingId, SessionBackend, StreamRequest,
};

use crate::stream::RemoteRecordingStream;

/// Registered name of the structured recorder object.
pub const FLIGHT_RECORDER_OBJECT: &str = "jdk.management.jfr:type=FlightRecorder";

/// Backend for targets exposing the structured recorder object.
pub struct ModernBackend<T: ManagementTransport> {
    transport: Arc<T>,
    object: ObjectName,
}

impl<T: ManagementTransport> ModernBackend<T> {
    pub(crate) fn new(transport: Arc<T>, object: ObjectName) -> Self {
        Self { transport, object }
    }

    pub fn object_name(&self) -> &ObjectName {
        &self.object
    }

    fn call(&self, operation: &str, args: &[MgmtValue]) -> Result<MgmtValue, RecorderError> {
        log::debug!("invoking {} on {}", operation, self.object);
        self.transport
            .invoke(&self.object, operation, args)
            .map_err(|e| RecorderError::from_remote(operation, e))
    }

    fn call_for_id(&self, operation: &str, args: &[MgmtValue]) -> Result<RecordingId, RecorderError> {
        let reply = self.call(operation, args)?;
        reply.as_long().map(RecordingId::new).ok_or_else(|| {
            RecorderError::internal(
                operation,
                ProtocolFault::UnexpectedReply(format!("expected long, got {}", reply.kind())),
            )
        })
    }

    fn apply_configuration(&self, id: RecordingId, configuration: &ConfigurationSpec) -> Result<(), RecorderError> {
        let payload = match configuration {
            ConfigurationSpec::Predefined(name) => MgmtValue::Text(name.clone()),
            ConfigurationSpec::FileContent(content) => MgmtValue::Text(content.clone()),
            ConfigurationSpec::EventSettings(settings) => MgmtValue::Table(KeyValueEncoder::encode(settings)?),
        };
        self.call(
            configuration.setter_operation(),
            &[MgmtValue::Long(id.get()), payload],
        )?;
        Ok(())
    }

    fn apply_options(&self, id: RecordingId, options: &OptionSet) -> Result<(), RecorderError> {
        if options.is_empty() {
            return Ok(());
        }
        let table = KeyValueEncoder::encode(options.as_map())?;
        self.call(
            "setRecordingOptions",
            &[MgmtValue::Long(id.get()), MgmtValue::Table(table)],
        )?;
        Ok(())
    }
}

impl<T: ManagementTransport> SessionBackend for ModernBackend<T> {
    type Stream = RemoteRecordingStream<T>;

    fn start_recording(
        &self,
        options: &OptionSet,
        configuration: &ConfigurationSpec,
    ) -> Result<RecordingId, RecorderError> {
        let id = self.call_for_id("newRecording", &[])?;

        let started = self
            .apply_configuration(id, configuration)
            .and_then(|()| self.apply_options(id, options))
            .and_then(|()| self.call("startRecording", &[MgmtValue::Long(id.get())]).map(|_| ()));

        if let Err(e) = started {
            // Don't leave a half-configured session behind on the target.
            if let Err(close_err) = self.close_recording(id) {
                log::warn!("failed to discard recording {} after start failure: {}", id, close_err);
            }
            return Err(e);
        }
        Ok(id)
    }

    fn stop_recording(&self, id: RecordingId) -> Result<(), RecorderError> {
        self.call("stopRecording", &[MgmtValue::Long(id.get())])?;
        Ok(())
    }

    fn dump_recording(&self, id: RecordingId, path: &str) -> Result<(), RecorderError> {
        self.call(
            "copyTo",
            &[MgmtValue::Long(id.get()), MgmtValue::Text(path.to_string())],
        )?;
        Ok(())
    }

    fn clone_recording(&self, id: RecordingId, stop: bool) -> Result<RecordingId, RecorderError> {
        self.call_for_id("cloneRecording", &[MgmtValue::Long(id.get()), MgmtValue::Bool(stop)])
    }

    fn open_stream(&self, id: RecordingId, request: &StreamRequest) -> Result<Self::Stream, RecorderError> {
        let table = KeyValueEncoder::encode(&request.to_options())?;
        let handle = self.call_for_id("openStream", &[MgmtValue::Long(id.get()), MgmtValue::Table(table)])?;
        Ok(RemoteRecordingStream::new(
            Arc::clone(&self.transport),
            self.object.clone(),
            handle.get(),
        ))
    }

    fn close_recording(&self, id: RecordingId) -> Result<(), RecorderError> {
        self.call("closeRecording", &[MgmtValue::Long(id.get())])?;
        Ok(())
    }
}
