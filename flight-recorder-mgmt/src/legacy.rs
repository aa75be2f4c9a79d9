//! Text-command diagnostic object found on older targets.
//!
//! Supports start, stop and dump only. Recording options travel as
//! `key=value` words and the id comes back inside a human-readable reply.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use flight_recorder_core::{
    ConfigurationSpec, ManagementTransport, MgmtValue, ObjectName, OptionSet, ProtocolFault, RecorderError,
    RecordingId, RecordingOption, SessionBackend, StreamRequest,
};

use crate::stream::RemoteRecordingStream;

/// Registered name of the diagnostic command object.
pub const DIAGNOSTIC_COMMAND_OBJECT: &str = "com.sun.management:type=DiagnosticCommand";

const UNLOCKED_MARKER: &str = "unlocked";

static START_REPLY: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)Started recording (.+?)\. .*"));

/// Backend for targets exposing only the diagnostic command object.
pub struct LegacyBackend<T: ManagementTransport> {
    transport: Arc<T>,
    object: ObjectName,
}

impl<T: ManagementTransport> LegacyBackend<T> {
    pub(crate) fn new(transport: Arc<T>, object: ObjectName) -> Self {
        Self { transport, object }
    }

    pub fn object_name(&self) -> &ObjectName {
        &self.object
    }

    /// Ask the target whether the recorder feature is unlocked.
    ///
    /// A reply that is not text is rejected as a protocol error rather than
    /// accepted as unlocked.
    pub(crate) fn check_unlocked(&self) -> Result<(), RecorderError> {
        let reply = self.call("vmCheckCommercialFeatures", &[])?;
        let message = reply.as_text().ok_or_else(|| {
            RecorderError::internal(
                "vmCheckCommercialFeatures",
                ProtocolFault::UnexpectedReply(format!("expected text, got {}", reply.kind())),
            )
        })?;
        if message.contains(UNLOCKED_MARKER) {
            Ok(())
        } else {
            log::warn!("flight recorder is locked on target: {}", message.trim());
            Err(RecorderError::FeatureLocked(
                "restart the target with -XX:+UnlockCommercialFeatures".into(),
            ))
        }
    }

    fn call(&self, command: &str, args: &[MgmtValue]) -> Result<MgmtValue, RecorderError> {
        log::debug!("invoking {} on {}", command, self.object);
        self.transport
            .invoke(&self.object, command, args)
            .map_err(|e| RecorderError::from_remote(command, e))
    }

    fn command(&self, command: &str, words: Vec<String>) -> Result<MgmtValue, RecorderError> {
        self.call(command, &[MgmtValue::TextArray(words)])
    }
}

/// `settings=<name>` followed by every option except `disk`, which older
/// targets reject.
fn start_arguments(options: &OptionSet, configuration: &ConfigurationSpec) -> Result<Vec<String>, RecorderError> {
    let ConfigurationSpec::Predefined(name) = configuration else {
        return Err(RecorderError::UnsupportedConfiguration(format!(
            "{} configurations need the structured recorder; only predefined profiles work here",
            configuration.kind()
        )));
    };

    let disk = RecordingOption::Disk.key();
    let mut words = vec![format!("settings={name}")];
    words.extend(
        options
            .as_map()
            .iter()
            .filter(|(key, _)| key.as_str() != disk)
            .map(|(key, value)| format!("{key}={value}")),
    );
    Ok(words)
}

fn parse_start_reply(reply: &str) -> Result<RecordingId, RecorderError> {
    let pattern = START_REPLY
        .as_ref()
        .map_err(|e| RecorderError::internal("jfrStart", ProtocolFault::Defect(e.to_string())))?;
    pattern
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse::<i64>().ok())
        .map(RecordingId::new)
        .ok_or_else(|| {
            RecorderError::internal(
                "jfrStart",
                ProtocolFault::UnexpectedReply(format!("no recording id in {reply:?}")),
            )
        })
}

fn unsupported(operation: &str) -> RecorderError {
    RecorderError::Unsupported(format!("{operation} is not available through the diagnostic command object"))
}

impl<T: ManagementTransport> SessionBackend for LegacyBackend<T> {
    type Stream = RemoteRecordingStream<T>;

    fn start_recording(
        &self,
        options: &OptionSet,
        configuration: &ConfigurationSpec,
    ) -> Result<RecordingId, RecorderError> {
        let words = start_arguments(options, configuration)?;
        let reply = self.command("jfrStart", words)?;
        let text = reply.as_text().ok_or_else(|| {
            RecorderError::internal(
                "jfrStart",
                ProtocolFault::UnexpectedReply(format!("expected text, got {}", reply.kind())),
            )
        })?;
        parse_start_reply(text)
    }

    fn stop_recording(&self, id: RecordingId) -> Result<(), RecorderError> {
        self.command("jfrStop", vec![format!("name={id}")])?;
        Ok(())
    }

    fn dump_recording(&self, id: RecordingId, path: &str) -> Result<(), RecorderError> {
        self.command(
            "jfrDump",
            vec![format!("filename={path}"), format!("recording={id}"), "compress=true".to_string()],
        )?;
        Ok(())
    }

    fn clone_recording(&self, _id: RecordingId, _stop: bool) -> Result<RecordingId, RecorderError> {
        Err(unsupported("clone"))
    }

    fn open_stream(&self, _id: RecordingId, _request: &StreamRequest) -> Result<Self::Stream, RecorderError> {
        Err(unsupported("streaming"))
    }

    fn close_recording(&self, _id: RecordingId) -> Result<(), RecorderError> {
        Err(unsupported("close"))
    }
}
