use std::fmt;
use std::sync::Arc;

use flight_recorder_core::{
    ClientConfiguration, ConfigurationSpec, ManagementTransport, ObjectName, OptionSet, ProtocolFault,
    RecorderError, Recording, RecordingId, SessionBackend, StreamRequest, TransportError,
};

use crate::legacy::{LegacyBackend, DIAGNOSTIC_COMMAND_OBJECT};
use crate::modern::{ModernBackend, FLIGHT_RECORDER_OBJECT};
use crate::stream::RemoteRecordingStream;

/// Which protocol generation a connection is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolGeneration {
    Modern,
    Legacy,
}

impl fmt::Display for ProtocolGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modern => f.write_str("modern"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

/// The backend picked at connect time.
pub enum FlightRecorderBackend<T: ManagementTransport> {
    Modern(ModernBackend<T>),
    Legacy(LegacyBackend<T>),
}

impl<T: ManagementTransport> FlightRecorderBackend<T> {
    pub fn generation(&self) -> ProtocolGeneration {
        match self {
            Self::Modern(_) => ProtocolGeneration::Modern,
            Self::Legacy(_) => ProtocolGeneration::Legacy,
        }
    }
}

impl<T: ManagementTransport> SessionBackend for FlightRecorderBackend<T> {
    type Stream = RemoteRecordingStream<T>;

    fn start_recording(
        &self,
        options: &OptionSet,
        configuration: &ConfigurationSpec,
    ) -> Result<RecordingId, RecorderError> {
        match self {
            Self::Modern(b) => b.start_recording(options, configuration),
            Self::Legacy(b) => b.start_recording(options, configuration),
        }
    }

    fn stop_recording(&self, id: RecordingId) -> Result<(), RecorderError> {
        match self {
            Self::Modern(b) => b.stop_recording(id),
            Self::Legacy(b) => b.stop_recording(id),
        }
    }

    fn dump_recording(&self, id: RecordingId, path: &str) -> Result<(), RecorderError> {
        match self {
            Self::Modern(b) => b.dump_recording(id, path),
            Self::Legacy(b) => b.dump_recording(id, path),
        }
    }

    fn clone_recording(&self, id: RecordingId, stop: bool) -> Result<RecordingId, RecorderError> {
        match self {
            Self::Modern(b) => b.clone_recording(id, stop),
            Self::Legacy(b) => b.clone_recording(id, stop),
        }
    }

    fn open_stream(&self, id: RecordingId, request: &StreamRequest) -> Result<Self::Stream, RecorderError> {
        match self {
            Self::Modern(b) => b.open_stream(id, request),
            Self::Legacy(b) => b.open_stream(id, request),
        }
    }

    fn close_recording(&self, id: RecordingId) -> Result<(), RecorderError> {
        match self {
            Self::Modern(b) => b.close_recording(id),
            Self::Legacy(b) => b.close_recording(id),
        }
    }
}

/// A connection to the flight recorder of one target.
///
/// Holds no session state of its own. Any number of recordings may be
/// created from one connection and share its backend.
pub struct Connection<T: ManagementTransport> {
    backend: Arc<FlightRecorderBackend<T>>,
    config: ClientConfiguration,
}

impl<T: ManagementTransport> Connection<T> {
    /// Connect with [`ClientConfiguration::default`].
    pub fn connect(transport: Arc<T>) -> Result<Self, RecorderError> {
        Self::connect_with(transport, ClientConfiguration::default())
    }

    /// Probe for the structured recorder object, falling back to the
    /// diagnostic command object when the former is absent.
    pub fn connect_with(transport: Arc<T>, config: ClientConfiguration) -> Result<Self, RecorderError> {
        config.validate()?;

        let backend = match probe(transport.as_ref(), FLIGHT_RECORDER_OBJECT)? {
            Some(object) => FlightRecorderBackend::Modern(ModernBackend::new(transport, object)),
            None if !config.allow_legacy_fallback => {
                return Err(RecorderError::NotFound(FLIGHT_RECORDER_OBJECT.to_string()));
            }
            None => {
                log::warn!(
                    "{} not registered, falling back to {}",
                    FLIGHT_RECORDER_OBJECT,
                    DIAGNOSTIC_COMMAND_OBJECT
                );
                let object = probe(transport.as_ref(), DIAGNOSTIC_COMMAND_OBJECT)?.ok_or_else(|| {
                    RecorderError::NotFound(format!(
                        "neither {FLIGHT_RECORDER_OBJECT} nor {DIAGNOSTIC_COMMAND_OBJECT} is registered"
                    ))
                })?;
                let legacy = LegacyBackend::new(transport, object);
                legacy.check_unlocked()?;
                FlightRecorderBackend::Legacy(legacy)
            }
        };

        log::info!("connected to flight recorder ({} protocol)", backend.generation());
        Ok(Self {
            backend: Arc::new(backend),
            config,
        })
    }

    /// A new recording in the `New` state. Nothing is sent to the target
    /// until [`Recording::start`].
    pub fn new_recording(
        &self,
        options: OptionSet,
        configuration: ConfigurationSpec,
    ) -> Recording<FlightRecorderBackend<T>> {
        Recording::new(Arc::clone(&self.backend), options, configuration)
            .with_default_block_size(self.config.default_block_size)
    }

    pub fn protocol_generation(&self) -> ProtocolGeneration {
        self.backend.generation()
    }

    pub fn backend(&self) -> &Arc<FlightRecorderBackend<T>> {
        &self.backend
    }

    pub fn config(&self) -> &ClientConfiguration {
        &self.config
    }
}

/// `Ok(None)` when the object is not registered on the target.
fn probe<T: ManagementTransport>(transport: &T, raw: &str) -> Result<Option<ObjectName>, RecorderError> {
    let name = ObjectName::parse(raw).map_err(|e| RecorderError::internal(raw, ProtocolFault::Defect(e)))?;
    match transport.resolve(&name) {
        Ok(resolved) => Ok(Some(resolved)),
        Err(TransportError::NotFound(_)) => Ok(None),
        Err(TransportError::Communication(msg)) => Err(RecorderError::Transport(msg)),
        Err(e @ TransportError::Invocation(_)) => Err(RecorderError::internal(raw, ProtocolFault::Remote(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread;

    use flight_recorder_core::{MgmtValue, RecordingState};

    use crate::fake_transport::FakeTransport;

    const UNLOCKED: &str = "Commercial Features are now unlocked.";

    fn modern() -> Arc<FakeTransport> {
        Arc::new(FakeTransport::with_objects(&[FLIGHT_RECORDER_OBJECT, DIAGNOSTIC_COMMAND_OBJECT]))
    }

    fn legacy_only() -> Arc<FakeTransport> {
        Arc::new(FakeTransport::with_objects(&[DIAGNOSTIC_COMMAND_OBJECT]))
    }

    #[test]
    fn prefers_structured_object() {
        let transport = modern();
        let connection = Connection::connect(Arc::clone(&transport)).unwrap();

        assert_eq!(connection.protocol_generation(), ProtocolGeneration::Modern);
        assert_eq!(transport.resolved(), vec![FLIGHT_RECORDER_OBJECT]);
        assert!(transport.invocations().is_empty());
    }

    #[test]
    fn falls_back_to_diagnostic_commands() {
        let transport = legacy_only();
        transport.reply("vmCheckCommercialFeatures", MgmtValue::Text(UNLOCKED.into()));

        let connection = Connection::connect(Arc::clone(&transport)).unwrap();

        assert_eq!(connection.protocol_generation(), ProtocolGeneration::Legacy);
        assert_eq!(
            transport.resolved(),
            vec![FLIGHT_RECORDER_OBJECT, DIAGNOSTIC_COMMAND_OBJECT]
        );
        assert_eq!(transport.operations(), vec!["vmCheckCommercialFeatures"]);
    }

    #[test]
    fn locked_legacy_target_is_rejected() {
        let transport = legacy_only();
        transport.reply(
            "vmCheckCommercialFeatures",
            MgmtValue::Text("Commercial Features are locked.".into()),
        );

        let err = Connection::connect(transport).err().unwrap();
        assert!(matches!(err, RecorderError::FeatureLocked(_)));
    }

    #[test]
    fn no_recorder_at_all() {
        let transport = Arc::new(FakeTransport::with_objects(&[]));
        let err = Connection::connect(transport).err().unwrap();
        assert!(matches!(err, RecorderError::NotFound(_)));
    }

    #[test]
    fn fallback_can_be_disabled() {
        let transport = legacy_only();
        let config = ClientConfiguration {
            allow_legacy_fallback: false,
            ..Default::default()
        };

        let err = Connection::connect_with(Arc::clone(&transport), config).err().unwrap();
        assert_eq!(err, RecorderError::NotFound(FLIGHT_RECORDER_OBJECT.to_string()));
        assert_eq!(transport.resolved(), vec![FLIGHT_RECORDER_OBJECT]);
    }

    #[test]
    fn invalid_configuration_is_rejected_before_probing() {
        let transport = modern();
        let config = ClientConfiguration {
            default_block_size: 0,
            ..Default::default()
        };

        let err = Connection::connect_with(Arc::clone(&transport), config).err().unwrap();
        assert!(matches!(err, RecorderError::Validation(_)));
        assert!(transport.resolved().is_empty());
    }

    #[test]
    fn probe_failures_are_not_fallback_triggers() {
        let transport = modern();
        transport.fail_resolve(TransportError::Communication("connection refused".into()));
        let err = Connection::connect(Arc::clone(&transport)).err().unwrap();
        assert_eq!(err, RecorderError::Transport("connection refused".into()));
        assert_eq!(transport.resolved().len(), 1);

        let transport = modern();
        transport.fail_resolve(TransportError::Invocation("security manager said no".into()));
        let err = Connection::connect(transport).err().unwrap();
        assert!(matches!(
            err,
            RecorderError::InternalProtocol {
                cause: ProtocolFault::Remote(_),
                ..
            }
        ));
    }

    #[test]
    fn malformed_object_name_is_a_defect() {
        let transport = modern();
        let err = probe(transport.as_ref(), "no-domain-here").unwrap_err();
        assert!(matches!(
            err,
            RecorderError::InternalProtocol {
                cause: ProtocolFault::Defect(_),
                ..
            }
        ));
        assert!(transport.resolved().is_empty());
    }

    #[test]
    fn modern_recording_end_to_end() {
        let transport = modern();
        transport.reply("newRecording", MgmtValue::Long(11));
        transport.reply("openStream", MgmtValue::Long(900));
        transport.reply("readStream", MgmtValue::Bytes(vec![1, 2, 3]));

        let connection = Connection::connect(Arc::clone(&transport)).unwrap();
        let options = OptionSet::builder().name("e2e").max_age("5 m").build().unwrap();
        let recording = connection.new_recording(options, ConfigurationSpec::default_profile());
        assert_eq!(recording.state(), RecordingState::New);

        assert_eq!(recording.start().unwrap(), RecordingId::new(11));
        recording.stop().unwrap();
        recording.dump("/srv/dumps/e2e.jfr").unwrap();

        let mut data = Vec::new();
        let mut stream = recording.open_stream_default(None, None).unwrap();
        stream.read_to_end(&mut data).unwrap();
        drop(stream);
        assert_eq!(data, vec![1, 2, 3]);

        // A stopped recording is closed locally only.
        recording.close();
        assert_eq!(recording.state(), RecordingState::Closed);

        assert_eq!(
            transport.operations(),
            vec![
                "newRecording",
                "setPredefinedConfiguration",
                "setRecordingOptions",
                "startRecording",
                "stopRecording",
                "copyTo",
                "openStream",
                "readStream",
                "readStream",
                "closeStream",
            ]
        );
    }

    #[test]
    fn configured_block_size_reaches_the_wire() {
        let transport = modern();
        transport.reply("newRecording", MgmtValue::Long(1));
        transport.reply("openStream", MgmtValue::Long(31));
        let config = ClientConfiguration {
            default_block_size: 4096,
            ..Default::default()
        };
        let connection = Connection::connect_with(Arc::clone(&transport), config).unwrap();
        let recording = connection.new_recording(OptionSet::default(), ConfigurationSpec::profile());

        recording.start().unwrap();
        recording.stop().unwrap();
        drop(recording.open_stream_default(None, None).unwrap());

        let open = transport
            .invocations()
            .into_iter()
            .find(|c| c.operation == "openStream")
            .unwrap();
        let MgmtValue::Table(table) = &open.args[1] else {
            panic!("expected table, got {:?}", open.args[1]);
        };
        let row = table.rows().next().unwrap();
        let row_type = table.tabular_type().row_type();
        assert_eq!(row.get(row_type, "key"), Some("blockSize"));
        assert_eq!(row.get(row_type, "value"), Some("4096"));
    }

    #[test]
    fn legacy_recording_end_to_end() {
        let transport = legacy_only();
        transport.reply("vmCheckCommercialFeatures", MgmtValue::Text(UNLOCKED.into()));
        transport.reply(
            "jfrStart",
            MgmtValue::Text("Started recording 42. Use jcmd 1234 JFR.dump name=42 to copy recording data to file.".into()),
        );

        let connection = Connection::connect(Arc::clone(&transport)).unwrap();
        let recording = connection.new_recording(OptionSet::default(), ConfigurationSpec::profile());

        assert_eq!(recording.start().unwrap(), RecordingId::new(42));
        recording.dump("/tmp/legacy.jfr").unwrap();
        assert!(matches!(recording.clone_recording(false), Err(RecorderError::Unsupported(_))));
        recording.stop().unwrap();
        assert!(matches!(
            recording.open_stream_default(None, None),
            Err(RecorderError::Unsupported(_))
        ));

        recording.close();
        assert_eq!(recording.state(), RecordingState::Closed);
        assert_eq!(
            transport.operations(),
            vec!["vmCheckCommercialFeatures", "jfrStart", "jfrDump", "jfrStop"]
        );
    }

    #[test]
    fn legacy_rejects_custom_configuration_without_remote_call() {
        let transport = legacy_only();
        transport.reply("vmCheckCommercialFeatures", MgmtValue::Text(UNLOCKED.into()));
        let connection = Connection::connect(Arc::clone(&transport)).unwrap();

        let settings = ConfigurationSpec::event_settings([("jdk.GC#enabled", "true")]).unwrap();
        let recording = connection.new_recording(OptionSet::default(), settings);

        assert!(matches!(
            recording.start(),
            Err(RecorderError::UnsupportedConfiguration(_))
        ));
        assert_eq!(recording.state(), RecordingState::New);
        assert_eq!(transport.operations(), vec!["vmCheckCommercialFeatures"]);
    }

    #[test]
    fn recordings_share_one_connection_across_threads() {
        let transport = modern();
        transport.reply("newRecording", MgmtValue::Long(1));
        transport.reply("newRecording", MgmtValue::Long(2));
        let connection = Arc::new(Connection::connect(Arc::clone(&transport)).unwrap());

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let connection = Arc::clone(&connection);
                thread::spawn(move || {
                    let recording = connection.new_recording(OptionSet::default(), ConfigurationSpec::profile());
                    recording.start().unwrap().get()
                })
            })
            .collect();
        let mut ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();

        assert_eq!(ids, vec![1, 2]);
        let closes = transport
            .operations()
            .into_iter()
            .filter(|op| op == "stopRecording" || op == "closeRecording")
            .count();
        assert_eq!(closes, 4);
    }
}
