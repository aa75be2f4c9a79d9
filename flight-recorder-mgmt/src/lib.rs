//! # flight-recorder-mgmt
//!
//! Management-transport backends for flight-recorder-core.
//!
//! Provides:
//! - `Connection`: Probes the target and binds to one protocol generation
//! - `ModernBackend`: Structured recorder object, full feature set
//! - `LegacyBackend`: Diagnostic text commands (start, stop, dump only)
//! - `RemoteRecordingStream`: `std::io::Read` over a remote stream handle
//!
//! ## Usage
//! ```ignore
//! use flight_recorder_core::{ConfigurationSpec, OptionSet};
//! use flight_recorder_mgmt::Connection;
//!
//! let connection = Connection::connect(transport)?;
//! let options = OptionSet::builder().name("startup").max_age("10 m").build()?;
//! let recording = connection.new_recording(options, ConfigurationSpec::profile());
//! recording.start()?;
//! recording.stop()?;
//! recording.dump("/var/tmp/startup.jfr")?;
//! ```

pub mod connection;
pub mod legacy;
pub mod modern;
pub mod stream;

#[cfg(test)]
mod fake_transport;

pub use connection::{Connection, FlightRecorderBackend, ProtocolGeneration};
pub use legacy::{LegacyBackend, DIAGNOSTIC_COMMAND_OBJECT};
pub use modern::{ModernBackend, FLIGHT_RECORDER_OBJECT};
pub use stream::RemoteRecordingStream;
