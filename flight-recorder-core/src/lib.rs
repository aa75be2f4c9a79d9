//! # flight-recorder-core
//!
//! Transport-agnostic core of the flight recorder remote-control client.
//!
//! Provides recording options, event configurations, the key/value table
//! encoding used on the wire, and the recording lifecycle state machine.
//! Protocol generations implement the `SessionBackend` trait and plug into
//! the generic `Recording`.
//!
//! ## Architecture
//!
//! ```text
//! flight-recorder-core (this crate)
//! ├── traits/     ← SessionBackend, ManagementTransport
//! ├── models/     ← RecorderError, RecordingState, OptionSet, ConfigurationSpec, ClientConfiguration
//! ├── encoding/   ← KeyValueEncoder, TabularData
//! └── session/    ← Recording (lifecycle state machine)
//! ```

pub mod encoding;
pub mod models;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use encoding::tabular::{KeyValueEncoder, TabularData};
pub use models::config::ClientConfiguration;
pub use models::configuration::{ConfigurationKind, ConfigurationSpec};
pub use models::error::{ProtocolFault, RecorderError};
pub use models::options::{OptionSet, OptionSetBuilder, RecordingOption};
pub use models::state::{RecordingId, RecordingState};
pub use models::stream_request::{StreamRequest, DEFAULT_BLOCK_SIZE};
pub use session::recording::Recording;
pub use traits::session_backend::SessionBackend;
pub use traits::transport::{ManagementTransport, MgmtValue, ObjectName, TransportError};
