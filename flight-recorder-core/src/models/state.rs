use std::fmt;

use serde::{Deserialize, Serialize};

/// Recording lifecycle state.
///
/// State transitions:
/// ```text
/// new → active ⇄ stopped
///  └──────┴────────┴──→ closed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    New,
    Active,
    Stopped,
    Closed,
}

impl RecordingState {
    pub fn is_new(self) -> bool {
        matches!(self, Self::New)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether the remote side holds data for this recording.
    pub fn has_remote_data(self) -> bool {
        matches!(self, Self::Active | Self::Stopped)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "NEW",
            Self::Active => "RECORDING",
            Self::Stopped => "STOPPED",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Remote session identifier. `-1` means "not yet assigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(i64);

impl RecordingId {
    pub const UNASSIGNED: RecordingId = RecordingId(-1);

    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn is_assigned(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
