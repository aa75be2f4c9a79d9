use thiserror::Error;

use super::state::RecordingState;
use crate::traits::transport::TransportError;

/// Errors surfaced by every public flight-recorder operation.
///
/// None of these are retried internally. Retry policy belongs to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    /// Communication with the target failed (connection dropped, network down).
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote recorder object does not exist on the target.
    #[error("flight recorder not found: {0}")]
    NotFound(String),

    /// The legacy recorder exists but the target has not unlocked it.
    #[error("flight recorder feature is locked: {0}")]
    FeatureLocked(String),

    /// The remote call went through but the reply broke the expected contract.
    #[error("internal protocol error: {context}")]
    InternalProtocol {
        context: String,
        #[source]
        cause: ProtocolFault,
    },

    #[error("recording state {actual} not in [{}]", format_states(.expected))]
    InvalidState {
        actual: RecordingState,
        expected: Vec<RecordingState>,
    },

    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("configuration not supported: {0}")]
    UnsupportedConfiguration(String),
}

/// Underlying cause carried by [`RecorderError::InternalProtocol`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolFault {
    #[error("remote side raised: {0}")]
    Remote(TransportError),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("client defect: {0}")]
    Defect(String),
}

impl RecorderError {
    pub fn internal(context: impl Into<String>, cause: ProtocolFault) -> Self {
        Self::InternalProtocol {
            context: context.into(),
            cause,
        }
    }

    pub fn invalid_state(actual: RecordingState, expected: &[RecordingState]) -> Self {
        Self::InvalidState {
            actual,
            expected: expected.to_vec(),
        }
    }

    /// Classify a failed remote call made after connect.
    ///
    /// Communication failures stay transport errors; everything else means the
    /// remote side and this client disagree about the contract.
    pub fn from_remote(context: impl Into<String>, error: TransportError) -> Self {
        match error {
            TransportError::Communication(msg) => Self::Transport(msg),
            other => Self::internal(context, ProtocolFault::Remote(other)),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

fn format_states(states: &[RecordingState]) -> String {
    states
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
