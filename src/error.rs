//! Error taxonomy
//!
//! Only failures that the caller may act on are errors. Expected workflow
//! results (no armed track, no playing clip, no free slot) live in
//! [`crate::workflow::DuplicationOutcome`] instead.

use thiserror::Error;

use crate::ports::PortRole;
use crate::registry::TriggerKey;

/// Errors raised by port resolution, the transport session and dispatch
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Configured prefix matched no available port
    #[error("no {role} port matching '{prefix}'")]
    PortNotFound { role: PortRole, prefix: String },

    /// A port was resolved but could not be opened
    #[error("failed to open {role} port '{name}': {reason}")]
    PortOpen {
        role: PortRole,
        name: String,
        reason: String,
    },

    /// The MIDI backend itself failed (client creation, enumeration)
    #[error("MIDI backend error: {0}")]
    Backend(String),

    /// A registered handler returned an error
    #[error("callback for {key} failed: {source}")]
    CallbackFailure {
        key: TriggerKey,
        #[source]
        source: anyhow::Error,
    },
}

/// Failures talking to the remote-control endpoint
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Socket-level failure (bind, send, refused)
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote endpoint did not answer in time
    #[error("no reply to '{address}' within {timeout_ms}ms")]
    Timeout { address: String, timeout_ms: u64 },

    /// The remote endpoint answered with something unexpected
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Whether this failure means the DAW is unreachable
    pub fn is_connection(&self) -> bool {
        matches!(self, RemoteError::Connection(_) | RemoteError::Timeout { .. })
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        RemoteError::Connection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_classification() {
        assert!(RemoteError::Connection("refused".into()).is_connection());
        assert!(RemoteError::Timeout {
            address: "/live/song/get/num_tracks".into(),
            timeout_ms: 500,
        }
        .is_connection());
        assert!(!RemoteError::Protocol("bad reply".into()).is_connection());
    }

    #[test]
    fn test_port_not_found_message() {
        let err = MirrorError::PortNotFound {
            role: PortRole::PhysicalIn,
            prefix: "Nonexistent".into(),
        };
        assert_eq!(err.to_string(), "no physical-in port matching 'Nonexistent'");
    }
}
