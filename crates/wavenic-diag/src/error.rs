//! Error types for diagnostic command execution.

use thiserror::Error;

/// Result type alias for diagnostic operations.
pub type Result<T> = std::result::Result<T, DiagError>;

/// Errors a diagnostic command can produce.
///
/// Exactly one of these reaches the caller per failed call; partially built
/// responses are never handed out alongside an error.
#[derive(Debug, Error)]
pub enum DiagError {
    /// Malformed request: truncated buffer, bad length, unknown field value.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was malformed
        reason: String,
    },

    /// A response buffer could not be allocated.
    #[error("response allocation of {size} bytes failed")]
    OutOfMemory {
        /// Requested allocation size
        size: usize,
    },

    /// Exclusive hardware access or the device liveness reference is
    /// unavailable right now.
    #[error("device busy: {reason}")]
    Busy {
        /// Why the device could not be arbitrated
        reason: String,
    },

    /// The opcode does not map to any handler.
    #[error("opcode {opcode:#x} is not supported")]
    NotSupported {
        /// The rejected opcode
        opcode: u32,
    },

    /// The transport layer failed to carry a firmware command.
    #[error("transport failure: {reason}")]
    Transport {
        /// Opaque transport-layer reason
        reason: String,
    },
}

impl DiagError {
    /// Create an invalid-argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a busy error
    pub fn busy(reason: impl Into<String>) -> Self {
        Self::Busy {
            reason: reason.into(),
        }
    }

    /// Create a transport-failure error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}
