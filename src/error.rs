//! Error types and handling for the handoff crate

use thiserror::Error;

use crate::disruptor::Sequence;

/// Result type alias for handoff operations
pub type Result<T> = std::result::Result<T, HandoffError>;

/// Main error type for the handoff crate
#[derive(Error, Debug)]
pub enum HandoffError {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Ring buffer has no free slot for a non-blocking claim
    #[error("Ring buffer is full")]
    RingBufferFull,

    /// Blocking queue has no room for a non-blocking put
    #[error("Queue is full")]
    QueueFull,

    /// The ring buffer or queue was halted while a thread was waiting on it
    #[error("Halted while waiting")]
    Halted,

    /// A producer touched a sequence it does not hold a claim for
    #[error("Sequence {sequence} is not claimed by this producer")]
    InvalidSequence {
        /// The offending sequence
        sequence: Sequence,
    },

    /// A producer tried to claim again before publishing its previous claim
    #[error("Claim {low}..={high} has not been published")]
    UnpublishedClaim {
        /// First sequence of the outstanding claim
        low: Sequence,
        /// Last sequence of the outstanding claim
        high: Sequence,
    },

    /// Timeout errors
    #[error("Operation timed out")]
    Timeout,

    /// Measurement and reporting errors
    #[error("Performance monitoring error: {message}")]
    Performance {
        /// Error message describing the performance issue
        message: String,
    },

    /// CPU affinity errors
    #[error("CPU affinity error: {0}")]
    CpuAffinity(#[from] nix::Error),

    /// Generic error for unexpected conditions, such as a worker thread panicking.
    #[error("Unexpected error: {message}")]
    Unexpected {
        /// Error message describing the unexpected condition
        message: String,
    },
}

impl HandoffError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new performance monitoring error
    pub fn performance(message: impl Into<String>) -> Self {
        Self::Performance {
            message: message.into(),
        }
    }

    /// Create a new unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RingBufferFull | Self::QueueFull | Self::Timeout)
    }

    /// Check if this error was caused by a halt/close during teardown
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Halted)
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::HandoffError::config(format!($($arg)*))
    };
}
