//! Unified error handling for the conversation engine.
//!
//! This mirrors the taxonomy in spec §7: every variant maps to exactly one of
//! SerializationError, ProtocolViolation, Expired, FeatureNotSupportedByPeer,
//! TransientTransportFailure or FatalInternal, plus the I/O and
//! external-collaborator failures those categories don't cover. `ConvError`
//! is the single error type used across the crate; `ErrorCode` (below) is a
//! *separate*, non-error control-flow result returned by `Operation::execute`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Unified error type for all conversation-engine operations.
#[derive(Error, Debug)]
pub enum ConvError {
    // -- Serialization errors (spec §7 SerializationError) -----------------
    #[error("unknown schema ({schema_id}, v{schema_version}); frame dropped")]
    UnknownSchema { schema_id: Uuid, schema_version: i32 },

    #[error("malformed frame: {reason}")]
    Malformed { reason: String },

    #[error("expected inner schema {expected} but found {actual}")]
    UnexpectedInnerSchema { expected: Uuid, actual: Uuid },

    #[error("enum tag {tag} out of range for {type_name}")]
    InvalidEnumTag { tag: i32, type_name: &'static str },

    #[error("buffer underrun: needed {needed} bytes, had {available}")]
    BufferUnderrun { needed: usize, available: usize },

    // -- Protocol violations (spec §7 ProtocolViolation) --------------------
    #[error("file chunk out of order for {path}: expected offset {expected}, got {actual}")]
    ChunkOutOfOrder {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("ack for unknown requestId {request_id}")]
    UnknownRequestId { request_id: i64 },

    #[error("protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    // -- Expired (spec §7 Expired) -------------------------------------------
    #[error("descriptor {twincode_outbound_id}/{sequence_id} expired or missing")]
    Expired {
        twincode_outbound_id: Uuid,
        sequence_id: i64,
    },

    // -- Feature gating (spec §7 FeatureNotSupportedByPeer) ------------------
    #[error("feature not supported by peer (requires {major}.{minor})")]
    FeatureNotSupportedByPeer { major: u32, minor: u32 },

    // -- Transport (spec §7 TransientTransportFailure) -----------------------
    #[error("transient transport failure: peer connection not open")]
    TransientTransportFailure,

    #[error("transport send failed: {reason}")]
    TransportSend { reason: String },

    // -- External collaborators (storage/crypto, out of core scope) --------
    #[error("storage error: {0}")]
    Storage(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("I/O error: {source} (path: {path:?})")]
    Io {
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
    },

    // -- Fatal/internal (spec §7 FatalInternal) ------------------------------
    #[error("fatal internal error: {0}")]
    FatalInternal(String),

    #[error("invalid state transition: {from} -> {event} on a connection already {from}")]
    InvalidTransition { from: String, event: String },
}

/// Result alias used throughout the crate.
pub type ConvResult<T> = Result<T, ConvError>;

/// Coarse category, used by the handler to decide whether an error may
/// propagate (only `FatalInternal` may reach an assertion-point channel;
/// everything else is logged and swallowed per spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Serialization,
    ProtocolViolation,
    Expired,
    FeatureNotSupportedByPeer,
    TransientTransportFailure,
    External,
    FatalInternal,
}

impl ConvError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConvError::UnknownSchema { .. }
            | ConvError::Malformed { .. }
            | ConvError::UnexpectedInnerSchema { .. }
            | ConvError::InvalidEnumTag { .. }
            | ConvError::BufferUnderrun { .. } => ErrorCategory::Serialization,

            ConvError::ChunkOutOfOrder { .. }
            | ConvError::UnknownRequestId { .. }
            | ConvError::ProtocolViolation { .. } => ErrorCategory::ProtocolViolation,

            ConvError::Expired { .. } => ErrorCategory::Expired,

            ConvError::FeatureNotSupportedByPeer { .. } => ErrorCategory::FeatureNotSupportedByPeer,

            ConvError::TransientTransportFailure | ConvError::TransportSend { .. } => {
                ErrorCategory::TransientTransportFailure
            }

            ConvError::Storage(_) | ConvError::Crypto(_) | ConvError::Io { .. } => {
                ErrorCategory::External
            }

            ConvError::FatalInternal(_) | ConvError::InvalidTransition { .. } => {
                ErrorCategory::FatalInternal
            }
        }
    }

    /// Policy for the dispatch boundary (spec §4.4, §7): true unless the
    /// error is fatal, in which case it must reach the assertion-point
    /// channel instead of being quietly dropped.
    pub fn is_recoverable_at_dispatch(&self) -> bool {
        !matches!(self.category(), ErrorCategory::FatalInternal)
    }
}

/// Convenience extension mirroring the teacher's `ErrorContext`, adapted to
/// `ConvError`: attaches a message to an I/O failure without losing the
/// original `io::Error` (kept via `#[source]` rather than flattened to a
/// string, unlike the teacher's `Internal(String)` catch-all).
pub trait IoContext<T> {
    fn io_context(self, path: impl Into<PathBuf>) -> ConvResult<T>;
}

impl<T> IoContext<T> for Result<T, io::Error> {
    fn io_context(self, path: impl Into<PathBuf>) -> ConvResult<T> {
        self.map_err(|source| ConvError::Io {
            source,
            path: Some(path.into()),
        })
    }
}

/// Outcome of `Operation::execute` (spec §4.5, §8). Not an error type: a
/// `Expired`/`FeatureNotSupportedByPeer` result here is the *successful*
/// completion of "decide not to send", not a failure to be logged as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Sent; awaiting an acknowledgement IQ.
    Queued,
    /// Sent fire-and-forget; no acknowledgement is expected.
    Success,
    /// The descriptor/operation target is gone or past its TTL.
    Expired,
    /// The peer's negotiated version has no representation for this IQ.
    FeatureNotSupportedByPeer,
}
