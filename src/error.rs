use thiserror::Error;

use crate::emergency::Emergency;

/// The error taxonomy of the engine. Every variant surfaces to the caller;
/// nothing is recovered silently except the narrow `IGNORED_MESSAGE` /
/// `SDO_IGNORED_COMMAND` / `SDO_UNKNOWN_COMMAND` update modes, which are
/// reported through [`crate::state_machine::Update`] instead of an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanOpenError {
    /// Observed wire behavior violates the engine's model of the protocol:
    /// a size disagreement in the dictionary, or a zero timestamp on an
    /// inbound SDO upload reply.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// A typed `get` was attempted on an object that was declared (or
    /// mapped) but has never actually been observed on the wire.
    #[error("attempted to read object {object_id:#06x}:{sub_id}, which has never been read")]
    ObjectNotRead { object_id: u16, sub_id: u8 },

    /// `get` was called with a destination buffer smaller than the stored
    /// object size.
    #[error("buffer of {capacity} bytes is too small to hold {needed} stored bytes")]
    BufferSizeTooSmall { capacity: usize, needed: usize },

    /// A typed `get` observed a size different from the requested type's
    /// width, on an object whose size is already pinned.
    #[error("object {object_id:#06x}:{sub_id} has a pinned size of {known} bytes, but a {requested}-byte type was requested")]
    InvalidObjectType {
        object_id: u16,
        sub_id: u8,
        known: u8,
        requested: u8,
    },

    /// A declared or previously-observed size disagrees with the size used
    /// in a `download`, PDO mapping declaration, or `set`.
    #[error("object {object_id:#06x}:{sub_id} has a declared size of {declared} bytes, this operation used {used} bytes")]
    ObjectSizeMismatch {
        object_id: u16,
        sub_id: u8,
        declared: u8,
        used: u8,
    },

    /// A non-expedited (> 4 byte) SDO download was requested. Segmented
    /// and block transfers are out of scope for this engine.
    #[error("this engine only builds expedited SDO transfers (1..=4 bytes); {0} bytes were requested")]
    Unsupported(usize),

    /// A non-"no error" emergency message was received.
    #[error("emergency message received: {0}")]
    EmergencyMessageReceived(Emergency),

    /// The remote node aborted an SDO domain transfer.
    #[error("SDO domain transfer aborted for object {object_id:#06x}:{sub_id}, code {raw_code:#010x}")]
    SdoDomainTransferAborted {
        object_id: u16,
        sub_id: u8,
        raw_code: u32,
    },

    /// A PDO mapping would carry more than 8 cumulative bytes.
    #[error("PDO mapping would exceed the 8-byte frame payload")]
    PdoMappingTooBig,

    /// A caller-supplied argument violates a documented precondition (e.g.
    /// a null timestamp passed to `set`, or a PDO index outside 0..MAX_PDO).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A frame could not be decoded as the message type its function code
    /// indicates (malformed length, bad command byte, ...).
    #[error("parse error: {0}")]
    ParseError(String),

    /// A frame was presented to a codec whose function code it does not
    /// match (e.g. a non-heartbeat frame passed to `parse_heartbeat`).
    #[error("{0} is not a valid message for this context")]
    BadMessage(String),
}
