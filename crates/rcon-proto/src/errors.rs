//! Codec error types.
//!
//! These cover wire-level encoding and decoding only. How a failure is
//! treated is the engine's call: outbound violations surface to the caller,
//! inbound ones are dropped (shared UDP ports and desynced TCP streams
//! legitimately produce garbage).

use thiserror::Error;

/// Errors produced by the Source and BattlEye codecs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Outbound body exceeds what the size field can describe.
    #[error("packet body too large: {len} bytes exceeds maximum of {max}")]
    BodyTooLarge {
        /// Length of the rejected body.
        len: usize,
        /// Largest permitted body length.
        max: usize,
    },

    /// Inbound size field outside the valid range; the stream is
    /// desynchronised and the receive buffer has been discarded.
    #[error("invalid packet size field: {0}")]
    InvalidSize(i32),

    /// Datagram shorter than the fixed BattlEye header.
    #[error("datagram too short: {actual} bytes, need at least {expected}")]
    DatagramTooShort {
        /// Minimum well-formed length.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },

    /// Datagram does not start with the `BE` prefix.
    #[error("invalid datagram prefix")]
    InvalidPrefix,

    /// Header/payload separator byte is not `0xFF`.
    #[error("missing payload separator")]
    MissingSeparator,

    /// Recomputed CRC32 does not match the one carried in the datagram.
    #[error("checksum mismatch: computed {computed:#010x}, carried {carried:#010x}")]
    ChecksumMismatch {
        /// Checksum recomputed over the received bytes.
        computed: u32,
        /// Checksum carried in the datagram header.
        carried: u32,
    },

    /// Payload type byte is none of login, command, or server message.
    #[error("unknown payload type: {0:#04x}")]
    UnknownPayloadType(u8),

    /// Payload ends before the fields its type requires.
    #[error("truncated payload for type {kind:#04x}")]
    TruncatedPayload {
        /// Type byte of the truncated payload (0 when even that is missing).
        kind: u8,
    },
}

/// Codec result alias.
pub type Result<T> = std::result::Result<T, ProtocolError>;
