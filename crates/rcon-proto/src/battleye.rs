//! BattlEye RCON datagram codec.
//!
//! Wire layout:
//!
//! ```text
//! | 'B' 'E' | u32le crc32 | 0xFF | payload |
//! ```
//!
//! The checksum covers `{0xFF} ++ payload`: the separator byte belongs to
//! both the wire format and the checksum input. That overlap is deliberate
//! and interop-critical, not a security measure.
//!
//! Payloads start with a type byte — login `0x00`, command `0x01`, server
//! message `0x02` — and the latter two carry an 8-bit wrapping sequence
//! number right after the type.

use crate::crc32::crc32;
use crate::errors::{ProtocolError, Result};

/// Fixed two-byte datagram prefix.
pub const PREFIX: [u8; 2] = *b"BE";
/// Header/payload separator; included in the checksum input.
pub const SEPARATOR: u8 = 0xFF;
/// Bytes before the payload: prefix + checksum + separator.
pub const HEADER_LEN: usize = 7;

/// Login request/response type byte.
pub const LOGIN: u8 = 0x00;
/// Command request/response type byte.
pub const COMMAND: u8 = 0x01;
/// Server message and server-message-ack type byte.
pub const SERVER_MESSAGE: u8 = 0x02;

/// Login response result byte signalling success.
pub const LOGIN_OK: u8 = 0x01;

/// Build a datagram around `payload`.
#[must_use]
pub fn build(payload: &[u8]) -> Vec<u8> {
    let mut checksum_input = Vec::with_capacity(1 + payload.len());
    checksum_input.push(SEPARATOR);
    checksum_input.extend_from_slice(payload);
    let crc = crc32(&checksum_input);

    let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len());
    datagram.extend_from_slice(&PREFIX);
    datagram.extend_from_slice(&crc.to_le_bytes());
    datagram.push(SEPARATOR);
    datagram.extend_from_slice(payload);
    datagram
}

/// Validate a datagram and return its payload.
///
/// # Errors
///
/// Rejects datagrams shorter than [`HEADER_LEN`], with a wrong prefix or
/// separator, or whose recomputed CRC32 does not match the carried one.
/// UDP peers sharing the port may deliver unrelated traffic, so engines
/// drop rejected datagrams silently.
pub fn parse(datagram: &[u8]) -> Result<&[u8]> {
    if datagram.len() < HEADER_LEN {
        return Err(ProtocolError::DatagramTooShort {
            expected: HEADER_LEN,
            actual: datagram.len(),
        });
    }
    if datagram[0..2] != PREFIX {
        return Err(ProtocolError::InvalidPrefix);
    }
    if datagram[6] != SEPARATOR {
        return Err(ProtocolError::MissingSeparator);
    }

    let carried = u32::from_le_bytes([datagram[2], datagram[3], datagram[4], datagram[5]]);
    // The slice from offset 6 is exactly the checksum input: separator
    // followed by payload.
    let computed = crc32(&datagram[6..]);
    if carried != computed {
        return Err(ProtocolError::ChecksumMismatch { computed, carried });
    }

    Ok(&datagram[HEADER_LEN..])
}

/// Login request payload: `{0x00, password}`.
#[must_use]
pub fn login_payload(password: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + password.len());
    payload.push(LOGIN);
    payload.extend_from_slice(password);
    payload
}

/// Command payload: `{0x01, seq, command}`. An empty command doubles as
/// the keep-alive heartbeat.
#[must_use]
pub fn command_payload(seq: u8, command: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(2 + command.len());
    payload.push(COMMAND);
    payload.push(seq);
    payload.extend_from_slice(command);
    payload
}

/// Server message acknowledgment payload: `{0x02, seq}`.
#[must_use]
pub fn ack_payload(seq: u8) -> Vec<u8> {
    vec![SERVER_MESSAGE, seq]
}

/// Segmented command response payload: `{0x01, seq, 0x00, total, index,
/// body}`. Servers emit this for responses too large for one datagram.
#[must_use]
pub fn command_part_payload(seq: u8, total: u8, index: u8, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(5 + body.len());
    payload.push(COMMAND);
    payload.push(seq);
    payload.push(0x00);
    payload.push(total);
    payload.push(index);
    payload.extend_from_slice(body);
    payload
}

/// Typed view over a validated inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Login response; [`LOGIN_OK`] means the password was accepted.
    Login {
        /// Result byte from the server.
        result: u8,
    },
    /// Response to the command sent with the same sequence number.
    Command {
        /// Sequence number echoed from the request.
        seq: u8,
        /// Response bytes.
        body: &'a [u8],
    },
    /// One piece of a segmented command response.
    ///
    /// Responses too large for one datagram arrive as `total` pieces, each
    /// tagged `{0x00, total, index}` right after the sequence number. All
    /// pieces carry the sequence of the original command.
    CommandPart {
        /// Sequence number echoed from the request.
        seq: u8,
        /// Number of pieces in the full response.
        total: u8,
        /// Zero-based position of this piece.
        index: u8,
        /// Piece bytes.
        body: &'a [u8],
    },
    /// Asynchronous server-pushed message; must be acknowledged.
    ServerMessage {
        /// Sequence number to echo back in the ack.
        seq: u8,
        /// Message bytes.
        body: &'a [u8],
    },
}

impl<'a> Payload<'a> {
    /// Interpret a validated payload received from the server.
    ///
    /// # Errors
    ///
    /// `ProtocolError::TruncatedPayload` when the payload ends before the
    /// fields its type requires, `ProtocolError::UnknownPayloadType` for an
    /// unrecognised type byte.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (&kind, rest) =
            payload.split_first().ok_or(ProtocolError::TruncatedPayload { kind: 0 })?;

        match kind {
            LOGIN => {
                let &result = rest.first().ok_or(ProtocolError::TruncatedPayload { kind })?;
                Ok(Self::Login { result })
            },
            COMMAND => {
                let (&seq, rest) =
                    rest.split_first().ok_or(ProtocolError::TruncatedPayload { kind })?;
                // A 0x00 marker after the sequence introduces the segmented
                // response header: piece count, then piece index.
                if let [0x00, total, index, body @ ..] = rest {
                    return Ok(Self::CommandPart { seq, total: *total, index: *index, body });
                }
                Ok(Self::Command { seq, body: rest })
            },
            SERVER_MESSAGE => {
                let (&seq, body) =
                    rest.split_first().ok_or(ProtocolError::TruncatedPayload { kind })?;
                Ok(Self::ServerMessage { seq, body })
            },
            other => Err(ProtocolError::UnknownPayloadType(other)),
        }
    }
}
