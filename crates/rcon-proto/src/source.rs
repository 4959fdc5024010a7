//! Source RCON packet codec and incremental framer.
//!
//! Wire layout, all integers little-endian:
//!
//! ```text
//! | i32 size | i32 id | i32 kind | body bytes | 0x00 | 0x00 |
//! ```
//!
//! `size` counts id, kind, body and the two-byte trailer, but not itself;
//! the valid range is 10 to 4110 inclusive. A TCP read hands back an
//! arbitrary slice of the stream — the server legitimately coalesces a
//! command response and the terminator echo into one segment — so
//! [`Framer`] reassembles packet boundaries from a growing buffer instead
//! of assuming one read per packet.

use bytes::{Buf, BufMut, BytesMut};

use crate::errors::{ProtocolError, Result};

/// Response to a command; also the kind of the terminator sentinel request.
pub const RESPONSE_VALUE: i32 = 0;
/// Command execution request; doubles as the auth-success response kind.
pub const EXEC_COMMAND: i32 = 2;
/// Authentication request.
pub const AUTH: i32 = 3;

/// Smallest valid `size` field: id + kind + empty body + trailer.
pub const MIN_SIZE: i32 = 10;
/// Largest valid `size` field.
pub const MAX_SIZE: i32 = 4110;
/// Largest body an outbound packet may carry.
pub const MAX_BODY_LEN: usize = 4100;

/// A single Source RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Correlation id. The server echoes the id of the request it is
    /// answering; `-1` signals rejected credentials.
    pub id: i32,
    /// Packet kind ([`RESPONSE_VALUE`], [`EXEC_COMMAND`] or [`AUTH`]).
    pub kind: i32,
    /// Body bytes, without the null terminator.
    pub body: Vec<u8>,
}

impl Packet {
    /// Create a packet.
    #[must_use]
    pub fn new(id: i32, kind: i32, body: impl Into<Vec<u8>>) -> Self {
        Self { id, kind, body: body.into() }
    }

    /// Value of the wire `size` field: id + kind + body + trailer.
    #[must_use]
    pub fn wire_size(&self) -> usize {
        4 + 4 + self.body.len() + 2
    }

    /// Encode the packet into `dst`.
    ///
    /// # Errors
    ///
    /// `ProtocolError::BodyTooLarge` if the body exceeds [`MAX_BODY_LEN`].
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.body.len() > MAX_BODY_LEN {
            return Err(ProtocolError::BodyTooLarge { len: self.body.len(), max: MAX_BODY_LEN });
        }

        dst.put_i32_le(self.wire_size() as i32);
        dst.put_i32_le(self.id);
        dst.put_i32_le(self.kind);
        dst.put_slice(&self.body);
        dst.put_u8(0);
        dst.put_u8(0);

        Ok(())
    }

    /// Encode into a fresh buffer.
    ///
    /// # Errors
    ///
    /// See [`Packet::encode`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(4 + self.wire_size());
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

/// Incremental decoder over a growing receive buffer.
///
/// Holds at most one partial packet at any quiescent point: the leading
/// `size` field either validates and frames a packet, or invalidates the
/// entire buffer, which is then cleared. Unbounded growth is impossible.
#[derive(Debug, Default)]
pub struct Framer {
    buf: BytesMut,
}

impl Framer {
    /// Create an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Append freshly received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet framed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Try to frame the next packet.
    ///
    /// Returns `Ok(None)` when the buffer holds less than a full packet;
    /// call again after the next [`Framer::extend`].
    ///
    /// # Errors
    ///
    /// `ProtocolError::InvalidSize` when the leading size field falls
    /// outside `10..=4110`. The stream is desynchronised at that point and
    /// the whole buffer is discarded; no packet can be recovered from it.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        if self.buf.len() < 4 {
            return Ok(None);
        }

        let size = i32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
            self.buf.clear();
            return Err(ProtocolError::InvalidSize(size));
        }

        let total = size as usize + 4;
        if self.buf.len() < total {
            return Ok(None);
        }

        self.buf.advance(4);
        let id = self.buf.get_i32_le();
        let kind = self.buf.get_i32_le();
        let body = self.buf.split_to(size as usize - 10).to_vec();
        self.buf.advance(2); // body null terminator + padding null

        Ok(Some(Packet { id, kind, body }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn frame_all(framer: &mut Framer) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(Some(packet)) = framer.next_packet() {
            packets.push(packet);
        }
        packets
    }

    #[test]
    fn encode_layout() {
        let packet = Packet::new(7, AUTH, b"secret".to_vec());
        let bytes = packet.to_bytes().unwrap();

        // size = 4 + 4 + 6 + 2 = 16, total on the wire 4 + 16 = 20
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[0..4], &16i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &AUTH.to_le_bytes());
        assert_eq!(&bytes[12..18], b"secret");
        assert_eq!(&bytes[18..20], &[0, 0]);
    }

    #[test]
    fn round_trip() {
        let packet = Packet::new(42, EXEC_COMMAND, b"say hello".to_vec());

        let mut framer = Framer::new();
        framer.extend(&packet.to_bytes().unwrap());

        assert_eq!(framer.next_packet().unwrap(), Some(packet));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn minimum_size_yields_empty_body() {
        let packet = Packet::new(1, RESPONSE_VALUE, Vec::new());
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &MIN_SIZE.to_le_bytes());

        let mut framer = Framer::new();
        framer.extend(&bytes);
        let decoded = framer.next_packet().unwrap().unwrap();
        assert!(decoded.body.is_empty());
    }

    #[test]
    fn maximum_body_accepted() {
        let packet = Packet::new(1, RESPONSE_VALUE, vec![b'x'; MAX_BODY_LEN]);
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &MAX_SIZE.to_le_bytes());

        let mut framer = Framer::new();
        framer.extend(&bytes);
        let decoded = framer.next_packet().unwrap().unwrap();
        assert_eq!(decoded.body.len(), MAX_BODY_LEN);
    }

    #[test]
    fn oversized_body_rejected() {
        let packet = Packet::new(1, EXEC_COMMAND, vec![b'x'; MAX_BODY_LEN + 1]);
        assert!(matches!(packet.to_bytes(), Err(ProtocolError::BodyTooLarge { .. })));
    }

    #[test]
    fn undersized_size_field_desyncs() {
        let mut framer = Framer::new();
        framer.extend(&9i32.to_le_bytes());
        framer.extend(&[0u8; 16]);

        assert_eq!(framer.next_packet(), Err(ProtocolError::InvalidSize(9)));
        // The buffer is discarded wholesale.
        assert_eq!(framer.buffered(), 0);
        assert_eq!(framer.next_packet(), Ok(None));
    }

    #[test]
    fn oversized_size_field_desyncs() {
        let mut framer = Framer::new();
        framer.extend(&(MAX_SIZE + 1).to_le_bytes());

        assert_eq!(framer.next_packet(), Err(ProtocolError::InvalidSize(MAX_SIZE + 1)));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn partial_packet_waits_for_more() {
        let packet = Packet::new(3, RESPONSE_VALUE, b"split".to_vec());
        let bytes = packet.to_bytes().unwrap();

        let mut framer = Framer::new();
        for &byte in &bytes[..bytes.len() - 1] {
            framer.extend(&[byte]);
            assert_eq!(framer.next_packet().unwrap(), None);
        }

        framer.extend(&bytes[bytes.len() - 1..]);
        assert_eq!(framer.next_packet().unwrap(), Some(packet));
    }

    #[test]
    fn coalesced_packets_frame_separately() {
        // Servers send the command response and the terminator echo in one
        // TCP segment; the framer must split them back apart.
        let first = Packet::new(10, RESPONSE_VALUE, b"response".to_vec());
        let second = Packet::new(11, RESPONSE_VALUE, Vec::new());

        let mut stream = first.to_bytes().unwrap();
        stream.extend_from_slice(&second.to_bytes().unwrap());

        let mut framer = Framer::new();
        framer.extend(&stream);

        assert_eq!(frame_all(&mut framer), vec![first, second]);
    }

    #[test]
    fn body_may_contain_nulls() {
        let packet = Packet::new(5, RESPONSE_VALUE, vec![b'a', 0, b'b']);

        let mut framer = Framer::new();
        framer.extend(&packet.to_bytes().unwrap());
        assert_eq!(framer.next_packet().unwrap(), Some(packet));
    }
}
