//! Wire codecs for the RCON protocol family.
//!
//! Two incompatible dialects share this crate:
//!
//! - [`source`]: the TCP variant defined by Valve's Source engine.
//!   Length-prefixed packets over a byte stream; [`source::Framer`]
//!   reassembles packet boundaries from arbitrary reads.
//! - [`battleye`]: the UDP variant used by BattlEye-protected titles.
//!   Self-contained datagrams with a magic prefix and a CRC32 checksum.
//!
//! Everything here is pure: no sockets, no timers, no state beyond the
//! framer's receive buffer. The protocol engines in `rcon-client` drive
//! these codecs.

#![forbid(unsafe_code)]

pub mod battleye;
pub mod crc32;
pub mod errors;
pub mod source;

pub use errors::{ProtocolError, Result};
