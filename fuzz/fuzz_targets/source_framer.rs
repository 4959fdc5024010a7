//! Fuzz target for the Source RCON framer.
//!
//! Feeds arbitrary byte sequences through the incremental framer to find:
//! - Parser crashes or panics
//! - Integer overflows in size handling
//! - Unbounded buffer growth on desynced streams
//!
//! The framer should NEVER panic. Invalid size fields must clear the
//! buffer and report an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rcon_proto::source::Framer;

fuzz_target!(|data: &[u8]| {
    let mut framer = Framer::new();
    // Split the input into two extends to exercise partial-packet paths.
    let mid = data.len() / 2;
    framer.extend(&data[..mid]);
    while let Ok(Some(_)) = framer.next_packet() {}
    framer.extend(&data[mid..]);
    while let Ok(Some(_)) = framer.next_packet() {}
});
