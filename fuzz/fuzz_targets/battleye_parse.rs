//! Fuzz target for the BattlEye datagram parser.
//!
//! Shared UDP ports deliver arbitrary traffic; parsing must never panic,
//! only return an error for anything that is not a well-formed datagram.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rcon_proto::battleye::{self, Payload};

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = battleye::parse(data) {
        let _ = Payload::parse(payload);
    }
});
