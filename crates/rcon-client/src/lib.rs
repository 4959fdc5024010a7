//! Async RCON client engines.
//!
//! Remote Console (RCON) is the remote-administration protocol family of
//! game servers. Two incompatible dialects live behind one client contract:
//!
//! - [`SourceClient`]: Valve Source RCON over TCP — authentication
//!   handshake, request/response correlation by packet id, and the
//!   terminator-request convention for detecting the end of multi-fragment
//!   responses.
//! - [`BattlEyeClient`]: BattlEye RCON over UDP — checksummed datagrams,
//!   8-bit sequence correlation, acknowledged server-push messages, and a
//!   45-second keep-alive heartbeat.
//!
//! [`RconClient`] dispatches between them from the hosted [`RconConfig`].
//!
//! # Lifecycle
//!
//! Both engines share the state machine from `rcon-core`: `Disconnected →
//! Connecting → Connected → Authenticating → Authenticated`, with `Error`
//! reachable from any live state and teardown back to `Disconnected` from
//! everywhere. `execute` is only admissible while `Authenticated`;
//! `connect` only while `Disconnected`. Every transition, fault and
//! server-pushed message is observable through [`ClientEvent`] subscribers.
//!
//! # Example
//!
//! ```no_run
//! use rcon_client::{ClientConfig, SourceClient};
//!
//! # async fn run() -> Result<(), rcon_client::RconError> {
//! let client = SourceClient::new(ClientConfig::source("play.example.net", "hunter2"));
//! client.connect().await?;
//! let players = client.execute("list").await?;
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod battleye;
mod client;
mod event;
pub mod source;

pub use battleye::BattlEyeClient;
pub use client::RconClient;
pub use event::ClientEvent;
pub use rcon_core::{
    ClientConfig, ConnectionState, PayloadEncoding, Protocol, RconConfig, RconError,
};
pub use source::SourceClient;
