//! Protocol-independent core shared by both RCON engines.
//!
//! # Components
//!
//! - [`session`]: the connection-lifecycle state machine. Pure: it owns the
//!   current state and validates transitions; the engines execute effects
//!   and broadcast the resulting state changes.
//! - [`config`]: per-client configuration with protocol-specific defaults,
//!   plus the hosted-surface [`RconConfig`] mapped 1:1 onto it.
//! - [`error`]: the single error taxonomy surfaced by `connect` and
//!   `execute` across both protocols.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod session;

pub use config::{ClientConfig, PayloadEncoding, Protocol, RconConfig};
pub use error::RconError;
pub use session::{ConnectionState, IllegalTransition, Session, StateChange};
