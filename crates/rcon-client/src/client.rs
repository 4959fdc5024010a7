//! Protocol-dispatching client facade.
//!
//! [`RconClient`] wraps the two engines behind the uniform surface hosted
//! callers consume: construct from an [`RconConfig`], then
//! `connect`/`execute`/`disconnect` without caring which dialect is
//! underneath.

use rcon_core::{ClientConfig, ConnectionState, Protocol, RconConfig, RconError};
use tokio::sync::mpsc;

use crate::battleye::BattlEyeClient;
use crate::event::ClientEvent;
use crate::source::SourceClient;

/// A client for either RCON dialect.
pub enum RconClient {
    /// Source RCON over TCP.
    Source(SourceClient),
    /// BattlEye RCON over UDP.
    Battleye(BattlEyeClient),
}

impl RconClient {
    /// Build a client from the hosted configuration object.
    #[must_use]
    pub fn from_config(config: RconConfig) -> Self {
        let protocol = config.protocol;
        Self::with_protocol(protocol, config.into_client_config())
    }

    /// Build a client for `protocol` from a full client configuration.
    #[must_use]
    pub fn with_protocol(protocol: Protocol, config: ClientConfig) -> Self {
        match protocol {
            Protocol::Source => Self::Source(SourceClient::new(config)),
            Protocol::Battleye => Self::Battleye(BattlEyeClient::new(config)),
        }
    }

    /// Connect and authenticate.
    ///
    /// # Errors
    ///
    /// `ConnectionFailed`, `Timeout`, `AuthFailed`, or `SocketError`.
    pub async fn connect(&self) -> Result<(), RconError> {
        match self {
            Self::Source(client) => client.connect().await,
            Self::Battleye(client) => client.connect().await,
        }
    }

    /// Execute a command and return the response.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated`, `Timeout`, `CommandFailed`, or `SocketError`.
    pub async fn execute(&self, command: &str) -> Result<String, RconError> {
        match self {
            Self::Source(client) => client.execute(command).await,
            Self::Battleye(client) => client.execute(command).await,
        }
    }

    /// Tear the session down. Never fails.
    pub async fn disconnect(&self) {
        match self {
            Self::Source(client) => client.disconnect().await,
            Self::Battleye(client) => client.disconnect().await,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match self {
            Self::Source(client) => client.state(),
            Self::Battleye(client) => client.state(),
        }
    }

    /// Whether `execute` is currently admissible.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        match self {
            Self::Source(client) => client.is_authenticated(),
            Self::Battleye(client) => client.is_authenticated(),
        }
    }

    /// Number of in-flight `execute` calls.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        match self {
            Self::Source(client) => client.pending_requests(),
            Self::Battleye(client) => client.pending_requests(),
        }
    }

    /// Register an event subscriber.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        match self {
            Self::Source(client) => client.subscribe(),
            Self::Battleye(client) => client.subscribe(),
        }
    }
}
