//! Client configuration.
//!
//! [`ClientConfig`] is the full per-client value type with protocol-specific
//! defaults; it is immutable once a client is constructed from it.
//! [`RconConfig`] is the narrow hosted surface (credential descriptors, CLI
//! front ends) and maps 1:1 onto `ClientConfig`.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Well-known Source RCON port.
pub const DEFAULT_SOURCE_PORT: u16 = 25575;
/// Well-known BattlEye RCON port.
pub const DEFAULT_BATTLEYE_PORT: u16 = 2305;
/// Default connection/authentication timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
/// Default per-command and inactivity timeout (Source only; BattlEye reuses
/// the connect timeout).
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(5000);

/// Which RCON dialect a client speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Valve Source engine RCON over TCP.
    #[default]
    Source,
    /// BattlEye RCON over UDP.
    Battleye,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Battleye => f.write_str("battleye"),
        }
    }
}

/// How response bodies map to strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    /// 7-bit ASCII; bytes outside the range decode to `?`.
    Ascii,
    /// UTF-8 with lossy replacement of invalid sequences.
    Utf8,
}

impl PayloadEncoding {
    /// Decode response bytes into a string.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Ascii => {
                bytes.iter().map(|&b| if b.is_ascii() { b as char } else { '?' }).collect()
            },
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Per-client configuration.
///
/// Construct with [`ClientConfig::source`] or [`ClientConfig::battleye`] to
/// get the right defaults, then adjust with the `with_*` setters. The
/// client takes the configuration by value at construction; fields are
/// never consulted mutably afterwards.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server hostname or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// RCON password; may be empty.
    pub password: String,
    /// Time allowed for connection establishment and authentication.
    pub connect_timeout: Duration,
    /// Per-command and stream inactivity timeout (Source; BattlEye reuses
    /// `connect_timeout` for commands).
    pub io_timeout: Duration,
    /// Emit packet-level `tracing` diagnostics.
    pub debug: bool,
    /// Decoding applied to response bodies.
    pub payload_encoding: PayloadEncoding,
    /// Restrict address resolution to IPv4. Defaults on for Source: some
    /// deployments listen only on IPv4 while DNS prefers IPv6.
    pub force_ipv4: bool,
}

impl ClientConfig {
    /// Configuration for a Source RCON server with protocol defaults.
    #[must_use]
    pub fn source(host: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SOURCE_PORT,
            password: password.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            debug: false,
            payload_encoding: PayloadEncoding::Ascii,
            force_ipv4: true,
        }
    }

    /// Configuration for a BattlEye RCON server with protocol defaults.
    #[must_use]
    pub fn battleye(host: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_BATTLEYE_PORT,
            password: password.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_CONNECT_TIMEOUT,
            debug: false,
            payload_encoding: PayloadEncoding::Utf8,
            force_ipv4: false,
        }
    }

    /// Override the server port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the connect/authentication timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the per-command timeout.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Toggle packet-level diagnostics.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Toggle IPv4-only address resolution.
    #[must_use]
    pub fn with_force_ipv4(mut self, force_ipv4: bool) -> Self {
        self.force_ipv4 = force_ipv4;
        self
    }
}

/// Hosted-surface configuration.
///
/// The only fields collaborator layers (credential descriptor, CLI front
/// end) expose. Deserializable so hosts can hand it over as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct RconConfig {
    /// Protocol selection; defaults to Source.
    #[serde(default)]
    pub protocol: Protocol,
    /// Server hostname or address.
    pub host: String,
    /// Server port; `None` means the protocol's well-known port.
    #[serde(default)]
    pub port: Option<u16>,
    /// RCON password.
    #[serde(default)]
    pub password: String,
    /// Timeout in milliseconds, applied to both the connect and command
    /// timers; `None` keeps the defaults.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl RconConfig {
    /// Lower into the full client configuration for the selected protocol.
    #[must_use]
    pub fn into_client_config(self) -> ClientConfig {
        let mut config = match self.protocol {
            Protocol::Source => ClientConfig::source(self.host, self.password),
            Protocol::Battleye => ClientConfig::battleye(self.host, self.password),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ms) = self.timeout {
            let timeout = Duration::from_millis(ms);
            config.connect_timeout = timeout;
            config.io_timeout = timeout;
        }
        config
    }
}
