//! Session configuration
//!
//! A [`ChatConfig`] says which transport to start and with which role. It can
//! be built in code, parsed from the command-line flags the chat front-ends
//! accept, or loaded from a TOML file. Defaults match the stock demo: channel
//! `demo` as peer A for shared memory, server on port 54000 for sockets.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// Default TCP port for the socket transport
pub const DEFAULT_PORT: u16 = 54000;

/// Default host a client connects to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Which transport a session runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum TransportKind {
    #[default]
    #[serde(rename = "socket")]
    Socket,
    #[serde(rename = "shm", alias = "shared_memory")]
    SharedMemory,
}

/// Side of a shared-memory channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum PeerRole {
    #[default]
    #[serde(alias = "a")]
    A,
    #[serde(alias = "b")]
    B,
}

impl PeerRole {
    pub fn other(self) -> Self {
        match self {
            PeerRole::A => PeerRole::B,
            PeerRole::B => PeerRole::A,
        }
    }

    /// Label attached to messages this peer sends
    pub fn label(self) -> &'static str {
        match self {
            PeerRole::A => "Peer A",
            PeerRole::B => "Peer B",
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Side of a socket session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketRole {
    #[default]
    Server,
    Client,
}

impl SocketRole {
    pub fn other(self) -> Self {
        match self {
            SocketRole::Server => SocketRole::Client,
            SocketRole::Client => SocketRole::Server,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SocketRole::Server => "Server",
            SocketRole::Client => "Client",
        }
    }
}

impl fmt::Display for SocketRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything needed to start one side of a chat session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    pub transport: TransportKind,
    /// Shared memory: which ring this side writes
    pub peer: PeerRole,
    /// Shared memory: channel the OS object names derive from
    pub channel: String,
    /// Socket: listen or connect
    pub mode: SocketRole,
    /// Socket: numeric IPv4 address a client connects to
    pub host: String,
    /// Socket: port to bind or connect to
    pub port: u16,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            peer: PeerRole::A,
            channel: crate::Core::names::DEFAULT_CHANNEL.to_string(),
            mode: SocketRole::Server,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ChatConfig {
    /// Shared-memory session on `channel` as `peer`
    pub fn shared_memory(channel: impl Into<String>, peer: PeerRole) -> Self {
        Self {
            transport: TransportKind::SharedMemory,
            peer,
            channel: channel.into(),
            ..Self::default()
        }
    }

    /// Socket server listening on all interfaces
    pub fn socket_server(port: u16) -> Self {
        Self {
            transport: TransportKind::Socket,
            mode: SocketRole::Server,
            port,
            ..Self::default()
        }
    }

    /// Socket client connecting to `host:port`
    pub fn socket_client(host: impl Into<String>, port: u16) -> Self {
        Self {
            transport: TransportKind::Socket,
            mode: SocketRole::Client,
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_peer(mut self, peer: PeerRole) -> Self {
        self.peer = peer;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_mode(mut self, mode: SocketRole) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Parse chat flags, starting from the defaults.
    ///
    /// Supports `--transport socket|shm`, `--channel <name>`, `--peer A|B`,
    /// `--mode server|client`, `--host <ip>` and `--port <n>`. Unknown flags
    /// and unrecognised values are ignored. Pass the arguments without the
    /// program name, e.g. `std::env::args().skip(1)`.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        let mut i = 0;
        while i < args.len() {
            let value = args.get(i + 1).map(String::as_str);
            match (args[i].as_str(), value) {
                ("--transport", Some(v)) => {
                    match v {
                        "socket" => config.transport = TransportKind::Socket,
                        "shm" => config.transport = TransportKind::SharedMemory,
                        other => log::warn!("Ignoring unknown transport {:?}", other),
                    }
                    i += 1;
                }
                ("--channel", Some(v)) => {
                    config.channel = v.to_string();
                    i += 1;
                }
                ("--peer", Some(v)) => {
                    match v {
                        "A" | "a" => config.peer = PeerRole::A,
                        "B" | "b" => config.peer = PeerRole::B,
                        other => log::warn!("Ignoring unknown peer {:?}", other),
                    }
                    i += 1;
                }
                ("--mode", Some(v)) => {
                    match v {
                        "server" => config.mode = SocketRole::Server,
                        "client" => config.mode = SocketRole::Client,
                        other => log::warn!("Ignoring unknown mode {:?}", other),
                    }
                    i += 1;
                }
                ("--host", Some(v)) => {
                    config.host = v.to_string();
                    i += 1;
                }
                ("--port", Some(v)) => {
                    config.port = match v.parse::<u16>() {
                        Ok(port) if port > 0 => port,
                        _ => {
                            log::warn!("Invalid port {:?}, using {}", v, DEFAULT_PORT);
                            DEFAULT_PORT
                        }
                    };
                    i += 1;
                }
                _ => {}
            }
            i += 1;
        }

        if config.channel.is_empty() {
            config.channel = crate::Core::names::DEFAULT_CHANNEL.to_string();
        }
        config
    }

    /// Load configuration from a TOML file. Missing keys take their defaults.
    ///
    /// # Example
    /// ```no_run
    /// use duochat::config::ChatConfig;
    /// let config = ChatConfig::load("chat.toml").unwrap();
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ChatError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Check the fields the selected transport will use.
    pub fn validate(&self) -> Result<()> {
        match self.transport {
            TransportKind::SharedMemory => crate::Core::names::validate_channel(&self.channel)
                .map_err(|e| ChatError::InvalidConfig(e.to_string())),
            TransportKind::Socket => match self.mode {
                SocketRole::Server => Ok(()),
                SocketRole::Client => self.client_addr().map(|_| ()),
            },
        }
    }

    /// Client host as an IPv4 address. Host names are not resolved.
    pub fn client_addr(&self) -> Result<Ipv4Addr> {
        self.host.parse::<Ipv4Addr>().map_err(|_| {
            ChatError::InvalidConfig(format!("Host {:?} is not a numeric IPv4 address", self.host))
        })
    }
}
