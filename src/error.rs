//! Error types for DuoChat

/// Result type alias
pub type Result<T> = std::result::Result<T, ChatError>;

/// Failures surfaced at the transport boundary.
///
/// None of these are fatal to the process: every path that returns one
/// leaves the transport Offline with its partial resources released.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// A shared memory segment, semaphore or socket could not be created or bound
    #[error("{what}: {source}")]
    Resource {
        /// Which resource failed
        what: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Send attempted while the transport is not connected
    #[error("Not connected")]
    NotConnected,

    /// The socket peer closed the stream or the read failed
    #[error("Peer disconnected")]
    PeerDisconnected,

    /// `start` called on a transport that is already running
    #[error("Already running")]
    AlreadyRunning,

    /// Configuration rejected before any resource was touched
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Wrap an OS error with the name of the resource that failed
    pub fn resource(what: impl Into<String>, source: std::io::Error) -> Self {
        ChatError::Resource {
            what: what.into(),
            source,
        }
    }
}
