//! Handle-based entry points for front-ends
//!
//! ```no_run
//! use duochat::{ChatConfig, ChatEvent, PeerRole};
//!
//! let handle = duochat::start(ChatConfig::shared_memory("demo", PeerRole::A))?;
//! duochat::send(&handle, "hi")?;
//! for event in handle.events().iter() {
//!     if let ChatEvent::MessageReceived { text, sender } = event {
//!         println!("{}: {}", sender, text);
//!         break;
//!     }
//! }
//! duochat::stop(&handle);
//! # Ok::<(), duochat::ChatError>(())
//! ```

use crate::config::{ChatConfig, SocketRole, TransportKind};
use crate::error::Result;
use crate::Transport::{ChatEvent, ConnectionState, EventSink, ShmTransport, SocketTransport, Transport};
use crossbeam_channel::Receiver;

/// A started transport and the queue its events arrive on.
///
/// Dropping the handle stops the transport.
pub struct ConnectionHandle {
    transport: Box<dyn Transport>,
    events: Receiver<ChatEvent>,
}

impl ConnectionHandle {
    /// Build the transport `config` selects without starting it.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        config.validate()?;
        let (sink, events) = EventSink::channel();

        let transport: Box<dyn Transport> = match config.transport {
            TransportKind::SharedMemory => {
                Box::new(ShmTransport::new(config.channel.clone(), config.peer, sink))
            }
            TransportKind::Socket => match config.mode {
                SocketRole::Server => Box::new(SocketTransport::server(config.port, sink)),
                SocketRole::Client => {
                    Box::new(SocketTransport::client(config.client_addr()?, config.port, sink))
                }
            },
        };

        Ok(Self { transport, events })
    }

    /// Receiver for everything the transport reports
    pub fn events(&self) -> &Receiver<ChatEvent> {
        &self.events
    }

    pub fn start(&self) -> Result<()> {
        self.transport.start()
    }

    pub fn send(&self, text: &str) -> Result<()> {
        self.transport.send(text)
    }

    pub fn stop(&self) {
        self.transport.stop()
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("pending_events", &self.events.len())
            .finish()
    }
}

/// Build and start the transport described by `config`.
///
/// On failure the returned error is the report: the handle, and with it any
/// diagnostic event the transport posted, is dropped. Callers that want to
/// show those events build with [`ConnectionHandle::new`] and call
/// [`ConnectionHandle::start`] themselves; the events stay readable after a
/// failed start.
pub fn start(config: ChatConfig) -> Result<ConnectionHandle> {
    let handle = ConnectionHandle::new(&config)?;
    handle.start()?;
    Ok(handle)
}

/// Stop the session. Safe to call repeatedly.
pub fn stop(handle: &ConnectionHandle) {
    handle.stop();
}

/// Send `text` to the peer; fails with `NotConnected` while offline.
pub fn send(handle: &ConnectionHandle, text: &str) -> Result<()> {
    handle.send(text)
}
