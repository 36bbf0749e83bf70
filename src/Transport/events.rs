//! Events posted from the transports to whoever presents them
//!
//! Posting never blocks: the queue is unbounded and a dropped receiver
//! simply discards events.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;

/// Connection state of one transport instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Offline = 0,
    /// Socket: resources allocated, accept/connect not finished yet
    Starting = 1,
    /// Socket server: waiting for the one client
    Listening = 2,
    /// Socket: stream established
    Connected = 3,
    /// Shared memory: segment and semaphores open
    Running = 4,
}

impl ConnectionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Starting,
            2 => ConnectionState::Listening,
            3 => ConnectionState::Connected,
            4 => ConnectionState::Running,
            _ => ConnectionState::Offline,
        }
    }

    /// Label shown in a status bar
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Offline => "Offline",
            ConnectionState::Starting => "Starting",
            ConnectionState::Listening => "Listening",
            ConnectionState::Connected => "Live",
            ConnectionState::Running => "Running",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Text arrived from the other side
    MessageReceived { text: String, sender: String },
    /// Text this side sent, labelled with this side's own name
    MessageSent { text: String, sender: String },
    StatusChanged(ConnectionState),
    /// Diagnostic line for the user
    Log(String),
}

impl fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatEvent::MessageReceived { text, sender } => write!(f, "[RX][{}] {}", sender, text),
            ChatEvent::MessageSent { text, sender } => write!(f, "[TX][{}] {}", sender, text),
            ChatEvent::StatusChanged(state) => write!(f, "Status: {}", state),
            ChatEvent::Log(line) => f.write_str(line),
        }
    }
}

/// Sending half of the event queue, cloned into every thread that posts
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<ChatEvent>,
}

impl EventSink {
    pub fn new(tx: Sender<ChatEvent>) -> Self {
        Self { tx }
    }

    /// A sink and the receiver that drains it
    pub fn channel() -> (Self, Receiver<ChatEvent>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }

    pub fn post(&self, event: ChatEvent) {
        log::trace!("event: {}", event);
        // Nobody listening is fine
        let _ = self.tx.send(event);
    }

    pub fn message_received(&self, text: impl Into<String>, sender: impl Into<String>) {
        self.post(ChatEvent::MessageReceived {
            text: text.into(),
            sender: sender.into(),
        });
    }

    pub fn message_sent(&self, text: impl Into<String>, sender: impl Into<String>) {
        self.post(ChatEvent::MessageSent {
            text: text.into(),
            sender: sender.into(),
        });
    }

    pub fn status(&self, state: ConnectionState) {
        self.post(ChatEvent::StatusChanged(state));
    }

    pub fn log(&self, line: impl Into<String>) {
        self.post(ChatEvent::Log(line.into()));
    }
}
