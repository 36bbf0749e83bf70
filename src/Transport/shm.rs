//! Shared-memory ring transport
//!
//! Both peers map the same [`SharedRegion`](crate::Ring::Buffer::layout::SharedRegion)
//! and signal each other through one named semaphore per direction. There is
//! no handshake: the transport is Running as soon as its own resources are
//! open, whether or not the other peer exists yet.
//!
//! # Connection Lifecycle
//!
//! ```text
//! 1. start: open segment (zero it if we created it) + both semaphores
//! 2. receiver thread waits on the inbound semaphore in 200ms slices
//! 3. send: bump outbound head, write slot, post outbound semaphore
//! 4. stop: clear flag, post inbound semaphore once, join, close handles
//! ```

use super::events::{ConnectionState, EventSink};
use super::lifecycle::{Lifecycle, RunningFlag};
use super::Transport;
use crate::config::{PeerRole, TransportKind};
use crate::error::{ChatError, Result};
use crate::Core::region::RegionMapping;
use crate::Core::semaphore::NamedSemaphore;
use crate::Ring::builder::{ChannelBuilder, ChannelPair};
use crate::Ring::Buffer::layout::Direction;
use crate::Ring::Structs::Message_Structs::encode_truncated;
use crate::Ring::{Consumer, Producer};
use parking_lot::RwLock;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long one semaphore wait may block before the cancellation flag is re-checked
pub const RECEIVE_WAIT_SLICE: Duration = Duration::from_millis(200);

struct ShmSession {
    producer: Producer,
    /// Inbound semaphore, posted once by `stop` to wake the receiver
    wake: Arc<NamedSemaphore>,
    mapping: Arc<RegionMapping>,
}

/// One peer of a shared-memory chat channel
pub struct ShmTransport {
    channel: String,
    peer: PeerRole,
    events: EventSink,
    lifecycle: Lifecycle<bool>,
    session: RwLock<Option<ShmSession>>,
}

impl ShmTransport {
    pub fn new(channel: impl Into<String>, peer: PeerRole, events: EventSink) -> Self {
        Self {
            channel: channel.into(),
            peer,
            events,
            lifecycle: Lifecycle::new(),
            session: RwLock::new(None),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn peer(&self) -> PeerRole {
        self.peer
    }

    /// Shared head counter for `direction`, while started
    pub fn head(&self, direction: Direction) -> Option<i32> {
        self.session
            .read()
            .as_ref()
            .map(|session| session.mapping.head(direction))
    }

    fn fail_start(&self, what: &str, err: std::io::Error) -> ChatError {
        self.lifecycle.cancel();
        self.lifecycle.state().store(ConnectionState::Offline);
        log::error!("{} for channel {:?}: {}", what, self.channel, err);
        self.events.log(format!("{}: {}", what, err));
        ChatError::resource(what, err)
    }
}

impl Transport for ShmTransport {
    fn start(&self) -> Result<()> {
        if !self.lifecycle.try_begin() {
            log::warn!("Shared memory transport already running on {:?}", self.channel);
            self.events.log("Already running.");
            return Err(ChatError::AlreadyRunning);
        }

        let ChannelPair {
            producer,
            consumer,
            mapping,
            names,
        } = match ChannelBuilder::new()
            .with_channel(self.channel.clone())
            .with_peer(self.peer)
            .build()
        {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail_start("Failed to open shared memory", e)),
        };

        let wake = Arc::clone(consumer.signal());
        let running = self.lifecycle.running_flag();
        let events = self.events.clone();
        let handle = thread::Builder::new()
            .name("shm-receiver".to_string())
            .spawn(move || receive_loop(consumer, running, events));
        match handle {
            Ok(handle) => self.lifecycle.set_receiver(handle),
            Err(e) => return Err(self.fail_start("Failed to spawn receiver", e)),
        }

        *self.session.write() = Some(ShmSession {
            producer,
            wake,
            mapping,
        });
        self.lifecycle.state().store(ConnectionState::Running);

        log::info!(
            "Shared memory chat running on {} as {}",
            names.segment,
            self.peer
        );
        self.events.status(ConnectionState::Running);
        self.events.log(format!(
            "Connected to channel \"{}\" as {}",
            self.channel, self.peer
        ));
        self.events.log("Shared memory ready.");
        Ok(())
    }

    fn send(&self, text: &str) -> Result<()> {
        let session = self.session.read();
        let session = match session.as_ref() {
            Some(session) if self.lifecycle.is_running() => session,
            _ => {
                self.events.log("Not connected.");
                return Err(ChatError::NotConnected);
            }
        };
        if text.is_empty() {
            return Ok(());
        }

        let new_head = session.producer.send(text).map_err(|e| {
            log::error!("Failed to signal outbound semaphore: {}", e);
            self.events.log(format!("Send failed: {}", e));
            ChatError::resource("Failed to signal peer", e)
        })?;
        log::debug!("{} wrote message #{}", self.peer, new_head);

        let stored: Vec<u16> = encode_truncated(text).collect();
        self.events
            .message_sent(String::from_utf16_lossy(&stored), self.peer.label());
        Ok(())
    }

    fn stop(&self) {
        let was_running = self.lifecycle.cancel();
        let session = self.session.write().take();

        if let Some(session) = session {
            if let Err(e) = session.wake.post() {
                log::warn!("Failed to wake receiver: {}", e);
            }
            // If the receiver left without taking our wake-up, take it back
            // so the next session does not read a phantom message.
            if self.lifecycle.join_receiver() != Some(true) {
                let _ = session.wake.try_wait();
            }
            drop(session);
        } else {
            self.lifecycle.join_receiver();
        }

        self.lifecycle.state().store(ConnectionState::Offline);
        if was_running {
            log::info!("Shared memory chat on {:?} stopped", self.channel);
            self.events.status(ConnectionState::Offline);
        }
    }

    fn state(&self) -> ConnectionState {
        self.lifecycle.state().load()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::SharedMemory
    }
}

impl Drop for ShmTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Receiver thread body. Returns whether its last wait consumed a signal.
fn receive_loop(mut consumer: Consumer, running: RunningFlag, events: EventSink) -> bool {
    log::debug!("Shared memory receiver started");
    loop {
        let signalled = match consumer.wait_signal(RECEIVE_WAIT_SLICE) {
            Ok(signalled) => signalled,
            Err(e) => {
                log::error!("Inbound semaphore wait failed: {}", e);
                events.log(format!("Receive failed: {}", e));
                return false;
            }
        };

        if !running.load(Ordering::Acquire) {
            log::debug!("Running flag cleared, exiting");
            return signalled;
        }

        if signalled {
            let message = consumer.take_slot();
            events.message_received(message.text(), consumer.sender_label());
        }
    }
}
