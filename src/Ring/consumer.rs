// src/Ring/consumer.rs

use crate::config::PeerRole;
use crate::Core::region::RegionMapping;
use crate::Core::semaphore::NamedSemaphore;
use crate::Ring::Buffer::layout::Direction;
use crate::Ring::Buffer::RingBuffer;
use crate::Ring::Structs::Message_Structs::ChatMessage;
use std::sync::Arc;
use std::time::Duration;

/// Reads one peer's inbound ring.
///
/// The read cursor lives here, not in shared memory, and starts at zero on
/// every new consumer regardless of the shared head. Each successful wait on
/// the inbound semaphore advances it by one slot.
pub struct Consumer {
    _mapping: Arc<RegionMapping>,
    ring: RingBuffer,
    signal: Arc<NamedSemaphore>,
    peer: PeerRole,
    local_tail: u64,
}

impl Consumer {
    pub(crate) fn new(mapping: Arc<RegionMapping>, signal: Arc<NamedSemaphore>, peer: PeerRole) -> Self {
        let ring = mapping.ring(Direction::received_by(peer));
        Self {
            _mapping: mapping,
            ring,
            signal,
            peer,
            local_tail: 0,
        }
    }

    /// Waits up to `timeout` for a signal, then reads the slot at the local tail.
    ///
    /// # Returns
    /// * `Ok(Some(message))` if signalled
    /// * `Ok(None)` on timeout
    /// * `Err(io::Error)` if the wait itself failed
    pub fn receive_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ChatMessage>> {
        if !self.signal.wait_timeout(timeout)? {
            return Ok(None);
        }
        Ok(Some(self.take_slot()))
    }

    /// Reads the slot at the local tail and advances it.
    ///
    /// Only call after a successful wait; the slot is trusted as-is, so if the
    /// producer overwrote it in the meantime the newer text is returned.
    pub fn take_slot(&mut self) -> ChatMessage {
        let message = self.ring.read(self.local_tail);
        self.local_tail += 1;
        message
    }

    /// Wait on the inbound semaphore without reading a slot.
    pub fn wait_signal(&self, timeout: Duration) -> std::io::Result<bool> {
        self.signal.wait_timeout(timeout)
    }

    /// Number of messages read so far
    pub fn local_tail(&self) -> u64 {
        self.local_tail
    }

    /// Label of the peer whose messages this consumer reads
    pub fn sender_label(&self) -> &'static str {
        self.peer.other().label()
    }

    /// Returns the inbound semaphore, shared with whoever needs to wake the waiter
    pub fn signal(&self) -> &Arc<NamedSemaphore> {
        &self.signal
    }

    /// Returns the inbound ring
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }
}
