// In src/Ring/producer.rs
use crate::config::PeerRole;
use crate::Core::region::RegionMapping;
use crate::Core::semaphore::NamedSemaphore;
use crate::Ring::Buffer::layout::Direction;
use crate::Ring::Buffer::RingBuffer;
use crate::Ring::Structs::Message_Structs::{current_tick, ChatMessage};
use parking_lot::Mutex;
use std::sync::Arc;

/// Writes one peer's outbound ring and signals the other side.
///
/// The head increment, slot write and semaphore release run under one lock,
/// so concurrent `send` calls on the same producer keep the head/slot
/// relationship intact. Nothing stops the producer from lapping the reader.
pub struct Producer {
    _mapping: Arc<RegionMapping>,
    ring: RingBuffer,
    signal: Arc<NamedSemaphore>,
    peer: PeerRole,
    send_lock: Mutex<()>,
}

impl Producer {
    pub(crate) fn new(mapping: Arc<RegionMapping>, signal: Arc<NamedSemaphore>, peer: PeerRole) -> Self {
        let ring = mapping.ring(Direction::sent_by(peer));
        Self {
            _mapping: mapping,
            ring,
            signal,
            peer,
            send_lock: Mutex::new(()),
        }
    }

    /// Store `text` (truncated to 239 UTF-16 units) in the next slot and signal it.
    ///
    /// # Returns
    /// * The new head count, i.e. how many messages this direction has ever carried
    /// * `Err(io::Error)` if the semaphore could not be released
    pub fn send(&self, text: &str) -> std::io::Result<i32> {
        let message = ChatMessage::new(current_tick(), text);

        let _guard = self.send_lock.lock();
        let new_head = self.ring.publish(&message);
        self.signal.post()?;
        Ok(new_head)
    }

    /// Returns the role this producer writes as
    pub fn peer(&self) -> PeerRole {
        self.peer
    }

    /// Returns the outbound ring
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }
}
