// One direction of the shared region, seen from this process

use crate::Ring::Structs::Message_Structs::ChatMessage;
use std::sync::atomic::AtomicI32;

/// A single-producer, single-consumer ring view over one direction of a
/// [`SharedRegion`](super::layout::SharedRegion).
///
/// This struct is NOT stored in shared memory. It holds raw pointers into the
/// mapping and is only valid while the mapping it was created from is alive.
///
/// ### Concurrency Design:
/// - **Producer**: atomically increments `head` and writes the slot
///   `(new_head - 1) % capacity`. The slot write is plain memory, not
///   synchronised with any reader.
/// - **Consumer**: keeps its own tail outside shared memory and reads slot
///   `tail % capacity` once it has been signalled. If the producer lapped the
///   consumer, the older entry is gone and the consumer reads the newer one.
pub struct RingBuffer {
    /// Head counter for this direction, inside the mapping.
    pub(crate) head: *const AtomicI32,

    /// First slot of this direction's ring.
    pub(crate) slots: *mut ChatMessage,

    /// Number of slots.
    pub(crate) capacity: usize,
}

unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}
