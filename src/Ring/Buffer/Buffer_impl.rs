use std::mem::size_of;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire};

use super::layout::{Direction, SharedRegion, RING_CAPACITY};
use super::Buffer::RingBuffer;
use crate::Ring::Structs::Message_Structs::ChatMessage;

impl RingBuffer {
    /// Create a ring view over an existing head counter and slot array.
    ///
    /// # Safety
    /// `head` and `slots` must point into a live mapping, and `slots` must have
    /// room for `capacity` messages.
    pub unsafe fn new(head: *const std::sync::atomic::AtomicI32, slots: *mut ChatMessage, capacity: usize) -> Self {
        Self {
            head,
            slots,
            capacity,
        }
    }

    /// View one direction of a mapped [`SharedRegion`].
    ///
    /// # Safety
    /// `region` must point to a live, properly sized mapping.
    pub unsafe fn for_direction(region: *mut SharedRegion, direction: Direction) -> Self {
        let (head, slots) = match direction {
            Direction::AtoB => (
                ptr::addr_of!((*region).head_a_to_b),
                ptr::addr_of_mut!((*region).ring_a_to_b) as *mut ChatMessage,
            ),
            Direction::BtoA => (
                ptr::addr_of!((*region).head_b_to_a),
                ptr::addr_of_mut!((*region).ring_b_to_a) as *mut ChatMessage,
            ),
        };
        Self::new(head, slots, RING_CAPACITY)
    }

    /// Size in bytes of one slot stride in memory.
    #[inline]
    pub fn slot_stride() -> usize {
        size_of::<ChatMessage>()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot written by the producer that received `new_head` from the increment.
    #[inline]
    pub fn slot_for_head(&self, new_head: i32) -> usize {
        (new_head.wrapping_sub(1) as u32 as usize) % self.capacity
    }

    /// Slot a consumer reads for its zero-based `tail`.
    #[inline]
    pub fn slot_for_tail(&self, tail: u64) -> usize {
        (tail % self.capacity as u64) as usize
    }

    /// Current head counter value.
    pub fn head(&self) -> i32 {
        unsafe { (*self.head).load(Acquire) }
    }

    #[inline]
    unsafe fn slot_mut(&self, index: usize) -> *mut ChatMessage {
        self.slots.add(index)
    }

    /// Claim the next slot and write `message` into it.
    ///
    /// Returns the new head count. The write is not synchronised against a
    /// reader of the same slot: when the producer wraps before the consumer
    /// caught up, the older entry is overwritten and lost. The caller signals
    /// the consumer after this returns.
    pub fn publish(&self, message: &ChatMessage) -> i32 {
        let new_head = unsafe { (*self.head).fetch_add(1, AcqRel) }.wrapping_add(1);
        let idx = self.slot_for_head(new_head);
        unsafe {
            ptr::write_volatile(self.slot_mut(idx), *message);
        }
        new_head
    }

    /// Copy out the slot a consumer at `tail` is due to read.
    ///
    /// The slot's content is trusted as-is; nothing checks that it is the
    /// message that was signalled.
    pub fn read(&self, tail: u64) -> ChatMessage {
        let idx = self.slot_for_tail(tail);
        unsafe { ptr::read_volatile(self.slot_mut(idx)) }
    }

    /// Copy out a slot by index, without tail arithmetic.
    pub fn peek_slot(&self, index: usize) -> Option<ChatMessage> {
        if index >= self.capacity {
            return None;
        }
        Some(unsafe { ptr::read_volatile(self.slot_mut(index)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::{alloc_zeroed, dealloc, Layout};

    fn zeroed_region() -> (*mut SharedRegion, Layout) {
        let layout = Layout::new::<SharedRegion>();
        let ptr = unsafe { alloc_zeroed(layout) } as *mut SharedRegion;
        assert!(!ptr.is_null());
        (ptr, layout)
    }

    #[test]
    fn directions_do_not_alias() {
        let (region, layout) = zeroed_region();
        let a = unsafe { RingBuffer::for_direction(region, Direction::AtoB) };
        let b = unsafe { RingBuffer::for_direction(region, Direction::BtoA) };

        a.publish(&ChatMessage::new(1, "from a"));
        assert_eq!(a.head(), 1);
        assert_eq!(b.head(), 0);
        assert_eq!(b.read(0).text(), "");
        assert_eq!(a.read(0).text(), "from a");

        unsafe { dealloc(region as *mut u8, layout) };
    }

    #[test]
    fn slot_for_head_wraps() {
        let (region, layout) = zeroed_region();
        let ring = unsafe { RingBuffer::for_direction(region, Direction::AtoB) };
        assert_eq!(ring.slot_for_head(1), 0);
        assert_eq!(ring.slot_for_head(64), 63);
        assert_eq!(ring.slot_for_head(65), 0);
        assert_eq!(ring.slot_for_tail(64), 0);
        assert_eq!(ring.slot_for_tail(130), 2);
        assert!(ring.peek_slot(RING_CAPACITY).is_none());
        unsafe { dealloc(region as *mut u8, layout) };
    }
}
