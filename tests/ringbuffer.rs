use duochat::Ring::Buffer::layout::{Direction, SharedRegion, RING_CAPACITY};
use duochat::Ring::Buffer::RingBuffer;
use duochat::Ring::Structs::Message_Structs::{ChatMessage, MAX_TEXT_UNITS};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::sync::atomic::Ordering;

/// A zeroed region on the heap, standing in for a fresh segment.
struct Backing {
    ptr: *mut SharedRegion,
    layout: Layout,
}

impl Backing {
    fn new() -> Self {
        let layout = Layout::new::<SharedRegion>();
        let ptr = unsafe { alloc_zeroed(layout) } as *mut SharedRegion;
        if ptr.is_null() {
            panic!("Failed to allocate region");
        }
        Self { ptr, layout }
    }

    fn ring(&self, direction: Direction) -> RingBuffer {
        unsafe { RingBuffer::for_direction(self.ptr, direction) }
    }
}

impl Drop for Backing {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr as *mut u8, self.layout) };
    }
}

#[test]
fn nth_message_lands_in_slot_n_minus_one() {
    let backing = Backing::new();
    let rb = backing.ring(Direction::AtoB);

    for n in 1..=150i32 {
        let head = rb.publish(&ChatMessage::new(n as u32, &format!("msg {}", n)));
        assert_eq!(head, n);
        let slot = ((n - 1) as usize) % RING_CAPACITY;
        assert_eq!(rb.slot_for_head(head), slot);
        assert_eq!(rb.peek_slot(slot).unwrap().text(), format!("msg {}", n));
    }
    assert_eq!(rb.head(), 150);
}

#[test]
fn wraparound_overwrites_unread_slot() {
    let backing = Backing::new();
    let rb = backing.ring(Direction::BtoA);

    rb.publish(&ChatMessage::new(0, "first"));
    for i in 2..=RING_CAPACITY {
        rb.publish(&ChatMessage::new(0, &i.to_string()));
    }
    // Reader never caught up; the 65th send takes slot 0
    rb.publish(&ChatMessage::new(0, "sixty-fifth"));

    assert_eq!(rb.read(0).text(), "sixty-fifth");
    assert_eq!(rb.read(1).text(), "2");
}

#[test]
fn reader_trusts_slot_not_content() {
    let backing = Backing::new();
    let rb = backing.ring(Direction::AtoB);

    // The reader was signalled for message 1, but the producer lapped it first
    for i in 1..=(RING_CAPACITY + 1) {
        rb.publish(&ChatMessage::new(i as u32, &format!("#{}", i)));
    }
    let seen = rb.read(0);
    assert_eq!(seen.produced_at_tick, (RING_CAPACITY + 1) as u32);
    assert_eq!(seen.text(), format!("#{}", RING_CAPACITY + 1));
}

#[test]
fn directions_do_not_share_heads_or_slots() {
    let backing = Backing::new();
    let ab = backing.ring(Direction::AtoB);
    let ba = backing.ring(Direction::BtoA);

    ab.publish(&ChatMessage::new(1, "from A"));
    ab.publish(&ChatMessage::new(2, "from A again"));
    ba.publish(&ChatMessage::new(3, "from B"));

    assert_eq!(ab.head(), 2);
    assert_eq!(ba.head(), 1);
    assert_eq!(ab.read(0).text(), "from A");
    assert_eq!(ba.read(0).text(), "from B");
    unsafe {
        assert_eq!((*backing.ptr).head_a_to_b.load(Ordering::Acquire), 2);
        assert_eq!((*backing.ptr).head_b_to_a.load(Ordering::Acquire), 1);
    }
}

#[test]
fn long_text_is_truncated_to_239_units() {
    let backing = Backing::new();
    let rb = backing.ring(Direction::AtoB);

    let long = "x".repeat(500);
    rb.publish(&ChatMessage::new(0, &long));
    let stored = rb.read(0);
    assert_eq!(stored.units().len(), MAX_TEXT_UNITS);
    assert_eq!(stored.text(), "x".repeat(239));
    assert_eq!(stored.text[MAX_TEXT_UNITS], 0);

    let short = "y".repeat(239);
    rb.publish(&ChatMessage::new(0, &short));
    assert_eq!(rb.read(1).text(), short);
}

#[test]
fn head_wraps_without_panicking() {
    let backing = Backing::new();
    unsafe { (*backing.ptr).head_a_to_b.store(i32::MAX, Ordering::Release) };
    let rb = backing.ring(Direction::AtoB);

    let head = rb.publish(&ChatMessage::new(0, "wrap"));
    assert_eq!(head, i32::MIN);
    let slot = rb.slot_for_head(head);
    assert!(slot < RING_CAPACITY);
    assert_eq!(rb.peek_slot(slot).unwrap().text(), "wrap");
    assert!(rb.peek_slot(RING_CAPACITY).is_none());
}
