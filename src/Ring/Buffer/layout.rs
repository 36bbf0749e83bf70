use crate::Ring::Structs::Message_Structs::ChatMessage;
use std::sync::atomic::AtomicI32;

/// Number of slots in each direction. Fixed at compile time and never negotiated.
pub const RING_CAPACITY: usize = 64;

/// The entire shared memory segment.
///
/// Both peers map this exact layout: two 32-bit head counters followed by the
/// two rings. No magic, no version word, no padding. The segment is
/// zero-initialised by its creator, which is a valid state for every field.
#[repr(C)]
pub struct SharedRegion {
    /// Count of messages ever produced by peer A. Only ever incremented.
    pub head_a_to_b: AtomicI32,

    /// Count of messages ever produced by peer B. Only ever incremented.
    pub head_b_to_a: AtomicI32,

    pub ring_a_to_b: [ChatMessage; RING_CAPACITY],

    pub ring_b_to_a: [ChatMessage; RING_CAPACITY],
}

/// Size in bytes of the mapped segment.
pub const REGION_SIZE: usize = std::mem::size_of::<SharedRegion>();

/// Which ring of the region a view refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    AtoB,
    BtoA,
}

impl Direction {
    /// The direction a peer writes to.
    pub fn sent_by(peer: crate::config::PeerRole) -> Self {
        match peer {
            crate::config::PeerRole::A => Direction::AtoB,
            crate::config::PeerRole::B => Direction::BtoA,
        }
    }

    /// The direction a peer reads from.
    pub fn received_by(peer: crate::config::PeerRole) -> Self {
        Self::sent_by(peer.other())
    }

    /// Suffix used when naming the semaphore that signals this direction.
    pub fn suffix(self) -> &'static str {
        match self {
            Direction::AtoB => "AtoB",
            Direction::BtoA => "BtoA",
        }
    }
}
