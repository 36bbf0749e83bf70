use crate::Core::region::RegionMapping;
use crate::Ring::Buffer::layout::Direction;
use crate::Ring::Buffer::RingBuffer;
use std::fmt;

/// Debug function for RegionMapping
///
/// Shows:
/// - Segment name and mapped address
/// - Whether this process created the segment
/// - Both head counters
pub fn debug_region_mapping(mapping: &RegionMapping, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegionMapping")
        .field("name", &mapping.shm().name())
        .field("region", &format_args!("{:p}", mapping.region_ptr()))
        .field("creator", &mapping.is_creator())
        .field("head_a_to_b", &mapping.head(Direction::AtoB))
        .field("head_b_to_a", &mapping.head(Direction::BtoA))
        .finish()
}

/// Debug function for RingBuffer
///
/// Displays the slot base and the current head without touching slot contents
pub fn debug_ring_buffer(buffer: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
        .field("slots", &format_args!("0x{:x}", buffer.slots as usize))
        .field("capacity", &buffer.capacity)
        .field("head", &buffer.head())
        .finish_non_exhaustive()
}
