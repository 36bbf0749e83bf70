use super::*;
use std::sync::atomic::Ordering;

/// Getter methods for RegionMapping
///
/// These expose the mapping's state for debugging, monitoring and tests.
impl RegionMapping {
    /// Get a reference to the underlying shared memory backend
    pub fn shm(&self) -> &dyn SharedMemoryBackend {
        &*self.shm
    }

    /// Get the raw pointer to the mapped region
    pub fn region_ptr(&self) -> *const SharedRegion {
        self.region
    }

    /// True if this mapping created (and zeroed) the segment
    pub fn is_creator(&self) -> bool {
        self.shm.created()
    }

    /// Current head counter for `direction`
    pub fn head(&self, direction: Direction) -> i32 {
        // Safety: region is valid for the lifetime of self
        unsafe {
            match direction {
                Direction::AtoB => (*self.region).head_a_to_b.load(Ordering::Acquire),
                Direction::BtoA => (*self.region).head_b_to_a.load(Ordering::Acquire),
            }
        }
    }
}
