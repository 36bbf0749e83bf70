use crate::Core::SharedMemory::SharedMemoryBackend;
use crate::Ring::Buffer::layout::{Direction, SharedRegion, REGION_SIZE};
use crate::Ring::Buffer::RingBuffer;
use std::io;
mod debug;
mod getters;

/// A process-local mapping of one channel's [`SharedRegion`].
///
/// The first process to open a channel creates the segment and zeroes it;
/// every later opener maps it as found, head counters and slots included.
pub struct RegionMapping {
    shm: Box<dyn SharedMemoryBackend>,
    region: *mut SharedRegion,
}

impl RegionMapping {
    /// Create or open the segment `name` and view it as a [`SharedRegion`].
    pub fn open(name: &str) -> io::Result<Self> {
        let shm = crate::Core::SharedMemory::open_shared_memory(name, REGION_SIZE).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "Failed to open shared region:\n\
                    ├─ Name:        {name}\n\
                    ├─ Region size: {REGION_SIZE}\n\
                    ╰─ Error: {e}"
                ),
            )
        })?;
        Self::from_backend(shm)
    }

    /// Wrap an already mapped backend. Zeroes the region if the backend created it.
    pub fn from_backend(shm: Box<dyn SharedMemoryBackend>) -> io::Result<Self> {
        if shm.size() < REGION_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Shared memory too small for region: {} < {}",
                    shm.size(),
                    REGION_SIZE
                ),
            ));
        }

        let region = shm.as_ptr() as *mut SharedRegion;
        if (region as usize) % std::mem::align_of::<SharedRegion>() != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Shared memory not properly aligned",
            ));
        }

        // Only the creator initialises; a second opener must not wipe live heads
        if shm.created() {
            unsafe {
                std::ptr::write_bytes(shm.as_ptr(), 0, REGION_SIZE);
            }
            log::debug!("Created and zeroed shared region {}", shm.name());
        } else {
            log::debug!("Attached to existing shared region {}", shm.name());
        }

        Ok(Self { shm, region })
    }

    /// Ring view for one direction. Valid while this mapping is alive.
    pub fn ring(&self, direction: Direction) -> RingBuffer {
        unsafe { RingBuffer::for_direction(self.region, direction) }
    }
}

// Access to the region goes through atomics and volatile slot copies
unsafe impl Send for RegionMapping {}
unsafe impl Sync for RegionMapping {}
