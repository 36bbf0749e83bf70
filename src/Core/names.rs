// OS object names derived from a chat channel

use crate::Ring::Buffer::layout::Direction;
use std::io;

/// Prefix shared by every object a channel creates.
pub const NAMESPACE_PREFIX: &str = "/ShmChat_";

/// Channel used when the operator leaves it blank.
pub const DEFAULT_CHANNEL: &str = "demo";

// NAME_MAX is 255 and glibc prepends "sem." to semaphore names
const MAX_CHANNEL_LEN: usize = 200;

/// The three names one channel maps to: the segment and one semaphore per direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectNames {
    pub segment: String,
    pub a_to_b: String,
    pub b_to_a: String,
}

impl ObjectNames {
    /// Derive names for `channel`, e.g. `demo` gives `/ShmChat_demo_map`,
    /// `/ShmChat_demo_AtoB` and `/ShmChat_demo_BtoA`.
    pub fn for_channel(channel: &str) -> io::Result<Self> {
        validate_channel(channel)?;
        let base = format!("{}{}", NAMESPACE_PREFIX, channel);
        Ok(Self {
            segment: format!("{}_map", base),
            a_to_b: format!("{}_{}", base, Direction::AtoB.suffix()),
            b_to_a: format!("{}_{}", base, Direction::BtoA.suffix()),
        })
    }

    /// Name of the semaphore that signals `direction`.
    pub fn semaphore(&self, direction: Direction) -> &str {
        match direction {
            Direction::AtoB => &self.a_to_b,
            Direction::BtoA => &self.b_to_a,
        }
    }
}

/// A channel must be non-empty, slash-free and short enough to name POSIX objects.
pub fn validate_channel(channel: &str) -> io::Result<()> {
    if channel.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Channel name is empty",
        ));
    }
    if channel.contains('/') || channel.contains('\0') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Channel name {:?} may not contain '/' or NUL", channel),
        ));
    }
    if channel.len() > MAX_CHANNEL_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Channel name longer than {} bytes", MAX_CHANNEL_LEN),
        ));
    }
    Ok(())
}
