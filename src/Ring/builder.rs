use super::{Consumer, Producer};
use crate::config::PeerRole;
use crate::Core::names::{ObjectNames, DEFAULT_CHANNEL};
use crate::Core::region::RegionMapping;
use crate::Core::semaphore::NamedSemaphore;
use crate::Ring::Buffer::layout::Direction;
use std::sync::Arc;

/// Opens one side of a shared-memory chat channel.
pub struct ChannelBuilder {
    channel: String,
    peer: PeerRole,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            peer: PeerRole::A,
        }
    }
}

/// Both halves of an open channel plus the mapping they share.
pub struct ChannelPair {
    pub names: ObjectNames,
    pub mapping: Arc<RegionMapping>,
    pub producer: Producer,
    pub consumer: Consumer,
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_peer(mut self, peer: PeerRole) -> Self {
        self.peer = peer;
        self
    }

    /// Create or open the segment and both semaphores.
    ///
    /// Anything opened before a failure is closed again when this returns.
    pub fn build(self) -> std::io::Result<ChannelPair> {
        let names = ObjectNames::for_channel(&self.channel)?;
        let mapping = Arc::new(RegionMapping::open(&names.segment)?);

        let incoming = Arc::new(NamedSemaphore::open(
            names.semaphore(Direction::received_by(self.peer)),
        )?);
        let outgoing = Arc::new(NamedSemaphore::open(
            names.semaphore(Direction::sent_by(self.peer)),
        )?);

        log::debug!(
            "Opened channel {:?} as {} (creator: {})",
            self.channel,
            self.peer,
            mapping.is_creator()
        );

        Ok(ChannelPair {
            producer: Producer::new(Arc::clone(&mapping), outgoing, self.peer),
            consumer: Consumer::new(Arc::clone(&mapping), incoming, self.peer),
            mapping,
            names,
        })
    }
}

/// Remove the segment and both semaphores of `channel` from the system namespace.
///
/// Open handles keep working; the next `build` creates fresh objects.
/// Missing objects are not an error.
pub fn unlink_channel(channel: &str) -> std::io::Result<()> {
    let names = ObjectNames::for_channel(channel)?;
    let results = [
        crate::Core::SharedMemory::unlink_shared_memory(&names.segment),
        crate::Core::semaphore::unlink_semaphore(&names.a_to_b),
        crate::Core::semaphore::unlink_semaphore(&names.b_to_a),
    ];
    for result in results {
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
