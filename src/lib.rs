// Module naming follows project convention (Ring = shared-memory ring protocol)
#[allow(non_snake_case)]
pub mod Ring {
    pub mod Buffer {
        pub mod Buffer;
        pub mod Buffer_impl;
        pub mod layout;
        pub use Buffer::RingBuffer; // re-export for stable path
        pub use layout::{Direction, SharedRegion, RING_CAPACITY};
    }
    pub mod Structs {
        pub mod Message_Structs;
        pub use Message_Structs::ChatMessage; // re-export for stable path
    }
    pub mod builder;
    pub mod consumer;
    pub mod producer;
    pub use builder::{unlink_channel, ChannelBuilder, ChannelPair};
    pub use consumer::Consumer;
    pub use producer::Producer;
}
#[allow(non_snake_case)]
pub mod Core {
    pub mod SharedMemory;
    pub use SharedMemory::{SharedMemoryBackend, RawHandle, create_shared_memory, attach_shared_memory, open_shared_memory};
    pub mod names;
    pub mod region;
    pub mod semaphore;
}
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}
#[allow(non_snake_case)]
pub mod Transport;

pub mod config;
pub mod error;
pub mod ffi;
pub mod session;

pub use config::{ChatConfig, PeerRole, SocketRole, TransportKind};
pub use error::{ChatError, Result};
pub use session::{send, start, stop, ConnectionHandle};
pub use Transport::{ChatEvent, ConnectionState};
