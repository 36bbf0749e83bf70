// Start/stop bookkeeping shared by both transports

use super::events::ConnectionState;
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Running flag shared with the background threads
pub type RunningFlag = Arc<CachePadded<AtomicBool>>;

/// Connection state readable from any thread
#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Replace the state and return what it was
    pub fn swap(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }
}

/// Owns the running flag and the join handles of one transport instance.
///
/// At most one worker thread (socket accept/connect) and one receiver
/// thread exist per instance. The receiver slot is shared so the worker can
/// park the receiver it spawns there.
pub struct Lifecycle<R: Send + 'static = ()> {
    running: RunningFlag,
    state: Arc<AtomicState>,
    worker: Mutex<Option<JoinHandle<()>>>,
    receiver: Arc<Mutex<Option<JoinHandle<R>>>>,
}

impl<R: Send + 'static> Default for Lifecycle<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> Lifecycle<R> {
    pub fn new() -> Self {
        Self {
            running: Arc::new(CachePadded::new(AtomicBool::new(false))),
            state: Arc::new(AtomicState::new(ConnectionState::Offline)),
            worker: Mutex::new(None),
            receiver: Arc::new(Mutex::new(None)),
        }
    }

    /// Flip Offline to running. Returns false if already running.
    ///
    /// Threads left over from a session that ended on its own are joined
    /// first; they have already finished or are about to.
    pub fn try_begin(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.join_worker();
        self.join_receiver();
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clear the running flag. Returns whether it was set.
    pub fn cancel(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    pub fn running_flag(&self) -> RunningFlag {
        Arc::clone(&self.running)
    }

    pub fn state(&self) -> &Arc<AtomicState> {
        &self.state
    }

    pub fn set_worker(&self, handle: JoinHandle<()>) {
        *self.worker.lock() = Some(handle);
    }

    pub fn set_receiver(&self, handle: JoinHandle<R>) {
        *self.receiver.lock() = Some(handle);
    }

    pub fn receiver_slot(&self) -> Arc<Mutex<Option<JoinHandle<R>>>> {
        Arc::clone(&self.receiver)
    }

    pub fn join_worker(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }

    /// Join the receiver and return its result, or None if there was none or it panicked.
    pub fn join_receiver(&self) -> Option<R> {
        let handle = self.receiver.lock().take();
        match handle?.join() {
            Ok(value) => Some(value),
            Err(_) => {
                log::error!("Receiver thread panicked");
                None
            }
        }
    }
}
