//! TCP socket transport
//!
//! One stream between exactly two peers. The server accepts a single client
//! and then stops listening; the client makes a single connect attempt.
//!
//! # Wire Format
//!
//! Raw UTF-8 bytes. No length prefix, no delimiter, no handshake beyond TCP
//! itself. A read may therefore return two sends glued together, or half of
//! one; each read becomes one received message as-is.
//!
//! # Connection Lifecycle
//!
//! ```text
//! Offline --start--> Starting (Listening) --accept/connect ok--> Connected
//! Connected --peer closes or stop--> Offline
//! Starting --accept/connect fails--> Offline
//! ```

use super::events::{ConnectionState, EventSink};
use super::lifecycle::{AtomicState, Lifecycle, RunningFlag};
use super::Transport;
use crate::config::{SocketRole, TransportKind};
use crate::error::{ChatError, Result};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Receive buffer size; one read never yields more than this many bytes
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Poll interval of the non-blocking accept loop, bounding how long `stop` waits on it
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on one outbound connect attempt
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// How often a pending connect re-checks the running flag
pub const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// State shared between the caller and the worker/receiver threads
struct SocketShared {
    state: Arc<AtomicState>,
    /// Established stream. Its lock is the send-side lock.
    conn: Mutex<Option<TcpStream>>,
    /// Clone of `conn` outside the send lock, so a blocked write can be cut off
    interrupt: Mutex<Option<TcpStream>>,
    events: EventSink,
    role: SocketRole,
}

impl SocketShared {
    /// Move to Offline, announcing it only when leaving Connected
    fn go_offline(&self) {
        if self.state.swap(ConnectionState::Offline) == ConnectionState::Connected {
            self.events.status(ConnectionState::Offline);
        }
    }

    /// Shut the stream down without waiting for a send in progress
    fn interrupt(&self) {
        if let Some(stream) = self.interrupt.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn close_connection(&self) {
        self.interrupt();
        if let Some(stream) = self.conn.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// One side of a TCP chat session
pub struct SocketTransport {
    role: SocketRole,
    host: Ipv4Addr,
    port: u16,
    lifecycle: Lifecycle<()>,
    shared: Arc<SocketShared>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl SocketTransport {
    /// Server bound to all interfaces on `port`. Port 0 picks a free one;
    /// read it back with [`local_addr`](Self::local_addr) after `start`.
    pub fn server(port: u16, events: EventSink) -> Self {
        Self::new(SocketRole::Server, Ipv4Addr::UNSPECIFIED, port, events)
    }

    /// Client connecting to `host:port`
    pub fn client(host: Ipv4Addr, port: u16, events: EventSink) -> Self {
        Self::new(SocketRole::Client, host, port, events)
    }

    fn new(role: SocketRole, host: Ipv4Addr, port: u16, events: EventSink) -> Self {
        let lifecycle = Lifecycle::new();
        let shared = Arc::new(SocketShared {
            state: Arc::clone(lifecycle.state()),
            conn: Mutex::new(None),
            interrupt: Mutex::new(None),
            events,
            role,
        });
        Self {
            role,
            host,
            port,
            lifecycle,
            shared,
            local_addr: Mutex::new(None),
        }
    }

    pub fn role(&self) -> SocketRole {
        self.role
    }

    /// Address the server listener is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    fn fail_start(&self, what: &str, err: std::io::Error) -> ChatError {
        self.lifecycle.cancel();
        self.shared.state.store(ConnectionState::Offline);
        log::error!("{}: {}", what, err);
        self.shared.events.log(format!("{} ({})", what, err));
        ChatError::resource(what, err)
    }

    fn start_server(&self) -> Result<()> {
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port);
        let listener = match TcpListener::bind(addr) {
            Ok(listener) => listener,
            Err(e) => return Err(self.fail_start("Bind failed. Is the port in use?", e)),
        };
        // Non-blocking so the accept loop can observe the running flag
        if let Err(e) = listener.set_nonblocking(true) {
            return Err(self.fail_start("Failed to configure listener", e));
        }
        let local = listener.local_addr().ok();
        *self.local_addr.lock() = local;
        let port = local.map(|a| a.port()).unwrap_or(self.port);

        self.shared.state.store(ConnectionState::Listening);
        log::info!("TCP server listening on {}", addr);
        self.shared.events.log(format!("Listening on port {}...", port));
        self.shared.events.log("Waiting for a client to connect...");

        let shared = Arc::clone(&self.shared);
        let running = self.lifecycle.running_flag();
        let receiver_slot = self.lifecycle.receiver_slot();
        let handle = thread::Builder::new()
            .name("socket-accept".to_string())
            .spawn(move || {
                if let Some((stream, peer)) = accept_one(&listener, &running, &shared) {
                    drop(listener);
                    let notice = format!("Connected: {}", peer);
                    if let Some(receiver) = on_connected(stream, notice, &running, &shared) {
                        *receiver_slot.lock() = Some(receiver);
                    }
                }
            });
        match handle {
            Ok(handle) => {
                self.lifecycle.set_worker(handle);
                Ok(())
            }
            Err(e) => Err(self.fail_start("Failed to spawn accept thread", e)),
        }
    }

    fn start_client(&self) -> Result<()> {
        let addr = SocketAddrV4::new(self.host, self.port);
        self.shared
            .events
            .log(format!("Connecting to {}:{}...", self.host, self.port));

        let shared = Arc::clone(&self.shared);
        let running = self.lifecycle.running_flag();
        let receiver_slot = self.lifecycle.receiver_slot();
        let handle = thread::Builder::new()
            .name("socket-connect".to_string())
            .spawn(move || match connect_cancellable(addr, &running) {
                Ok(Some(stream)) => {
                    if let Some(receiver) = on_connected(stream, "Connected!".to_string(), &running, &shared) {
                        *receiver_slot.lock() = Some(receiver);
                    }
                }
                Ok(None) => {
                    log::debug!("Connect to {} cancelled", addr);
                    shared.go_offline();
                }
                Err(e) => {
                    if running.swap(false, Ordering::AcqRel) {
                        log::error!("Connect to {} failed: {}", addr, e);
                        shared
                            .events
                            .log(format!("Connect failed. Check IP/port. ({})", e));
                    }
                    shared.go_offline();
                }
            });
        match handle {
            Ok(handle) => {
                self.lifecycle.set_worker(handle);
                Ok(())
            }
            Err(e) => Err(self.fail_start("Failed to spawn connect thread", e)),
        }
    }
}

impl Transport for SocketTransport {
    fn start(&self) -> Result<()> {
        if !self.lifecycle.try_begin() {
            log::warn!("Socket transport already running");
            self.shared.events.log("Already running.");
            return Err(ChatError::AlreadyRunning);
        }
        self.shared.state.store(ConnectionState::Starting);

        match self.role {
            SocketRole::Server => self.start_server(),
            SocketRole::Client => self.start_client(),
        }
    }

    fn send(&self, text: &str) -> Result<()> {
        let mut conn = self.shared.conn.lock();
        let stream = match conn.as_mut() {
            Some(stream) if self.shared.state.load() == ConnectionState::Connected => stream,
            _ => {
                self.shared.events.log("Not connected.");
                return Err(ChatError::NotConnected);
            }
        };
        if text.is_empty() {
            return Ok(());
        }

        if let Err(e) = stream.write_all(text.as_bytes()) {
            log::error!("Send failed: {}", e);
            self.shared.events.log(format!("Send failed: {}", e));
            return Err(ChatError::Io(e));
        }
        drop(conn);

        self.shared.events.message_sent(text, self.role.label());
        Ok(())
    }

    fn stop(&self) {
        self.lifecycle.cancel();
        // Unblocks the receiver's read and any blocked write; the accept and
        // connect loops notice the flag on their next poll
        self.shared.close_connection();
        self.lifecycle.join_worker();
        self.lifecycle.join_receiver();
        *self.local_addr.lock() = None;
        self.shared.go_offline();
        log::debug!("Socket transport stopped");
    }

    fn state(&self) -> ConnectionState {
        self.shared.state.load()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Socket
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Poll the listener until one client arrives or the flag is cleared.
fn accept_one(
    listener: &TcpListener,
    running: &RunningFlag,
    shared: &SocketShared,
) -> Option<(TcpStream, SocketAddr)> {
    while running.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                // Accepted sockets may inherit non-blocking mode
                if let Err(e) = stream.set_nonblocking(false) {
                    log::error!("Failed to set socket to blocking mode: {}", e);
                    shared.events.log(format!("Accept failed. ({})", e));
                    running.store(false, Ordering::Release);
                    shared.go_offline();
                    return None;
                }
                return Some((stream, peer));
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                log::error!("Accept error: {}", e);
                shared.events.log(format!("Accept failed. ({})", e));
                running.store(false, Ordering::Release);
                shared.go_offline();
                return None;
            }
        }
    }
    log::debug!("Accept loop cancelled");
    None
}

/// Connect to `addr`, giving up early once the running flag is cleared.
///
/// Returns `Ok(None)` when cancelled. The socket is connected non-blocking
/// and polled, so `stop` never waits out the full connect timeout.
#[cfg(target_os = "linux")]
fn connect_cancellable(addr: SocketAddrV4, running: &RunningFlag) -> io::Result<Option<TcpStream>> {
    use std::os::unix::io::{AsRawFd, FromRawFd};
    use std::time::Instant;

    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // Owns the fd from here on, so every early return closes it
    let stream = unsafe { TcpStream::from_raw_fd(fd) };
    stream.set_nonblocking(true)?;

    let mut sockaddr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    sockaddr.sin_family = libc::AF_INET as libc::sa_family_t;
    sockaddr.sin_port = addr.port().to_be();
    sockaddr.sin_addr = libc::in_addr {
        s_addr: u32::from(*addr.ip()).to_be(),
    };

    let rc = unsafe {
        libc::connect(
            stream.as_raw_fd(),
            &sockaddr as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINPROGRESS) {
            return Err(err);
        }

        let deadline = Instant::now() + CONNECT_TIMEOUT;
        loop {
            if !running.load(Ordering::Acquire) {
                return Ok(None);
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "connection timed out"));
            }
            let mut pfd = libc::pollfd {
                fd: stream.as_raw_fd(),
                events: libc::POLLOUT,
                revents: 0,
            };
            let ready = unsafe { libc::poll(&mut pfd, 1, CONNECT_POLL_INTERVAL.as_millis() as libc::c_int) };
            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if ready > 0 {
                break;
            }
        }
        // Writable means finished; SO_ERROR says whether it worked
        if let Some(err) = stream.take_error()? {
            return Err(err);
        }
    }

    stream.set_nonblocking(false)?;
    if !running.load(Ordering::Acquire) {
        return Ok(None);
    }
    Ok(Some(stream))
}

#[cfg(not(target_os = "linux"))]
fn connect_cancellable(addr: SocketAddrV4, running: &RunningFlag) -> io::Result<Option<TcpStream>> {
    let stream = TcpStream::connect_timeout(&SocketAddr::V4(addr), CONNECT_TIMEOUT)?;
    if !running.load(Ordering::Acquire) {
        return Ok(None);
    }
    Ok(Some(stream))
}

/// Publish an established stream and spawn its receiver.
fn on_connected(
    stream: TcpStream,
    notice: String,
    running: &RunningFlag,
    shared: &Arc<SocketShared>,
) -> Option<thread::JoinHandle<()>> {
    let clones = stream
        .try_clone()
        .and_then(|reader| stream.try_clone().map(|interrupt| (reader, interrupt)));
    let (reader, interrupt) = match clones {
        Ok(clones) => clones,
        Err(e) => {
            log::error!("Failed to clone stream: {}", e);
            shared.events.log(format!("Connection setup failed. ({})", e));
            let _ = stream.shutdown(Shutdown::Both);
            running.store(false, Ordering::Release);
            shared.go_offline();
            return None;
        }
    };

    *shared.interrupt.lock() = Some(interrupt);
    *shared.conn.lock() = Some(stream);
    // stop() may have run while we were accepting; it cleared the flag before
    // taking the connection, so one of us is guaranteed to close it
    if !running.load(Ordering::Acquire) {
        shared.close_connection();
        return None;
    }

    shared.state.store(ConnectionState::Connected);
    log::info!("TCP peer connected: {:?}", reader.peer_addr());
    shared.events.log(notice);
    shared.events.status(ConnectionState::Connected);

    let running_rx = Arc::clone(running);
    let shared_rx = Arc::clone(shared);
    match thread::Builder::new()
        .name("socket-receiver".to_string())
        .spawn(move || receive_loop(reader, running_rx, shared_rx))
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::error!("Failed to spawn receiver: {}", e);
            shared.events.log(format!("Connection setup failed. ({})", e));
            running.store(false, Ordering::Release);
            shared.close_connection();
            shared.go_offline();
            None
        }
    }
}

/// Receiver thread body: one event per successful read until EOF or error.
fn receive_loop(mut stream: TcpStream, running: RunningFlag, shared: Arc<SocketShared>) {
    let sender = shared.role.other().label();
    let mut buffer = [0u8; RECV_BUFFER_SIZE];

    loop {
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buffer[..n]).into_owned();
                shared.events.message_received(text, sender);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                log::debug!("Read error: {}", e);
                break;
            }
        }
    }

    // Only a peer-initiated close is news; after stop() it is expected
    if running.swap(false, Ordering::AcqRel) {
        log::info!("TCP peer disconnected");
        shared.events.log(format!("[!] Disconnected. ({})", ChatError::PeerDisconnected));
    }
    shared.close_connection();
    shared.go_offline();
}
