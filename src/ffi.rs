use crate::config::{ChatConfig, PeerRole};
use crate::error::ChatError;
use crate::session::ConnectionHandle;
use crate::Transport::ChatEvent;
use std::ffi::{c_char, CStr};
use std::ptr;

// Error codes
const CHAT_SUCCESS: i32 = 0;
const CHAT_ERROR_NULL_POINTER: i32 = -1;
const CHAT_ERROR_INVALID_ARG: i32 = -2;
const CHAT_ERROR_RESOURCE: i32 = -3;
const CHAT_ERROR_NOT_CONNECTED: i32 = -4;
const CHAT_ERROR_EMPTY: i32 = -5;
const CHAT_ERROR_INTERNAL: i32 = -6;

// Event kinds returned by chat_poll_event
const CHAT_EVENT_MESSAGE_RECEIVED: i32 = 1;
const CHAT_EVENT_MESSAGE_SENT: i32 = 2;
const CHAT_EVENT_STATUS_CHANGED: i32 = 3;
const CHAT_EVENT_LOG: i32 = 4;

/// Handle to a running chat session (opaque pointer)
pub struct ChatHandle {
    inner: ConnectionHandle,
}

fn error_code(err: &ChatError) -> i32 {
    match err {
        ChatError::NotConnected | ChatError::PeerDisconnected => CHAT_ERROR_NOT_CONNECTED,
        ChatError::InvalidConfig(_) | ChatError::Config(_) => CHAT_ERROR_INVALID_ARG,
        ChatError::Resource { .. } | ChatError::Io(_) => CHAT_ERROR_RESOURCE,
        ChatError::AlreadyRunning => CHAT_ERROR_INTERNAL,
    }
}

fn start_handle(config: ChatConfig) -> *mut ChatHandle {
    match crate::session::start(config) {
        Ok(inner) => Box::into_raw(Box::new(ChatHandle { inner })),
        Err(e) => {
            log::error!("FFI Error: Failed to start chat: {}", e);
            ptr::null_mut()
        }
    }
}

/// Read a C string argument, or None if it is null or not UTF-8.
unsafe fn c_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

/// Copy `text` into `buf` as a NUL-terminated string, truncating on a char boundary.
unsafe fn write_c_str(text: &str, buf: *mut c_char, cap: usize) {
    if buf.is_null() || cap == 0 {
        return;
    }
    let mut len = text.len().min(cap - 1);
    while !text.is_char_boundary(len) {
        len -= 1;
    }
    ptr::copy_nonoverlapping(text.as_ptr() as *const c_char, buf, len);
    *buf.add(len) = 0;
}

// -----------------------------------------------------------------------------
// Session API
// -----------------------------------------------------------------------------

/// Start a shared-memory session.
///
/// # Arguments
/// * `channel` - Channel name (NUL-terminated UTF-8). NULL means "demo".
/// * `peer_b` - Non-zero to join as peer B, zero for peer A.
///
/// # Returns
/// * Pointer to `ChatHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn chat_start_shared_memory(channel: *const c_char, peer_b: i32) -> *mut ChatHandle {
    let channel = if channel.is_null() {
        crate::Core::names::DEFAULT_CHANNEL
    } else {
        match unsafe { c_str(channel) } {
            Some(channel) => channel,
            None => return ptr::null_mut(),
        }
    };
    let peer = if peer_b != 0 { PeerRole::B } else { PeerRole::A };
    start_handle(ChatConfig::shared_memory(channel, peer))
}

/// Start a socket session.
///
/// # Arguments
/// * `server` - Non-zero to listen, zero to connect.
/// * `host` - Numeric IPv4 address for the client (NUL-terminated). Ignored by the server; NULL means 127.0.0.1.
/// * `port` - TCP port.
///
/// # Returns
/// * Pointer to `ChatHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn chat_start_socket(server: i32, host: *const c_char, port: u16) -> *mut ChatHandle {
    let config = if server != 0 {
        ChatConfig::socket_server(port)
    } else {
        let host = if host.is_null() {
            crate::config::DEFAULT_HOST
        } else {
            match unsafe { c_str(host) } {
                Some(host) => host,
                None => return ptr::null_mut(),
            }
        };
        ChatConfig::socket_client(host, port)
    };
    start_handle(config)
}

/// Send a message.
///
/// # Arguments
/// * `handle` - Pointer to `ChatHandle`.
/// * `text` - NUL-terminated UTF-8 text.
///
/// # Returns
/// * 0 on success, negative error code otherwise.
#[no_mangle]
pub extern "C" fn chat_send(handle: *mut ChatHandle, text: *const c_char) -> i32 {
    if handle.is_null() || text.is_null() {
        return CHAT_ERROR_NULL_POINTER;
    }

    let session = unsafe { &(*handle).inner };
    let text = match unsafe { c_str(text) } {
        Some(text) => text,
        None => return CHAT_ERROR_INVALID_ARG,
    };

    match session.send(text) {
        Ok(()) => CHAT_SUCCESS,
        Err(e) => error_code(&e),
    }
}

/// Take the next pending event without blocking.
///
/// # Arguments
/// * `handle` - Pointer to `ChatHandle`.
/// * `text_buf` / `text_cap` - Receives the message text, status label or log line.
/// * `sender_buf` / `sender_cap` - Receives the sender label for message events. May be NULL.
///
/// # Returns
/// * Event kind (1 received, 2 sent, 3 status, 4 log) on success.
/// * CHAT_ERROR_EMPTY if no event is pending.
/// * Text longer than a buffer is truncated.
#[no_mangle]
pub extern "C" fn chat_poll_event(
    handle: *mut ChatHandle,
    text_buf: *mut c_char,
    text_cap: usize,
    sender_buf: *mut c_char,
    sender_cap: usize,
) -> i32 {
    if handle.is_null() || text_buf.is_null() {
        return CHAT_ERROR_NULL_POINTER;
    }

    let session = unsafe { &(*handle).inner };
    let event = match session.events().try_recv() {
        Ok(event) => event,
        Err(_) => return CHAT_ERROR_EMPTY,
    };

    let (kind, text, sender) = match &event {
        ChatEvent::MessageReceived { text, sender } => (CHAT_EVENT_MESSAGE_RECEIVED, text.as_str(), sender.as_str()),
        ChatEvent::MessageSent { text, sender } => (CHAT_EVENT_MESSAGE_SENT, text.as_str(), sender.as_str()),
        ChatEvent::StatusChanged(state) => (CHAT_EVENT_STATUS_CHANGED, state.label(), ""),
        ChatEvent::Log(line) => (CHAT_EVENT_LOG, line.as_str(), ""),
    };

    unsafe {
        write_c_str(text, text_buf, text_cap);
        write_c_str(sender, sender_buf, sender_cap);
    }
    kind
}

/// Stop the session and free its handle.
#[no_mangle]
pub extern "C" fn chat_stop(handle: *mut ChatHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle); // Stops on drop
        }
    }
}

/// Remove a channel's shared memory objects from the system.
///
/// # Returns
/// * 0 on success (including when nothing existed), negative error code otherwise.
#[no_mangle]
pub extern "C" fn chat_unlink_channel(channel: *const c_char) -> i32 {
    let channel = match unsafe { c_str(channel) } {
        Some(channel) => channel,
        None => return CHAT_ERROR_NULL_POINTER,
    };
    match crate::Ring::unlink_channel(channel) {
        Ok(()) => CHAT_SUCCESS,
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => CHAT_ERROR_INVALID_ARG,
        Err(_) => CHAT_ERROR_RESOURCE,
    }
}
