// One slot of a chat ring

use lazy_static::lazy_static;
use std::time::Instant;

/// Capacity of the text buffer in UTF-16 code units, terminator included.
pub const TEXT_CAPACITY: usize = 240;

/// Longest text that fits in a slot; the last unit is reserved for the terminator.
pub const MAX_TEXT_UNITS: usize = TEXT_CAPACITY - 1;

lazy_static! {
    static ref TICK_EPOCH: Instant = Instant::now();
}

/// Milliseconds since the first tick was taken in this process, wrapping at `u32::MAX`.
pub fn current_tick() -> u32 {
    TICK_EPOCH.elapsed().as_millis() as u32
}

/// A chat message as stored in shared memory.
///
/// `#[repr(C)]` with no length field: the text is null-terminated within
/// `TEXT_CAPACITY`, so a reader recovers the exact length by scanning.
/// Both peers must agree on this layout byte for byte.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct ChatMessage {
    /// Producer's tick when the slot was written. Informational, never validated.
    pub produced_at_tick: u32,
    pub text: [u16; TEXT_CAPACITY],
}

impl Default for ChatMessage {
    fn default() -> Self {
        Self {
            produced_at_tick: 0,
            text: [0; TEXT_CAPACITY],
        }
    }
}

impl ChatMessage {
    /// Build a slot image from `text`, truncating to `MAX_TEXT_UNITS` code units.
    pub fn new(produced_at_tick: u32, text: &str) -> Self {
        let mut msg = Self {
            produced_at_tick,
            ..Self::default()
        };
        for (dst, unit) in msg.text.iter_mut().zip(encode_truncated(text)) {
            *dst = unit;
        }
        msg
    }

    /// Code units up to (not including) the first terminator.
    pub fn units(&self) -> &[u16] {
        let len = self
            .text
            .iter()
            .position(|&u| u == 0)
            .unwrap_or(TEXT_CAPACITY);
        &self.text[..len]
    }

    /// Decode the stored text. A surrogate pair cut by truncation decodes as U+FFFD.
    pub fn text(&self) -> String {
        String::from_utf16_lossy(self.units())
    }
}

/// UTF-16 encoding of `text`, cut to at most `MAX_TEXT_UNITS` units.
pub fn encode_truncated(text: &str) -> impl Iterator<Item = u16> + '_ {
    text.encode_utf16().take(MAX_TEXT_UNITS)
}

impl std::fmt::Debug for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatMessage")
            .field("produced_at_tick", &self.produced_at_tick)
            .field("text", &self.text())
            .finish()
    }
}
