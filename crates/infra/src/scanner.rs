//! Keyboard-wedge barcode scanner input.
//!
//! Scanners type the code as keystrokes and finish with a carriage return
//! or newline. The buffer accumulates keys until a terminator arrives, then
//! yields the canonicalized code.

use moldtrack_core::UniqueCode;

/// Accumulates scanner keystrokes into complete codes.
#[derive(Debug, Default)]
pub struct ScanBuffer {
    buffer: String,
}

impl ScanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one keystroke.
    ///
    /// Returns the completed code when a terminator arrives. A terminator on
    /// an empty (or whitespace-only) buffer yields nothing; stray Enter
    /// presses between scans are common and must not produce lookups.
    pub fn push_key(&mut self, key: char) -> Option<UniqueCode> {
        if key == '\n' || key == '\r' {
            let raw = core::mem::take(&mut self.buffer);
            return UniqueCode::parse(&raw).ok();
        }

        self.buffer.push(key);
        None
    }

    /// Discard any partially scanned input.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
