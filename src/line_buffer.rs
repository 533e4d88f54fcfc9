//! Line assembly for the module's serial output.

use crate::config::LINE_CAPACITY;
use heapless::{String, Vec};

/// One complete line, terminator removed.
pub type Line = String<LINE_CAPACITY>;

/// Accumulates serial bytes into `\r`/`\n` terminated lines.
pub struct LineAssembler {
    buf: Vec<u8, LINE_CAPACITY>,
    /// Current line overflowed; drop bytes until the next terminator.
    discarding: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            discarding: false,
        }
    }

    /// Feed one byte. Returns the line it completes, if any.
    ///
    /// Empty lines (the `\n` of a `\r\n` pair) and lines that are not UTF-8
    /// are skipped.
    pub fn push(&mut self, byte: u8) -> Option<Line> {
        match byte {
            b'\r' | b'\n' => {
                let overflowed = core::mem::replace(&mut self.discarding, false);
                let line = core::str::from_utf8(&self.buf)
                    .ok()
                    .filter(|s| !s.is_empty() && !overflowed)
                    .and_then(|s| Line::try_from(s).ok());
                self.buf.clear();
                line
            }
            _ if self.discarding => None,
            _ => {
                if self.buf.push(byte).is_err() {
                    warn!("RX line over {} bytes dropped", LINE_CAPACITY);
                    self.buf.clear();
                    self.discarding = true;
                }
                None
            }
        }
    }

    /// Bytes of the current, unfinished line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }
}
