//! Line assembler for the telemetry text protocol
//!
//! The upstream hop sends ASCII records terminated by '\n'. Windows-style
//! "\r\n" endings are tolerated: '\r' is swallowed without being stored.
//!
//! The buffer is bounded. Once full, further bytes are dropped until the next
//! terminator, which then delivers the truncated content.

use crate::constants::DEFAULT_LINE_CAPACITY;

/// Accumulates bytes into '\n'-terminated lines
pub struct LineAssembler {
    buffer: Vec<u8>,
    /// Maximum stored bytes per line (terminator excluded)
    capacity: usize,
    /// Set once a byte has been dropped for the current line
    overflowed: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_CAPACITY)
    }
}

impl LineAssembler {
    /// Create an assembler holding at most `capacity` bytes per line
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    /// Feed one byte, returning the completed line on '\n'
    ///
    /// The returned line may be empty (bare terminator).
    pub fn feed(&mut self, byte: u8) -> Option<Vec<u8>> {
        match byte {
            b'\n' => {
                if self.overflowed {
                    tracing::debug!(
                        capacity = self.capacity,
                        "Line exceeded buffer capacity, delivering truncated content"
                    );
                    self.overflowed = false;
                }
                Some(std::mem::replace(
                    &mut self.buffer,
                    Vec::with_capacity(self.capacity),
                ))
            }
            b'\r' => None,
            _ => {
                if self.buffer.len() < self.capacity {
                    self.buffer.push(byte);
                } else {
                    self.overflowed = true;
                }
                None
            }
        }
    }

    /// Feed a chunk of bytes and collect every completed line in order
    pub fn feed_slice(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        data.iter().filter_map(|&b| self.feed(b)).collect()
    }

    /// Bytes currently buffered for the incomplete line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Maximum stored bytes per line
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop any partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }
}
