//! Classic CAN data frame carrying packed f32 values

use crate::constants::{CAN_MAX_DATA_LEN, CAN_MAX_STANDARD_ID};
use std::fmt;

/// Standard-ID CAN data frame (up to 8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: u16,
    len: u8,
    data: [u8; CAN_MAX_DATA_LEN],
}

impl CanFrame {
    /// Build a frame from raw bytes
    ///
    /// Returns `None` for an identifier above 0x7FF or more than 8 bytes.
    pub fn new(id: u16, payload: &[u8]) -> Option<Self> {
        if id > CAN_MAX_STANDARD_ID || payload.len() > CAN_MAX_DATA_LEN {
            return None;
        }
        let mut data = [0u8; CAN_MAX_DATA_LEN];
        data[..payload.len()].copy_from_slice(payload);
        Some(Self {
            id,
            len: payload.len() as u8,
            data,
        })
    }

    /// Pack one or two f32 values back-to-back, little-endian
    pub(crate) fn from_floats(id: u16, values: &[f32]) -> Self {
        debug_assert!(values.len() <= CAN_MAX_DATA_LEN / 4);
        let mut data = [0u8; CAN_MAX_DATA_LEN];
        for (chunk, v) in data.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        Self {
            id,
            len: (values.len() * 4) as u8,
            data,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload bytes (length `len()`)
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// Payload read back as little-endian f32 values
    pub fn floats(&self) -> Vec<f32> {
        self.data()
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X} [{}]", self.id, self.len)?;
        for b in self.data() {
            write!(f, " {:02X}", b)?;
        }
        Ok(())
    }
}
