//! Mapping of a telemetry record onto CAN frames
//!
//! Two deployed layouts exist for the same record. Which one a downstream
//! consumer expects depends on the target, so the layout is a config choice
//! and never inferred.
//!
//! ```text
//! three_frame   0x501 alpha,beta   0x502 gamma,accel_x   0x503 accel_y,accel_z
//! four_frame    0x501 alpha,beta   0x502 gamma
//!               0x503 accel_x,accel_y                    0x504 accel_z
//! ```

use super::frame::CanFrame;
use crate::constants::CAN_ID_BASE;
use crate::protocol::TelemetryRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record field, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Alpha,
    Beta,
    Gamma,
    AccelX,
    AccelY,
    AccelZ,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Gamma => "gamma",
            Self::AccelX => "accel_x",
            Self::AccelY => "accel_y",
            Self::AccelZ => "accel_z",
        }
    }

    fn value(&self, record: &TelemetryRecord) -> f32 {
        match self {
            Self::Alpha => record.alpha,
            Self::Beta => record.beta,
            Self::Gamma => record.gamma,
            Self::AccelX => record.accel_x,
            Self::AccelY => record.accel_y,
            Self::AccelZ => record.accel_z,
        }
    }
}

/// One frame of a layout: identifier and the fields it carries
#[derive(Debug, Clone, Copy)]
pub struct FrameSlot {
    pub id: u16,
    pub fields: &'static [Field],
}

impl FrameSlot {
    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.fields.len() * 4
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

const THREE_FRAME: &[FrameSlot] = &[
    FrameSlot {
        id: CAN_ID_BASE,
        fields: &[Field::Alpha, Field::Beta],
    },
    FrameSlot {
        id: CAN_ID_BASE + 1,
        fields: &[Field::Gamma, Field::AccelX],
    },
    FrameSlot {
        id: CAN_ID_BASE + 2,
        fields: &[Field::AccelY, Field::AccelZ],
    },
];

const FOUR_FRAME: &[FrameSlot] = &[
    FrameSlot {
        id: CAN_ID_BASE,
        fields: &[Field::Alpha, Field::Beta],
    },
    FrameSlot {
        id: CAN_ID_BASE + 1,
        fields: &[Field::Gamma],
    },
    FrameSlot {
        id: CAN_ID_BASE + 2,
        fields: &[Field::AccelX, Field::AccelY],
    },
    FrameSlot {
        id: CAN_ID_BASE + 3,
        fields: &[Field::AccelZ],
    },
];

/// Wire layout variant
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum FrameLayout {
    /// Three 8-byte frames, 0x501..=0x503
    ThreeFrame,
    /// 8/4/8/4-byte frames, 0x501..=0x504
    #[default]
    FourFrame,
}

impl FrameLayout {
    /// Frames of this layout, in transmit order
    pub fn slots(&self) -> &'static [FrameSlot] {
        match self {
            Self::ThreeFrame => THREE_FRAME,
            Self::FourFrame => FOUR_FRAME,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.slots().len()
    }

    pub fn frame_ids(&self) -> Vec<u16> {
        self.slots().iter().map(|s| s.id).collect()
    }

    /// Build the frames for one record, in transmit order
    pub fn frames(&self, record: &TelemetryRecord) -> Vec<CanFrame> {
        self.slots()
            .iter()
            .map(|slot| {
                let values: Vec<f32> = slot.fields.iter().map(|f| f.value(record)).collect();
                CanFrame::from_floats(slot.id, &values)
            })
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreeFrame => "three_frame",
            Self::FourFrame => "four_frame",
        }
    }
}

impl fmt::Display for FrameLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
