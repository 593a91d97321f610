use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::MIDI_BASE_BAUD;

/// Wire code for a line-rate multiplier.
///
/// The code is what travels in SPEED_NEG and SPEED_PUSH payloads; the
/// display label is for humans. 1x is the cold-boot rate and the safe
/// fail-back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, TryFromPrimitive, IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum SpeedCode {
    #[default]
    #[strum(to_string = "1x")]
    X1 = 1,
    #[strum(to_string = "2x")]
    X2 = 2,
    #[strum(to_string = "3.3x")]
    X3_3 = 3,
    #[strum(to_string = "4x")]
    X4 = 4,
    #[strum(to_string = "5x")]
    X5 = 5,
    #[strum(to_string = "6.6x")]
    X6_6 = 6,
    #[strum(to_string = "8x")]
    X8 = 7,
    #[strum(to_string = "10x")]
    X10 = 8,
    #[strum(to_string = "13.3x")]
    X13_3 = 9,
    #[strum(to_string = "16x")]
    X16 = 10,
    #[strum(to_string = "20x")]
    X20 = 11,
}

impl SpeedCode {
    /// Nominal UART baud rate for this multiplier.
    ///
    /// The fractional multipliers use the truncated products the protocol
    /// ships on the wire (31250 * 3.3 = 103125), not the exact fractions.
    pub fn baud(self) -> u32 {
        match self {
            SpeedCode::X1 => MIDI_BASE_BAUD,
            SpeedCode::X2 => 62_500,
            SpeedCode::X3_3 => 103_125,
            SpeedCode::X4 => 125_000,
            SpeedCode::X5 => 156_250,
            SpeedCode::X6_6 => 206_250,
            SpeedCode::X8 => 250_000,
            SpeedCode::X10 => 312_500,
            SpeedCode::X13_3 => 415_625,
            SpeedCode::X16 => 500_000,
            SpeedCode::X20 => 625_000,
        }
    }

    /// The next higher code, used to pick a wire-test rate with headroom
    /// over the target. 20x has no higher neighbour and returns itself.
    pub fn next_higher(self) -> SpeedCode {
        SpeedCode::try_from(u8::from(self) + 1).unwrap_or(self)
    }
}
