#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::speed::SpeedCode;

/// The four 7-bit capability bytes carried by a SPEED_ANSWER.
///
/// Codes 2..=8 live in `mask1` bits 0..=6, codes 9..=11 in `mask2` bits
/// 0..=2. `cert1`/`cert2` mirror that layout and flag the speeds known to
/// work on this pairing without a wire test; every cert bit is therefore
/// also a mask bit. 1x is implicit: always supported, always certified,
/// never on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedCaps {
    pub mask1: u8,
    pub mask2: u8,
    pub cert1: u8,
    pub cert2: u8,
}

/// Bit position of a code, split across the low and high mask bytes.
enum CapBit {
    Low(u8),
    High(u8),
    Implicit,
}

impl CapBit {
    fn of(code: SpeedCode) -> CapBit {
        match u8::from(code) {
            raw @ 2..=8 => CapBit::Low(raw - 2),
            raw @ 9..=11 => CapBit::High(raw - 9),
            _ => CapBit::Implicit,
        }
    }
}

impl SpeedCaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `code` as supported, and as certified when `certified`.
    /// Idempotent. 1x is implicit and a no-op here.
    pub fn add(&mut self, code: SpeedCode, certified: bool) {
        match CapBit::of(code) {
            CapBit::Low(bit) => {
                self.mask1 |= 1 << bit;
                if certified {
                    self.cert1 |= 1 << bit;
                }
            }
            CapBit::High(bit) => {
                self.mask2 |= 1 << bit;
                if certified {
                    self.cert2 |= 1 << bit;
                }
            }
            CapBit::Implicit => {}
        }
    }

    /// Whether `code` is advertised as usable on this link.
    pub fn supports(&self, code: SpeedCode) -> bool {
        match CapBit::of(code) {
            CapBit::Low(bit) => self.mask1 & (1 << bit) != 0,
            CapBit::High(bit) => self.mask2 & (1 << bit) != 0,
            CapBit::Implicit => true,
        }
    }

    /// Whether `code` is guaranteed to work without a wire test.
    pub fn is_certified(&self, code: SpeedCode) -> bool {
        match CapBit::of(code) {
            CapBit::Low(bit) => self.cert1 & (1 << bit) != 0,
            CapBit::High(bit) => self.cert2 & (1 << bit) != 0,
            CapBit::Implicit => true,
        }
    }

    /// Pack as the SPEED_ANSWER payload: mask1, mask2, cert1, cert2.
    pub fn to_wire(self) -> [u8; 4] {
        [self.mask1, self.mask2, self.cert1, self.cert2]
    }

    /// Unpack a SPEED_ANSWER payload.
    pub fn from_wire(bytes: [u8; 4]) -> Self {
        Self {
            mask1: bytes[0],
            mask2: bytes[1],
            cert1: bytes[2],
            cert2: bytes[3],
        }
    }
}
