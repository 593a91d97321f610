use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::trace;

use crate::capability::SpeedCaps;
use crate::constants::*;
use crate::error::TurboMidiError;
use crate::speed::SpeedCode;

/// Command identifier at index 6 of every vendor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum CommandId {
    SpeedReq = 0x10,
    SpeedAnswer = 0x11,
    SpeedNeg = 0x12,
    SpeedAck = 0x13,
    SpeedTest = 0x14,
    SpeedResult = 0x15,
    SpeedTest2 = 0x16,
    SpeedResult2 = 0x17,
    SpeedPush = 0x20,
}

impl CommandId {
    /// Exact on-wire frame length for this command, delimiters included.
    pub fn frame_len(self) -> usize {
        match self {
            CommandId::SpeedReq | CommandId::SpeedAck | CommandId::SpeedTest2 | CommandId::SpeedResult2 => 8,
            CommandId::SpeedAnswer => 12,
            CommandId::SpeedNeg => 10,
            CommandId::SpeedTest | CommandId::SpeedResult => 16,
            CommandId::SpeedPush => 9,
        }
    }
}

/// One complete vendor message, stripped of its SysEx shell.
///
/// A `VendorFrame` only exists with a payload whose length matches its
/// command (`CommandId::frame_len`); both the builders and the
/// `TryFrom` validation enforce that.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorFrame {
    pub command: CommandId,
    pub payload: Bytes,
}

impl VendorFrame {
    fn new(command: CommandId, payload: Bytes) -> Self {
        Self { command, payload }
    }

    pub fn speed_req() -> Self {
        Self::new(CommandId::SpeedReq, Bytes::new())
    }

    pub fn speed_answer(caps: &SpeedCaps) -> Self {
        Self::new(CommandId::SpeedAnswer, Bytes::copy_from_slice(&caps.to_wire()))
    }

    pub fn speed_neg(test: SpeedCode, target: SpeedCode) -> Self {
        Self::new(
            CommandId::SpeedNeg,
            Bytes::copy_from_slice(&[u8::from(test), u8::from(target)]),
        )
    }

    pub fn speed_ack() -> Self {
        Self::new(CommandId::SpeedAck, Bytes::new())
    }

    pub fn speed_test() -> Self {
        Self::new(CommandId::SpeedTest, Bytes::from_static(&TEST_PATTERN))
    }

    pub fn speed_result() -> Self {
        Self::new(CommandId::SpeedResult, Bytes::from_static(&TEST_PATTERN))
    }

    pub fn speed_test2() -> Self {
        Self::new(CommandId::SpeedTest2, Bytes::new())
    }

    pub fn speed_result2() -> Self {
        Self::new(CommandId::SpeedResult2, Bytes::new())
    }

    pub fn speed_push(target: SpeedCode) -> Self {
        Self::new(CommandId::SpeedPush, Bytes::copy_from_slice(&[u8::from(target)]))
    }

    /// Whether the payload carries the exact wire-test pattern.
    pub fn has_test_pattern(&self) -> bool {
        self.payload[..] == TEST_PATTERN
    }

    /// Emit the full on-wire frame: `F0 | manufacturer ID | cmd | payload | F7`.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN + self.payload.len());
        buf.put_u8(SYSEX_START);
        buf.put_slice(&ELEKTRON_ID);
        buf.put_u8(self.command.into());
        buf.put_slice(&self.payload);
        buf.put_u8(SYSEX_END);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for VendorFrame {
    type Error = TurboMidiError;

    /// Validate a complete delimited frame.
    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        if raw.len() < MIN_FRAME_LEN {
            return Err(TurboMidiError::InvalidFrame(format!(
                "{} bytes is below the {MIN_FRAME_LEN}-byte minimum",
                raw.len()
            )));
        }
        if raw[0] != SYSEX_START || raw[raw.len() - 1] != SYSEX_END {
            return Err(TurboMidiError::InvalidFrame("missing SysEx delimiters".to_string()));
        }
        if raw[1..6] != ELEKTRON_ID {
            return Err(TurboMidiError::InvalidFrame("manufacturer ID mismatch".to_string()));
        }
        let command = CommandId::try_from(raw[6])?;
        if raw.len() != command.frame_len() {
            return Err(TurboMidiError::InvalidFrame(format!(
                "{:?} frames are {} bytes, got {}",
                command,
                command.frame_len(),
                raw.len()
            )));
        }
        Ok(VendorFrame::new(command, Bytes::copy_from_slice(&raw[7..raw.len() - 1])))
    }
}

/// Incremental SysEx scanner feeding the engine one byte at a time.
///
/// Active Sensing is transparent, a fresh `F0` discards any partial
/// frame, and a stray status byte inside a frame invalidates it. Only
/// well-formed Elektron vendor frames come out; everything else is
/// dropped silently.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one inbound byte. Returns a frame when this byte completes one.
    pub fn push(&mut self, byte: u8) -> Option<VendorFrame> {
        match byte {
            SYSEX_START => {
                self.buffer.clear();
                self.buffer.push(byte);
                None
            }
            ACTIVE_SENSING => None,
            SYSEX_END => {
                if self.buffer.is_empty() {
                    return None;
                }
                self.buffer.push(byte);
                let frame = match VendorFrame::try_from(self.buffer.as_slice()) {
                    Ok(frame) => Some(frame),
                    Err(err) => {
                        trace!("dropping frame: {err}");
                        None
                    }
                };
                self.buffer.clear();
                frame
            }
            byte if byte & 0x80 != 0 => {
                if !self.buffer.is_empty() {
                    trace!("status byte 0x{byte:02x} inside a frame, discarding it");
                    self.buffer.clear();
                }
                None
            }
            byte => {
                if !self.buffer.is_empty() {
                    if self.buffer.len() >= MAX_FRAME_BUFFER {
                        trace!("frame exceeded {MAX_FRAME_BUFFER} bytes, discarding it");
                        self.buffer.clear();
                    } else {
                        self.buffer.push(byte);
                    }
                }
                None
            }
        }
    }
}
