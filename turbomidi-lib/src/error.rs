use num_enum::TryFromPrimitiveError;
use std::array::TryFromSliceError;
use thiserror::Error;

use crate::engine::Role;
use crate::frame::CommandId;
use crate::speed::SpeedCode;

/// The primary error type for the `turbomidi-lib` library.
#[derive(Error, Debug)]
pub enum TurboMidiError {
    #[error("negotiation is a master operation, engine role is {0}")]
    NotMaster(Role),

    #[error("timed out waiting for {0:?}")]
    Timeout(CommandId),

    #[error("peer does not support {0}")]
    UnsupportedSpeed(SpeedCode),

    #[error("no test speed above {0}: an uncertified target needs a strictly higher probe rate")]
    NoTestSpeed(SpeedCode),

    #[error("wire test pattern came back corrupted at {0}")]
    TestPatternMismatch(SpeedCode),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("invalid speed code 0x{0:02x}")]
    InvalidSpeedCode(u8),

    #[error("unknown command byte 0x{0:02x}")]
    UnknownCommand(u8),
}

impl From<TryFromPrimitiveError<SpeedCode>> for TurboMidiError {
    fn from(err: TryFromPrimitiveError<SpeedCode>) -> Self {
        TurboMidiError::InvalidSpeedCode(err.number)
    }
}

impl From<TryFromPrimitiveError<CommandId>> for TurboMidiError {
    fn from(err: TryFromPrimitiveError<CommandId>) -> Self {
        TurboMidiError::UnknownCommand(err.number)
    }
}

impl From<TryFromSliceError> for TurboMidiError {
    fn from(_: TryFromSliceError) -> Self {
        TurboMidiError::InvalidFrame("payload length does not match the command".to_string())
    }
}
