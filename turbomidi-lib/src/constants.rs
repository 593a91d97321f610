// Protocol constants for TurboMIDI

/// Start-of-SysEx delimiter
pub const SYSEX_START: u8 = 0xF0;

/// End-of-SysEx delimiter
pub const SYSEX_END: u8 = 0xF7;

/// MIDI Active Sensing, sent bare (unframed) as the keep-alive pulse
pub const ACTIVE_SENSING: u8 = 0xFE;

/// Elektron manufacturer ID opening every vendor frame payload
pub const ELEKTRON_ID: [u8; 5] = [0x00, 0x20, 0x3C, 0x00, 0x00];

/// Smallest valid vendor frame: shell plus command byte, no payload
pub const MIN_FRAME_LEN: usize = 8;

/// Accumulation cap for a single inbound frame; anything longer is
/// discarded (the largest vendor frame is 16 bytes)
pub const MAX_FRAME_BUFFER: usize = 64;

/// Round-trip pattern carried by the first wire-test phase
pub const TEST_PATTERN: [u8; 8] = [0x55, 0x55, 0x55, 0x55, 0x00, 0x00, 0x00, 0x00];

/// Baseline MIDI baud rate (1x)
pub const MIDI_BASE_BAUD: u32 = 31_250;

/// Silence threshold at elevated speed before dropping back to 1x
pub const FAILBACK_TIMEOUT_MS: u32 = 300;

/// Active Sensing send interval at elevated speed
pub const KEEPALIVE_INTERVAL_MS: u32 = 250;

/// Default per-phase reply wait during negotiation
pub const DEFAULT_NEGOTIATION_TIMEOUT_MS: u32 = 30;

/// Zero bytes sent ahead of a wire-test retune so the peer's UART drains
pub const BREATHING_PAD_LEN: usize = 16;

/// Settle delay after the breathing pad, before the rate switch
pub const BREATHING_PAD_SETTLE_MS: u32 = 10;
