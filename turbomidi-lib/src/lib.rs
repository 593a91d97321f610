pub mod capability;
pub mod constants;
pub mod engine;
pub mod error;
pub mod frame;
pub mod port;
pub mod speed;

// Re-export the engine surface for easy access
pub use capability::SpeedCaps;
pub use engine::{Role, TurboMidi, TurboMidiObserver};
pub use error::TurboMidiError;
pub use port::MidiPort;
pub use speed::SpeedCode;
