//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use turbomidi_lib::capability::SpeedCaps;
#[allow(unused_imports)]
pub use turbomidi_lib::constants::*;
#[allow(unused_imports)]
pub use turbomidi_lib::engine::{Role, TurboMidi, TurboMidiObserver};
#[allow(unused_imports)]
pub use turbomidi_lib::error::TurboMidiError;
#[allow(unused_imports)]
pub use turbomidi_lib::frame::{CommandId, FrameParser, VendorFrame};
#[allow(unused_imports)]
pub use turbomidi_lib::port::MidiPort;
#[allow(unused_imports)]
pub use turbomidi_lib::speed::SpeedCode;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Vec<u8> {
    hex::decode(hex_data).expect("Failed to decode hex")
}

#[derive(Debug, Default)]
pub struct MockPortState {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub now_ms: u32,
    pub baud: u32,
    pub baud_changes: Vec<u32>,
    replies: Vec<(u8, Vec<u8>)>,
}

/// Scriptable in-memory port with a manual clock.
///
/// `sleep_ms` advances the clock so the engine's timeout loops terminate
/// deterministically. Scripted replies land in the receive queue the
/// moment a frame with the matching command byte is sent, which lets a
/// blocking negotiation run against a canned peer.
#[derive(Clone, Default)]
pub struct MockPort(pub Rc<RefCell<MockPortState>>);

#[allow(dead_code)]
impl MockPort {
    pub fn new() -> Self {
        let port = Self::default();
        port.0.borrow_mut().baud = 31_250;
        port
    }

    pub fn inject(&self, bytes: &[u8]) {
        self.0.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Queue `reply` for injection when a frame carrying `trigger_cmd`
    /// goes out. Each scripted reply fires once, in registration order.
    pub fn reply_with(&self, trigger_cmd: u8, reply: &[u8]) {
        self.0.borrow_mut().replies.push((trigger_cmd, reply.to_vec()));
    }

    pub fn tx(&self) -> Vec<u8> {
        self.0.borrow().tx.clone()
    }

    pub fn clear_tx(&self) {
        self.0.borrow_mut().tx.clear();
    }

    pub fn baud(&self) -> u32 {
        self.0.borrow().baud
    }

    pub fn baud_changes(&self) -> Vec<u32> {
        self.0.borrow().baud_changes.clone()
    }

    pub fn set_now(&self, ms: u32) {
        self.0.borrow_mut().now_ms = ms;
    }

    pub fn advance(&self, ms: u32) {
        self.0.borrow_mut().now_ms += ms;
    }

    /// All complete SysEx frames written to the port, in order.
    pub fn tx_frames(&self) -> Vec<Vec<u8>> {
        let state = self.0.borrow();
        let mut frames = Vec::new();
        let mut current: Option<Vec<u8>> = None;
        for &byte in &state.tx {
            if byte == 0xF0 {
                current = Some(vec![byte]);
                continue;
            }
            if let Some(frame) = current.as_mut() {
                frame.push(byte);
                if byte == 0xF7 {
                    frames.push(current.take().unwrap());
                }
            }
        }
        frames
    }

    /// The last complete SysEx frame written to the port, if any.
    pub fn last_frame(&self) -> Option<Vec<u8>> {
        self.tx_frames().pop()
    }
}

impl MidiPort for MockPort {
    fn send(&mut self, data: &[u8]) {
        let mut state = self.0.borrow_mut();
        state.tx.extend_from_slice(data);
        // Fire a scripted reply when a complete frame with a matching
        // command byte just went out.
        if data.len() >= 8 && data[0] == 0xF0 && data[data.len() - 1] == 0xF7 {
            let cmd = data[6];
            if let Some(pos) = state.replies.iter().position(|(trigger, _)| *trigger == cmd) {
                let (_, reply) = state.replies.remove(pos);
                state.rx.extend(reply);
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> usize {
        let mut state = self.0.borrow_mut();
        let mut count = 0;
        while count < buf.len() {
            match state.rx.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    fn millis(&mut self) -> u32 {
        self.0.borrow().now_ms
    }

    fn set_baud(&mut self, baud: u32) {
        let mut state = self.0.borrow_mut();
        state.baud = baud;
        state.baud_changes.push(baud);
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.0.borrow_mut().now_ms += ms;
    }
}

/// Observer that records every notification for later assertions.
#[derive(Clone, Default)]
pub struct Recorder {
    pub speed_changes: Rc<RefCell<Vec<SpeedCode>>>,
    pub requests: Rc<RefCell<usize>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn speeds(&self) -> Vec<SpeedCode> {
        self.speed_changes.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        *self.requests.borrow()
    }
}

impl TurboMidiObserver for Recorder {
    fn on_speed_changed(&mut self, speed: SpeedCode) {
        self.speed_changes.borrow_mut().push(speed);
    }

    fn on_speed_request(&mut self) {
        *self.requests.borrow_mut() += 1;
    }
}
