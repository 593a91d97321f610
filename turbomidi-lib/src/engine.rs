//! The TurboMIDI negotiation state machine.
//!
//! One engine drives one port. The master side walks REQ → ANSWER →
//! NEG → ACK and, for uncertified targets, a two-phase wire test at a
//! strictly higher rate before committing. The responder side answers
//! those frames as they come out of the parser. A periodic [`TurboMidi::pump`]
//! drains the receive buffer, drops the link back to 1x after 300 ms of
//! silence, and emits an Active Sensing keep-alive every 250 ms while
//! the link runs above 1x.

use strum_macros::Display;
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::capability::SpeedCaps;
use crate::constants::*;
use crate::error::TurboMidiError;
use crate::frame::{CommandId, FrameParser, VendorFrame};
use crate::port::MidiPort;
use crate::speed::SpeedCode;

/// Which side of the negotiation this engine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Initiates negotiation, never answers capability requests.
    Master,
    /// Answers requests, never initiates.
    Responder,
    /// Accepts both code paths.
    Either,
}

/// Responder progress through the two-phase wire test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TestPhase {
    Idle,
    AwaitingTest,
    AwaitingTest2,
}

/// Synchronous notifications out of the engine.
///
/// Both methods default to no-ops. They fire from inside engine calls;
/// implementations must not call back into the engine.
pub trait TurboMidiObserver {
    /// The link speed changed; `speed` is now in effect on the port.
    fn on_speed_changed(&mut self, speed: SpeedCode) {
        let _ = speed;
    }

    /// A peer asked for our capabilities (a SPEED_REQ was answered).
    fn on_speed_request(&mut self) {}
}

const RX_CHUNK: usize = 256;

/// The TurboMIDI protocol engine.
///
/// Single-threaded and cooperative: all progress happens inside
/// [`negotiate`](Self::negotiate), [`push`](Self::push) and
/// [`pump`](Self::pump), and the caller serializes those. The port is
/// held exclusively for the engine's lifetime.
pub struct TurboMidi<P: MidiPort> {
    port: P,
    role: Role,
    local_caps: SpeedCaps,
    current_speed: SpeedCode,
    last_rx_ms: u32,
    last_keepalive_tx_ms: u32,
    test_phase: TestPhase,
    pending_test: SpeedCode,
    pending_target: SpeedCode,
    parser: FrameParser,
    observer: Option<Box<dyn TurboMidiObserver>>,
}

impl<P: MidiPort> TurboMidi<P> {
    /// Create an engine on `port`. The link starts at 1x, which is always
    /// supported and certified and never appears in the capability masks.
    pub fn new(port: P, role: Role) -> Self {
        Self {
            port,
            role,
            local_caps: SpeedCaps::new(),
            current_speed: SpeedCode::X1,
            last_rx_ms: 0,
            last_keepalive_tx_ms: 0,
            test_phase: TestPhase::Idle,
            pending_test: SpeedCode::X1,
            pending_target: SpeedCode::X1,
            parser: FrameParser::new(),
            observer: None,
        }
    }

    /// Advertise `code` in capability answers; `certified` marks it usable
    /// on this pairing without a wire test.
    pub fn set_supported_speed(&mut self, code: SpeedCode, certified: bool) {
        self.local_caps.add(code, certified);
    }

    /// Install the notification observer, replacing any previous one.
    pub fn set_observer(&mut self, observer: Box<dyn TurboMidiObserver>) {
        self.observer = Some(observer);
    }

    /// The multiplier currently in effect on the port.
    pub fn current_speed(&self) -> SpeedCode {
        self.current_speed
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_caps(&self) -> &SpeedCaps {
        &self.local_caps
    }

    /// Master-side negotiation to `target`.
    ///
    /// Requests the peer's capabilities, checks the target against them,
    /// and runs the two-phase wire test at the next higher code when the
    /// peer has not certified the target. Each reply gate waits at most
    /// `timeout_ms` (the protocol default is
    /// [`DEFAULT_NEGOTIATION_TIMEOUT_MS`](crate::constants::DEFAULT_NEGOTIATION_TIMEOUT_MS)),
    /// polling in ~1 ms steps and still dispatching unrelated inbound
    /// frames. On failure the engine is back at 1x iff it had retuned
    /// during the attempt; otherwise its speed is untouched.
    pub fn negotiate(&mut self, target: SpeedCode, timeout_ms: u32) -> Result<(), TurboMidiError> {
        if self.role == Role::Responder {
            return Err(TurboMidiError::NotMaster(self.role));
        }

        debug!("negotiating {target} (per-phase timeout {timeout_ms} ms)");
        self.send_frame(&VendorFrame::speed_req());
        let answer = self.wait_for(CommandId::SpeedAnswer, timeout_ms)?;
        let wire: [u8; 4] = answer.payload.as_ref().try_into()?;
        let peer_caps = SpeedCaps::from_wire(wire);

        if !peer_caps.supports(target) {
            debug!("peer does not support {target}");
            return Err(TurboMidiError::UnsupportedSpeed(target));
        }

        let test = if target == SpeedCode::X1 || peer_caps.is_certified(target) {
            target
        } else {
            let test = target.next_higher();
            if test == target {
                // Uncertified top speed: nothing faster left to prove
                // headroom with.
                return Err(TurboMidiError::NoTestSpeed(target));
            }
            test
        };

        self.send_frame(&VendorFrame::speed_neg(test, target));
        self.wait_for(CommandId::SpeedAck, timeout_ms)?;

        if test != target {
            self.run_wire_test(test, timeout_ms)?;
        }

        self.set_speed(target);
        debug!("negotiation complete, link at {target}");
        Ok(())
    }

    /// Unilaterally push the link to `target`: one PUSH frame, then an
    /// immediate retune. The responder is expected to follow. Ignored in
    /// responder role.
    pub fn push(&mut self, target: SpeedCode) {
        if self.role == Role::Responder {
            return;
        }
        debug!("pushing link to {target}");
        self.send_frame(&VendorFrame::speed_push(target));
        self.set_speed(target);
    }

    /// Periodic service call: drain the receive buffer once, then run the
    /// fail-back and keep-alive timers. Both timers are disabled at 1x.
    pub fn pump(&mut self) {
        for frame in self.drain_rx() {
            self.handle_frame(frame);
        }

        let now = self.port.millis();
        if self.current_speed != SpeedCode::X1 {
            if now.wrapping_sub(self.last_rx_ms) > FAILBACK_TIMEOUT_MS {
                debug!("peer silent for over {FAILBACK_TIMEOUT_MS} ms, dropping back to 1x");
                self.test_phase = TestPhase::Idle;
                self.set_speed(SpeedCode::X1);
            } else if now.wrapping_sub(self.last_keepalive_tx_ms) > KEEPALIVE_INTERVAL_MS {
                self.port.send(&[ACTIVE_SENSING]);
                self.last_keepalive_tx_ms = now;
            }
        }
    }

    /// Two-phase probe at `test` speed. Leaves the link at `test` on
    /// success (the caller commits the target) and back at 1x on failure.
    fn run_wire_test(&mut self, test: SpeedCode, timeout_ms: u32) -> Result<(), TurboMidiError> {
        // Breathing time: let both UARTs drain before the rate switch.
        self.port.send(&[0u8; BREATHING_PAD_LEN]);
        self.port.sleep_ms(BREATHING_PAD_SETTLE_MS);
        self.set_speed(test);

        self.send_frame(&VendorFrame::speed_test());
        match self.wait_for(CommandId::SpeedResult, timeout_ms) {
            Ok(result) if result.has_test_pattern() => {}
            Ok(_) => {
                debug!("wire test at {test} echoed a corrupted pattern");
                self.set_speed(SpeedCode::X1);
                return Err(TurboMidiError::TestPatternMismatch(test));
            }
            Err(err) => {
                self.set_speed(SpeedCode::X1);
                return Err(err);
            }
        }

        self.send_frame(&VendorFrame::speed_test2());
        if let Err(err) = self.wait_for(CommandId::SpeedResult2, timeout_ms) {
            self.set_speed(SpeedCode::X1);
            return Err(err);
        }
        Ok(())
    }

    /// Poll until a `want` frame arrives or `timeout_ms` elapses. Every
    /// other frame is dispatched to the responder table, so nested
    /// handling (say, answering a REQ mid-negotiation) keeps working.
    fn wait_for(&mut self, want: CommandId, timeout_ms: u32) -> Result<VendorFrame, TurboMidiError> {
        let start = self.port.millis();
        loop {
            let mut found = None;
            for frame in self.drain_rx() {
                if found.is_none() && frame.command == want {
                    found = Some(frame);
                } else {
                    self.handle_frame(frame);
                }
            }
            if let Some(frame) = found {
                return Ok(frame);
            }
            if self.port.millis().wrapping_sub(start) >= timeout_ms {
                return Err(TurboMidiError::Timeout(want));
            }
            self.port.sleep_ms(1);
        }
    }

    /// One non-blocking read, fed byte-at-a-time through the parser.
    /// Every inbound byte refreshes the silence timer.
    fn drain_rx(&mut self) -> Vec<VendorFrame> {
        let mut buf = [0u8; RX_CHUNK];
        let n = self.port.receive(&mut buf);
        let mut frames = Vec::new();
        if n == 0 {
            return frames;
        }
        self.last_rx_ms = self.port.millis();
        trace!("rx {} bytes: {:02x?}", n, &buf[..n]);
        for &byte in &buf[..n] {
            if let Some(frame) = self.parser.push(byte) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Responder-side protocol table.
    fn handle_frame(&mut self, frame: VendorFrame) {
        trace!("handling {:?}", frame.command);
        match frame.command {
            CommandId::SpeedReq => {
                if self.role != Role::Master {
                    self.send_frame(&VendorFrame::speed_answer(&self.local_caps));
                    if let Some(observer) = self.observer.as_mut() {
                        observer.on_speed_request();
                    }
                }
            }
            CommandId::SpeedNeg => {
                if self.role == Role::Master {
                    return;
                }
                let Ok(test) = SpeedCode::try_from(frame.payload[0]) else { return };
                let Ok(target) = SpeedCode::try_from(frame.payload[1]) else { return };
                if !self.local_caps.supports(target) {
                    debug!("ignoring negotiation for unsupported {target}");
                    return;
                }
                self.send_frame(&VendorFrame::speed_ack());
                if target == SpeedCode::X1 || (self.local_caps.is_certified(target) && test == target) {
                    self.test_phase = TestPhase::Idle;
                    self.set_speed(target);
                } else {
                    self.pending_test = test;
                    self.pending_target = target;
                    self.test_phase = TestPhase::AwaitingTest;
                }
            }
            CommandId::SpeedTest => {
                let armed = self.role != Role::Master
                    && self.test_phase == TestPhase::AwaitingTest
                    && frame.has_test_pattern();
                if armed {
                    self.set_speed(self.pending_test);
                    self.send_frame(&VendorFrame::speed_result());
                    self.test_phase = TestPhase::AwaitingTest2;
                } else {
                    // An unexpected or corrupted probe must not leave the
                    // link stranded at an untested rate.
                    self.test_phase = TestPhase::Idle;
                    self.set_speed(SpeedCode::X1);
                }
            }
            CommandId::SpeedTest2 => {
                if self.test_phase == TestPhase::AwaitingTest2 {
                    self.send_frame(&VendorFrame::speed_result2());
                    self.test_phase = TestPhase::Idle;
                    self.set_speed(self.pending_target);
                }
            }
            CommandId::SpeedPush => {
                let Ok(code) = SpeedCode::try_from(frame.payload[0]) else { return };
                if self.local_caps.supports(code) {
                    self.set_speed(code);
                } else {
                    debug!("ignoring push to unsupported {code}");
                }
            }
            CommandId::SpeedAnswer | CommandId::SpeedAck | CommandId::SpeedResult | CommandId::SpeedResult2 => {
                // Master-side replies outside a negotiation gate.
            }
        }
    }

    fn send_frame(&mut self, frame: &VendorFrame) {
        let bytes = frame.to_bytes();
        trace!("tx {} bytes: {:02x?}", bytes.len(), bytes.as_ref());
        self.port.send(&bytes);
    }

    /// The single retune point: field, UART, observer, in that order.
    fn set_speed(&mut self, speed: SpeedCode) {
        self.current_speed = speed;
        self.port.set_baud(speed.baud());
        debug!("link speed set to {speed} ({} baud)", speed.baud());
        if let Some(observer) = self.observer.as_mut() {
            observer.on_speed_changed(speed);
        }
    }
}
