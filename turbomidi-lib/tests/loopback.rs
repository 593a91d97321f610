//! End-to-end negotiation between two live engines over paired queues

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use turbomidi_lib::{MidiPort, Role, SpeedCode, TurboMidi};

/// One end of a full-duplex in-memory link with a real clock.
struct PipePort {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx: Arc<Mutex<VecDeque<u8>>>,
    epoch: Instant,
    #[allow(dead_code)]
    baud: u32,
}

impl MidiPort for PipePort {
    fn send(&mut self, data: &[u8]) {
        self.tx.lock().unwrap().extend(data.iter().copied());
    }

    fn receive(&mut self, buf: &mut [u8]) -> usize {
        let mut queue = self.rx.lock().unwrap();
        let mut count = 0;
        while count < buf.len() {
            match queue.pop_front() {
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
        self.epoch.elapsed().as_millis() as u32
    }

    fn set_baud(&mut self, baud: u32) {
        self.baud = baud;
    }

    fn sleep_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

fn pipe_pair() -> (PipePort, PipePort) {
    let upstream = Arc::new(Mutex::new(VecDeque::new()));
    let downstream = Arc::new(Mutex::new(VecDeque::new()));
    let epoch = Instant::now();
    let a = PipePort {
        rx: upstream.clone(),
        tx: downstream.clone(),
        epoch,
        baud: 31_250,
    };
    let b = PipePort {
        rx: downstream,
        tx: upstream,
        epoch,
        baud: 31_250,
    };
    (a, b)
}

fn spawn_responder(
    port: PipePort,
    caps: Vec<(SpeedCode, bool)>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<SpeedCode> {
    thread::spawn(move || {
        let mut responder = TurboMidi::new(port, Role::Responder);
        for (code, certified) in caps {
            responder.set_supported_speed(code, certified);
        }
        while !stop.load(Ordering::Relaxed) {
            responder.pump();
            thread::sleep(Duration::from_micros(200));
        }
        responder.current_speed()
    })
}

#[test]
fn uncertified_speed_negotiates_through_the_wire_test() {
    let (master_port, responder_port) = pipe_pair();
    let stop = Arc::new(AtomicBool::new(false));
    let responder = spawn_responder(responder_port, vec![(SpeedCode::X4, false)], stop.clone());

    let mut master = TurboMidi::new(master_port, Role::Master);
    let outcome = master.negotiate(SpeedCode::X4, 1_000);
    stop.store(true, Ordering::Relaxed);
    let responder_speed = responder.join().unwrap();

    assert!(outcome.is_ok(), "negotiation failed: {outcome:?}");
    assert_eq!(master.current_speed(), SpeedCode::X4);
    assert_eq!(responder_speed, SpeedCode::X4, "both ends settle on the target");
}

#[test]
fn certified_speed_negotiates_without_a_wire_test() {
    let (master_port, responder_port) = pipe_pair();
    let stop = Arc::new(AtomicBool::new(false));
    let responder = spawn_responder(responder_port, vec![(SpeedCode::X10, true)], stop.clone());

    let mut master = TurboMidi::new(master_port, Role::Master);
    let outcome = master.negotiate(SpeedCode::X10, 1_000);
    stop.store(true, Ordering::Relaxed);
    let responder_speed = responder.join().unwrap();

    assert!(outcome.is_ok(), "negotiation failed: {outcome:?}");
    assert_eq!(master.current_speed(), SpeedCode::X10);
    assert_eq!(responder_speed, SpeedCode::X10);
}

#[test]
fn negotiation_against_a_deaf_peer_times_out() {
    let (master_port, _responder_port) = pipe_pair();

    let mut master = TurboMidi::new(master_port, Role::Master);
    let started = Instant::now();
    let outcome = master.negotiate(SpeedCode::X4, 50);

    assert!(outcome.is_err());
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(master.current_speed(), SpeedCode::X1);
}
