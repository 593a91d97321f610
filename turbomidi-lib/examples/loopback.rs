//! Two in-process engines negotiating over paired in-memory queues.
//!
//! The responder supports 4x uncertified, so the master has to prove
//! headroom with the two-phase wire test at 5x before committing.
//!
//! Run with: cargo run --example loopback

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use turbomidi_lib::{MidiPort, Role, SpeedCode, TurboMidi, TurboMidiObserver};

struct PipePort {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx: Arc<Mutex<VecDeque<u8>>>,
    epoch: Instant,
    name: &'static str,
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
        println!("[{}] UART retuned to {} baud", self.name, baud);
    }

    fn sleep_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

struct PrintObserver(&'static str);

impl TurboMidiObserver for PrintObserver {
    fn on_speed_changed(&mut self, speed: SpeedCode) {
        println!("[{}] link speed is now {speed}", self.0);
    }

    fn on_speed_request(&mut self) {
        println!("[{}] peer asked for our capabilities", self.0);
    }
}

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let upstream = Arc::new(Mutex::new(VecDeque::new()));
    let downstream = Arc::new(Mutex::new(VecDeque::new()));
    let epoch = Instant::now();
    let master_port = PipePort {
        rx: upstream.clone(),
        tx: downstream.clone(),
        epoch,
        name: "master",
    };
    let responder_port = PipePort {
        rx: downstream,
        tx: upstream,
        epoch,
        name: "responder",
    };

    let stop = Arc::new(AtomicBool::new(false));
    let responder_stop = stop.clone();
    let responder = thread::spawn(move || {
        let mut engine = TurboMidi::new(responder_port, Role::Responder);
        engine.set_observer(Box::new(PrintObserver("responder")));
        engine.set_supported_speed(SpeedCode::X2, true);
        engine.set_supported_speed(SpeedCode::X4, false);
        while !responder_stop.load(Ordering::Relaxed) {
            engine.pump();
            thread::sleep(Duration::from_micros(200));
        }
        engine.current_speed()
    });

    let mut master = TurboMidi::new(master_port, Role::Master);
    master.set_observer(Box::new(PrintObserver("master")));

    match master.negotiate(SpeedCode::X4, 1_000) {
        Ok(()) => println!("negotiated {}", master.current_speed()),
        Err(err) => println!("negotiation failed: {err}"),
    }

    stop.store(true, Ordering::Relaxed);
    let responder_speed = responder.join().expect("responder thread");
    println!("master at {}, responder at {responder_speed}", master.current_speed());
}
