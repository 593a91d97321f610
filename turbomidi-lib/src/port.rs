/// Transport seam between the engine and the physical MIDI link.
///
/// Implementations are infallible at this level and must return promptly:
/// `receive` never blocks and `send` may buffer. `millis` only needs to be
/// monotonic modulo u32 wrap; the engine compares timestamps with wrapping
/// arithmetic. The engine holds the port exclusively — no other writer may
/// interleave bytes onto the link, and no other reader may consume bytes
/// the engine expects to see.
pub trait MidiPort {
    /// Transmit raw bytes at the current baud rate.
    fn send(&mut self, data: &[u8]);

    /// Read whatever is buffered, up to `buf.len()`; returns the count.
    fn receive(&mut self, buf: &mut [u8]) -> usize;

    /// Monotonic millisecond clock.
    fn millis(&mut self) -> u32;

    /// Retune the UART. May briefly drop the line.
    fn set_baud(&mut self, baud: u32);

    /// Yield for roughly `ms` milliseconds.
    fn sleep_ms(&mut self, ms: u32);
}

impl<P: MidiPort + ?Sized> MidiPort for &mut P {
    fn send(&mut self, data: &[u8]) {
        (**self).send(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> usize {
        (**self).receive(buf)
    }

    fn millis(&mut self) -> u32 {
        (**self).millis()
    }

    fn set_baud(&mut self, baud: u32) {
        (**self).set_baud(baud)
    }

    fn sleep_ms(&mut self, ms: u32) {
        (**self).sleep_ms(ms)
    }
}
