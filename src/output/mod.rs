//! Output backends. One is picked at startup and used for the whole run.

mod hardware;
mod simulated;

use std::sync::atomic::{AtomicU64, Ordering};

pub use hardware::{FRAME_END, HardwareOutput, encode_frame};
pub use simulated::{OutputState, SimulatedOutput, render_frame};

use crate::config::Config;
use crate::solenoid::SolenoidOutput;
use crate::PlayerError;

pub enum Backend {
    Hardware(HardwareOutput),
    Simulated(SimulatedOutput),
}

impl Backend {
    /// Opens the serial link, or the visualizer when `simulate` is set.
    /// Failing to connect here is fatal for the backend.
    pub fn connect(config: &Config, simulate: bool) -> Result<Self, PlayerError> {
        let note_count = config.instrument.note_count;
        if simulate {
            Ok(Backend::Simulated(SimulatedOutput::connect(
                &config.visualizer,
                note_count,
            )?))
        } else {
            Ok(Backend::Hardware(HardwareOutput::open(
                &config.hardware,
                note_count,
            )?))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Hardware(_) => "hardware",
            Backend::Simulated(_) => "simulated",
        }
    }

    pub fn is_connected(&self) -> bool {
        match self {
            Backend::Hardware(output) => output.is_connected(),
            Backend::Simulated(output) => output.is_connected(),
        }
    }

    /// Updates that never reached the instrument: out of range, or sent
    /// while disconnected.
    pub fn dropped_events(&self) -> u64 {
        match self {
            Backend::Hardware(output) => output.dropped_events(),
            Backend::Simulated(output) => output.dropped_events(),
        }
    }
}

impl SolenoidOutput for Backend {
    fn emit(&self, note_index: i32, level: i32) {
        match self {
            Backend::Hardware(output) => output.emit(note_index, level),
            Backend::Simulated(output) => output.emit(note_index, level),
        }
    }

    fn settle(&self) {
        match self {
            Backend::Hardware(output) => output.settle(),
            Backend::Simulated(output) => output.settle(),
        }
    }
}

#[derive(Debug, Default)]
struct DropCounter(AtomicU64);

impl DropCounter {
    fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;
    use std::io::{self, Write};
    use std::sync::Arc;

    /// A cloneable in-memory writer standing in for a serial port or socket.
    #[derive(Clone, Default)]
    pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn bytes(&self) -> Vec<u8> {
            self.0.lock().clone()
        }

        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.bytes()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Accepts nothing, like an unplugged cable.
    pub struct BrokenLink;

    impl Write for BrokenLink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
    }
}
