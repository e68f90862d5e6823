use std::io::Write;
use std::time::Duration;

use parking_lot::Mutex;
use serialport::SerialPortType;
use tracing::{debug, info, warn};

use super::DropCounter;
use crate::PlayerError;
use crate::config::HardwareConfig;
use crate::solenoid::{MAX_LEVEL, SolenoidOutput, clamp_level, correct_address};

/// Last byte of every frame.
pub const FRAME_END: u8 = 255;

/// Builds the 3-byte `[address, level, 255]` frame for one solenoid update.
///
/// The microcontroller treats 0 as an error code, so address and level are
/// both sent one higher than their real value and kept within `1..=254`.
pub fn encode_frame(note_index: i32, level: i32, note_count: usize) -> Option<[u8; 3]> {
    let level = clamp_level(level) as i32;
    let address = correct_address(note_index, note_count)? as i32;

    let wire_address = address + 1;
    if wire_address > MAX_LEVEL {
        return None;
    }
    let wire_level = (level + 1).clamp(1, MAX_LEVEL);

    Some([wire_address as u8, wire_level as u8, FRAME_END])
}

/// Solenoid driver board on a serial link.
pub struct HardwareOutput {
    link: Mutex<Option<Box<dyn Write + Send>>>,
    note_count: usize,
    dropped: DropCounter,
}

impl HardwareOutput {
    pub fn open(config: &HardwareConfig, note_count: usize) -> Result<Self, PlayerError> {
        let port = match &config.port {
            Some(port) => port.clone(),
            None => find_usb_serial_port()?,
        };

        info!(port = %port, baud_rate = config.baud_rate, "Connecting to instrument");
        let link = serialport::new(&port, config.baud_rate)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()
            .map_err(|source| PlayerError::HardwareUnavailable {
                port: port.clone(),
                source,
            })?;

        Ok(Self::with_writer(Box::new(link), note_count))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>, note_count: usize) -> Self {
        Self {
            link: Mutex::new(Some(writer)),
            note_count,
            dropped: DropCounter::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().is_some()
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped.get()
    }
}

impl SolenoidOutput for HardwareOutput {
    fn emit(&self, note_index: i32, level: i32) {
        let Some(frame) = encode_frame(note_index, level, self.note_count) else {
            debug!(note_index, level, "Note outside the instrument, dropped");
            self.dropped.record();
            return;
        };

        let mut link = self.link.lock();
        let Some(writer) = link.as_mut() else {
            self.dropped.record();
            return;
        };

        debug!(address = frame[0], level = frame[1], "Solenoid update");
        if let Err(e) = writer.write_all(&frame) {
            warn!("Lost connection to instrument: {}", e);
            *link = None;
            self.dropped.record();
        }
    }
}

fn find_usb_serial_port() -> Result<String, PlayerError> {
    let ports = serialport::available_ports().map_err(|e| {
        warn!("Unable to list serial ports: {}", e);
        PlayerError::NoSerialPort
    })?;

    ports
        .into_iter()
        .find(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
        .map(|p| p.port_name)
        .ok_or(PlayerError::NoSerialPort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing::{BrokenLink, SharedBuffer};

    #[test]
    fn frames_are_offset_by_one() {
        assert_eq!(encode_frame(0, 0, 48), Some([1, 1, 255]));
        assert_eq!(encode_frame(0, 150, 48), Some([1, 151, 255]));
        assert_eq!(encode_frame(47, 50, 48), Some([48, 51, 255]));
    }

    #[test]
    fn level_never_reaches_terminator() {
        assert_eq!(encode_frame(5, 254, 48), Some([6, 254, 255]));
        assert_eq!(encode_frame(5, 999, 48), Some([6, 254, 255]));
        assert_eq!(encode_frame(5, -40, 48), Some([6, 1, 255]));
    }

    #[test]
    fn out_of_range_notes_are_shifted_or_dropped() {
        assert_eq!(encode_frame(-1, 100, 48), Some([24, 101, 255]));
        assert_eq!(encode_frame(48, 100, 48), Some([25, 101, 255]));
        assert_eq!(encode_frame(-25, 100, 48), None);
        assert_eq!(encode_frame(72, 100, 48), None);
    }

    #[test]
    fn address_beyond_a_byte_is_dropped() {
        assert_eq!(encode_frame(253, 10, 300), Some([254, 11, 255]));
        assert_eq!(encode_frame(254, 10, 300), None);
    }

    #[test]
    fn zero_is_never_sent() {
        for note_index in -30..80 {
            for level in [-5, 0, 1, 128, 254, 300] {
                if let Some([address, level, end]) = encode_frame(note_index, level, 48) {
                    assert!(address >= 1 && address <= 254);
                    assert!(level >= 1 && level <= 254);
                    assert_eq!(end, FRAME_END);
                }
            }
        }
    }

    #[test]
    fn writes_frames_to_the_link() {
        let serial = SharedBuffer::default();
        let output = HardwareOutput::with_writer(Box::new(serial.clone()), 48);

        output.emit(3, 120);
        output.emit(3, 0);
        output.emit(-40, 120);

        assert_eq!(serial.bytes(), vec![4, 121, 255, 4, 1, 255]);
        assert_eq!(output.dropped_events(), 1);
    }

    #[test]
    fn lost_link_degrades_to_no_ops() {
        let output = HardwareOutput::with_writer(Box::new(BrokenLink), 48);
        assert!(output.is_connected());

        output.emit(1, 100);
        assert!(!output.is_connected());
        output.emit(1, 0);
        assert_eq!(output.dropped_events(), 2);
    }

    #[test]
    fn missing_port_is_reported() {
        let config = HardwareConfig {
            port: Some("/dev/definitely-not-a-piano".to_string()),
            ..HardwareConfig::default()
        };
        assert!(matches!(
            HardwareOutput::open(&config, 48),
            Err(PlayerError::HardwareUnavailable { .. })
        ));
    }
}
