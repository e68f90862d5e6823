use std::io::{self, Write};
use std::net::TcpStream;
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::DropCounter;
use crate::PlayerError;
use crate::config::VisualizerConfig;
use crate::solenoid::{SolenoidOutput, clamp_level, correct_address};

const FULL_SCALE: f64 = 255.0;

/// Current level of every solenoid, as last emitted.
#[derive(Debug, Clone)]
pub struct OutputState {
    levels: Vec<u8>,
    last_redraw_at: Option<Instant>,
}

impl OutputState {
    pub fn new(note_count: usize) -> Self {
        Self {
            levels: vec![0; note_count],
            last_redraw_at: None,
        }
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }
}

/// Renders one bar per solenoid, two per line.
pub fn render_frame(levels: &[u8], bar_length: usize) -> String {
    let mut frame = String::with_capacity(levels.len() * (bar_length + 8));
    for (i, &level) in levels.iter().enumerate() {
        let filled = ((level as f64 / FULL_SCALE) * bar_length as f64).round() as usize;
        let filled = filled.min(bar_length);

        frame.push('[');
        frame.extend(std::iter::repeat_n('#', filled));
        frame.extend(std::iter::repeat_n(' ', bar_length - filled));
        frame.push(']');
        if i % 2 == 1 {
            frame.push('\n');
        } else {
            frame.push_str("     ");
        }
    }
    frame
}

struct Screen {
    state: OutputState,
    sink: Option<Box<dyn Write + Send>>,
}

/// Draws solenoid levels as text bars instead of driving hardware.
pub struct SimulatedOutput {
    screen: Mutex<Screen>,
    redraw_interval: Duration,
    bar_length: usize,
    dropped: DropCounter,
}

impl SimulatedOutput {
    /// Connects to a listening terminal (`nc -dkl 8001`), or draws on this
    /// process's own terminal when the address is `stdout`.
    pub fn connect(config: &VisualizerConfig, note_count: usize) -> Result<Self, PlayerError> {
        let mut sink: Box<dyn Write + Send> = if config.address == "stdout" {
            Box::new(io::stdout())
        } else {
            let stream = TcpStream::connect(&config.address).map_err(|source| {
                PlayerError::VisualizerUnavailable {
                    address: config.address.clone(),
                    port: config
                        .address
                        .rsplit(':')
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                    source,
                }
            })?;
            Box::new(stream)
        };
        info!(address = %config.address, "Connected to visualizer");

        if let Err(e) = queue!(sink, Clear(ClearType::All)).and_then(|_| sink.flush()) {
            warn!("Unable to clear visualizer: {}", e);
        }

        Ok(Self::with_sink(
            sink,
            note_count,
            config.redraw_interval(),
            config.bar_length,
        ))
    }

    pub fn with_sink(
        sink: Box<dyn Write + Send>,
        note_count: usize,
        redraw_interval: Duration,
        bar_length: usize,
    ) -> Self {
        Self {
            screen: Mutex::new(Screen {
                state: OutputState::new(note_count),
                sink: Some(sink),
            }),
            redraw_interval,
            bar_length,
            dropped: DropCounter::default(),
        }
    }

    pub fn levels(&self) -> Vec<u8> {
        self.screen.lock().state.levels.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.screen.lock().sink.is_some()
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped.get()
    }

    /// Draws the current levels now, ignoring the redraw rate limit.
    pub fn flush(&self) {
        let mut screen = self.screen.lock();
        self.draw(&mut screen);
    }

    fn redraw(&self, screen: &mut Screen) {
        if let Some(last) = screen.state.last_redraw_at {
            if last.elapsed() < self.redraw_interval {
                return;
            }
        }
        self.draw(screen);
    }

    fn draw(&self, screen: &mut Screen) {
        let Some(sink) = screen.sink.as_mut() else {
            return;
        };

        let frame = render_frame(&screen.state.levels, self.bar_length);
        let written = queue!(sink, MoveTo(0, 0), Print(frame)).and_then(|_| sink.flush());
        if let Err(e) = written {
            warn!("Lost connection to visualizer: {}", e);
            screen.sink = None;
            return;
        }
        screen.state.last_redraw_at = Some(Instant::now());
    }
}

impl SolenoidOutput for SimulatedOutput {
    fn emit(&self, note_index: i32, level: i32) {
        let level = clamp_level(level);
        let mut screen = self.screen.lock();
        let Some(address) = correct_address(note_index, screen.state.levels.len()) else {
            debug!(note_index, "Note outside the instrument, dropped");
            self.dropped.record();
            return;
        };

        screen.state.levels[address] = level;
        self.redraw(&mut screen);
    }

    fn settle(&self) {
        self.flush();
    }
}
