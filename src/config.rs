use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::PlayerError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub instrument: InstrumentConfig,
    pub envelope: EnvelopeConfig,
    pub playback: PlaybackConfig,
    pub hardware: HardwareConfig,
    pub visualizer: VisualizerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// MIDI note mapped to solenoid 0
    pub base_note: i32,
    /// Number of solenoids on the instrument
    pub note_count: usize,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            base_note: 41,
            note_count: 48,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Seconds of full striking power before dropping to `hold_power`
    pub attack_cutoff_s: f64,
    /// Power needed to depress a key at velocity 0
    pub min_power: i32,
    /// Power at `max_velocity`
    pub max_power: i32,
    /// Power that keeps an already depressed key down
    pub hold_power: i32,
    pub max_velocity: u8,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack_cutoff_s: 0.1,
            min_power: 100,
            max_power: 150,
            hold_power: 50,
            max_velocity: 127,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub poll_interval_ms: u64,
    pub cooldown_s: f64,
    pub wait_timeout_s: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            cooldown_s: 30.0,
            wait_timeout_s: 10.0,
        }
    }
}

impl PlaybackConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.cooldown_s).unwrap_or(Duration::ZERO)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.wait_timeout_s).unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Serial device path. The first USB serial port is used when unset.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// `host:port` of a listening terminal, or `stdout`
    pub address: String,
    pub redraw_interval_ms: u64,
    pub bar_length: usize,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8001".to_string(),
            redraw_interval_ms: 5,
            bar_length: 30,
        }
    }
}

impl VisualizerConfig {
    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, PlayerError> {
        let ron_string = fs::read_to_string(path).map_err(|source| PlayerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&ron_string)
    }

    pub fn parse(ron_string: &str) -> Result<Self, PlayerError> {
        Ok(ron::from_str(ron_string)?)
    }

    pub fn to_ron(&self) -> String {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()).unwrap_or_default()
    }
}
