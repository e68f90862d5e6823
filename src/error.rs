use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Unable to open serial port {port}: {source}. Is the instrument plugged in?")]
    HardwareUnavailable {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("No USB serial port found. Is the instrument plugged in?")]
    NoSerialPort,

    #[error("Visualizer at {address} refused connection ({source}). Run `nc -dkl {port}`")]
    VisualizerUnavailable {
        address: String,
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid MIDI file {path}: {source}")]
    Midi {
        path: PathBuf,
        #[source]
        source: midly::Error,
    },

    #[error("{0} uses SMPTE timecode timing, only metrical timing is supported")]
    UnsupportedTiming(PathBuf),

    #[error("Invalid config: {0}")]
    Config(#[from] ron::error::SpannedError),

    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start the playback runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
