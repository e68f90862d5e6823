//! Plays MIDI files on a player-piano solenoid array.
//!
//! Notes are extracted from a decoded MIDI stream, each one driven by its own
//! actuator task through a power envelope, and sent either to the solenoid
//! driver board over serial or to a text visualizer.

pub mod config;
pub mod engine;
mod error;
pub mod events;
pub mod midi_file;
pub mod output;
pub mod solenoid;
pub mod timing;

pub use config::Config;
pub use engine::{
    ControllerSettings, CycleController, CycleStatus, CycleSummary, Playable, PlayerHandle,
    spawn_player,
};
pub use error::PlayerError;
pub use events::NoteEvent;
pub use output::Backend;
