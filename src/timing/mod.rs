mod extract;
mod scheduler;
mod stop;

pub use extract::extract_note_events;
pub use scheduler::{PlaybackReport, PlaybackSession, PlaybackSettings, play_note_events};
pub use stop::{StopHandle, StopSignal, stop_channel};
