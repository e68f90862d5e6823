use std::collections::HashMap;

use tracing::debug;

use crate::events::{DEFAULT_TEMPO, DecodedStream, MessageKind, NoteEvent};

struct OpenNote {
    velocity: u8,
    started_at: f64,
}

/// Pairs note-on/note-off messages into `NoteEvent`s with wall-clock offsets.
///
/// Ticks are converted with the tempo in effect when each delta elapses, so a
/// tempo change only affects the intervals after it. A note-on with velocity 0
/// counts as a note-off. Note-offs with no open note are dropped, as are notes
/// still open at the end of the stream.
pub fn extract_note_events(stream: &DecodedStream, base_note: i32) -> Vec<NoteEvent> {
    let ticks_per_quarter = stream.ticks_per_quarter.max(1) as f64;
    let mut tempo = DEFAULT_TEMPO;
    let mut now = 0.0f64;
    let mut open: HashMap<i32, OpenNote> = HashMap::new();
    let mut notes = Vec::new();

    for message in &stream.messages {
        now += ticks_to_seconds(message.delta_ticks, ticks_per_quarter, tempo);

        match message.kind {
            MessageKind::SetTempo { micros_per_quarter } => tempo = micros_per_quarter,
            MessageKind::NoteOn { note, velocity } if velocity > 0 => {
                let note_index = note as i32 - base_note;
                open.insert(
                    note_index,
                    OpenNote {
                        velocity,
                        started_at: now,
                    },
                );
            }
            MessageKind::NoteOn { note, .. } | MessageKind::NoteOff { note, .. } => {
                let note_index = note as i32 - base_note;
                match open.remove(&note_index) {
                    Some(pending) => notes.push(NoteEvent::new(
                        note_index,
                        pending.velocity,
                        pending.started_at,
                        now - pending.started_at,
                    )),
                    None => debug!(note_index, at = now, "Note-off without a note-on, ignored"),
                }
            }
            MessageKind::Other => {}
        }
    }

    if !open.is_empty() {
        debug!(count = open.len(), "Notes never released, ignored");
    }

    notes
}

fn ticks_to_seconds(ticks: u32, ticks_per_quarter: f64, micros_per_quarter: u32) -> f64 {
    ticks as f64 * micros_per_quarter as f64 * 1e-6 / ticks_per_quarter
}
