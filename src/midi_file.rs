//! Standard MIDI File decoding.
//!
//! All tracks are merged into a single message stream ordered by absolute
//! tick, ties keeping track order, so the extractor sees one timeline.

use std::fs;
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::debug;

use crate::PlayerError;
use crate::events::{DecodedStream, MessageKind, TimedMessage};

pub fn load(path: &Path) -> Result<DecodedStream, PlayerError> {
    let bytes = fs::read(path).map_err(|source| PlayerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes, path)
}

/// `origin` is only used to label errors.
pub fn decode(bytes: &[u8], origin: &Path) -> Result<DecodedStream, PlayerError> {
    let smf = Smf::parse(bytes).map_err(|source| PlayerError::Midi {
        path: origin.to_path_buf(),
        source,
    })?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) => tpq.as_int(),
        Timing::Timecode(..) => return Err(PlayerError::UnsupportedTiming(origin.to_path_buf())),
    };

    let mut merged: Vec<(u64, MessageKind)> = Vec::new();
    for track in &smf.tracks {
        let mut absolute = 0u64;
        for event in track {
            absolute += event.delta.as_int() as u64;
            merged.push((absolute, classify(&event.kind)));
        }
    }
    // stable: simultaneous events keep track order
    merged.sort_by_key(|(tick, _)| *tick);

    let mut stream = DecodedStream::new(ticks_per_quarter);
    let mut previous = 0u64;
    for (tick, kind) in merged {
        let delta = u32::try_from(tick - previous).unwrap_or(u32::MAX);
        stream.messages.push(TimedMessage {
            delta_ticks: delta,
            kind,
        });
        previous = tick;
    }

    debug!(
        file = %origin.display(),
        tracks = smf.tracks.len(),
        messages = stream.messages.len(),
        "Decoded MIDI file"
    );

    Ok(stream)
}

fn classify(kind: &TrackEventKind) -> MessageKind {
    match kind {
        TrackEventKind::Midi { message, .. } => match *message {
            MidiMessage::NoteOn { key, vel } => MessageKind::NoteOn {
                note: key.as_int(),
                velocity: vel.as_int(),
            },
            MidiMessage::NoteOff { key, vel } => MessageKind::NoteOff {
                note: key.as_int(),
                velocity: vel.as_int(),
            },
            _ => MessageKind::Other,
        },
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => MessageKind::SetTempo {
            micros_per_quarter: tempo.as_int(),
        },
        _ => MessageKind::Other,
    }
}
