/// Default MIDI tempo, in microseconds per quarter note.
pub const DEFAULT_TEMPO: u32 = 500_000;

/// One decoded message with the number of ticks elapsed since the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedMessage {
    pub delta_ticks: u32,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageKind {
    SetTempo { micros_per_quarter: u32 },
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    /// Anything else. Still advances time.
    Other,
}

/// A decoded music stream: a tick resolution header followed by messages in
/// playback order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStream {
    pub ticks_per_quarter: u16,
    pub messages: Vec<TimedMessage>,
}

impl DecodedStream {
    pub fn new(ticks_per_quarter: u16) -> Self {
        Self {
            ticks_per_quarter,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, delta_ticks: u32, kind: MessageKind) -> &mut Self {
        self.messages.push(TimedMessage { delta_ticks, kind });
        self
    }
}

/// A single note to be sounded on the instrument.
///
/// `note_index` is relative to the instrument's base note and may fall outside
/// the playable range; the output backend corrects or drops it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub note_index: i32,
    pub velocity: u8,
    /// Seconds from the start of playback
    pub start_offset_s: f64,
    /// Seconds
    pub duration_s: f64,
}

impl NoteEvent {
    pub fn new(note_index: i32, velocity: u8, start_offset_s: f64, duration_s: f64) -> Self {
        Self {
            note_index,
            velocity,
            start_offset_s,
            duration_s,
        }
    }

    pub fn end_s(&self) -> f64 {
        self.start_offset_s + self.duration_s
    }
}
