mod actuator;
mod envelope;

pub use actuator::{ActuatorOutcome, ActuatorState, NoteActuator};
pub use envelope::power_level;

/// Shift applied once to notes outside the playable range.
pub const OCTAVE_SHIFT: i32 = 24;
/// Highest level a solenoid can be driven at.
pub const MAX_LEVEL: i32 = 254;

/// Anything that can drive a solenoid to a power level.
///
/// `emit` never fails: levels are clamped, addresses outside the instrument
/// after octave correction are dropped, and a lost connection turns writes
/// into no-ops.
pub trait SolenoidOutput: Send + Sync {
    fn emit(&self, note_index: i32, level: i32);

    /// Called once every note of a playback session has been released.
    fn settle(&self) {}
}

/// Moves a note index into `0..note_count` by shifting at most once by
/// [`OCTAVE_SHIFT`]. Returns `None` if it is still out of range.
pub fn correct_address(note_index: i32, note_count: usize) -> Option<usize> {
    let count = i32::try_from(note_count).unwrap_or(i32::MAX);
    let shifted = if note_index < 0 {
        note_index + OCTAVE_SHIFT
    } else if note_index >= count {
        note_index - OCTAVE_SHIFT
    } else {
        note_index
    };

    (0..count).contains(&shifted).then_some(shifted as usize)
}

pub fn clamp_level(level: i32) -> u8 {
    level.clamp(0, MAX_LEVEL) as u8
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_notes_shift_up_once() {
        for note_index in -24..0 {
            assert_eq!(
                correct_address(note_index, 48),
                Some((note_index + 24) as usize)
            );
        }
        for note_index in -60..-24 {
            assert_eq!(correct_address(note_index, 48), None);
        }
    }

    #[test]
    fn high_notes_shift_down_once() {
        for note_index in 48..72 {
            assert_eq!(
                correct_address(note_index, 48),
                Some((note_index - 24) as usize)
            );
        }
        for note_index in 72..200 {
            assert_eq!(correct_address(note_index, 48), None);
        }
    }

    #[test]
    fn in_range_notes_are_untouched() {
        for note_index in 0..48 {
            assert_eq!(correct_address(note_index, 48), Some(note_index as usize));
        }
    }

    #[test]
    fn small_instruments_drop_what_one_shift_cannot_fix() {
        // with 12 keys a note at 12 shifts to -12
        assert_eq!(correct_address(12, 12), None);
        assert_eq!(correct_address(30, 12), Some(6));
        assert_eq!(correct_address(-20, 12), Some(4));
        assert_eq!(correct_address(-5, 12), None);
    }

    #[test]
    fn levels_clamp_to_byte_range() {
        assert_eq!(clamp_level(-3), 0);
        assert_eq!(clamp_level(0), 0);
        assert_eq!(clamp_level(150), 150);
        assert_eq!(clamp_level(255), 254);
        assert_eq!(clamp_level(10_000), 254);
    }
}
