use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};

use super::{SolenoidOutput, power_level};
use crate::config::EnvelopeConfig;
use crate::events::NoteEvent;
use crate::timing::StopSignal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorState {
    Pending,
    Sounding { since: Instant },
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorOutcome {
    Completed,
    /// Stopped early. The solenoid was released if it had started sounding.
    Cancelled,
}

/// Drives one note from its start offset until its duration has elapsed.
pub struct NoteActuator {
    note: NoteEvent,
    envelope: EnvelopeConfig,
    poll_interval: Duration,
    state: ActuatorState,
}

impl NoteActuator {
    pub fn new(note: NoteEvent, envelope: EnvelopeConfig, poll_interval: Duration) -> Self {
        Self {
            note,
            envelope,
            poll_interval,
            state: ActuatorState::Pending,
        }
    }

    /// Plays the note `start_offset_s` after `started_at`, the instant the
    /// session began.
    pub async fn run<O>(
        mut self,
        output: &O,
        started_at: Instant,
        mut stop: StopSignal,
    ) -> ActuatorOutcome
    where
        O: SolenoidOutput + ?Sized,
    {
        let start_at = started_at + seconds(self.note.start_offset_s);
        let duration = seconds(self.note.duration_s);

        loop {
            match self.state {
                ActuatorState::Pending => {
                    tokio::select! {
                        biased;
                        _ = stop.stopped() => {
                            self.state = ActuatorState::Released;
                            return ActuatorOutcome::Cancelled;
                        }
                        _ = sleep_until(start_at) => {
                            self.state = ActuatorState::Sounding { since: Instant::now() };
                        }
                    }
                }
                ActuatorState::Sounding { since } => {
                    let elapsed = since.elapsed();
                    if elapsed > duration {
                        self.release(output);
                        return ActuatorOutcome::Completed;
                    }

                    let level = power_level(&self.envelope, self.note.velocity, elapsed);
                    output.emit(self.note.note_index, level);

                    let cancelled = tokio::select! {
                        biased;
                        _ = stop.stopped() => true,
                        _ = sleep(self.poll_interval) => false,
                    };
                    if cancelled {
                        self.release(output);
                        return ActuatorOutcome::Cancelled;
                    }
                }
                ActuatorState::Released => return ActuatorOutcome::Completed,
            }
        }
    }

    fn release<O: SolenoidOutput + ?Sized>(&mut self, output: &O) {
        output.emit(self.note.note_index, 0);
        self.state = ActuatorState::Released;
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solenoid::testing::Recorder;
    use crate::timing::stop_channel;

    fn actuator(note: NoteEvent) -> NoteActuator {
        NoteActuator::new(note, EnvelopeConfig::default(), Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn strike_then_hold_then_release() {
        let output = Recorder::new();
        let outcome = actuator(NoteEvent::new(0, 127, 0.0, 0.25))
            .run(&output, Instant::now(), StopSignal::never())
            .await;
        assert_eq!(outcome, ActuatorOutcome::Completed);

        let emissions = output.emissions();
        let levels: Vec<i32> = emissions.iter().map(|e| e.level).collect();
        assert_eq!(levels[0], 150);

        let strike = levels.iter().take_while(|&&l| l == 150).count();
        let hold = levels[strike..].iter().take_while(|&&l| l == 50).count();
        // ten polls of 10 ms before the 100 ms cutoff, then the rest of the 250 ms
        assert!((9..=11).contains(&strike), "strike polls: {strike}");
        assert!((14..=17).contains(&hold), "hold polls: {hold}");
        assert_eq!(strike + hold + 1, levels.len());

        let last = emissions.last().unwrap();
        assert_eq!(last.level, 0);
        assert!(last.at >= Duration::from_millis(250));
        assert!(emissions[..emissions.len() - 1].iter().all(|e| e.at <= Duration::from_millis(250)));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_start_offset() {
        let output = Recorder::new();
        actuator(NoteEvent::new(3, 64, 1.5, 0.05))
            .run(&output, Instant::now(), StopSignal::never())
            .await;

        let emissions = output.emissions();
        assert!(emissions.iter().all(|e| e.note_index == 3));
        assert!(emissions[0].at >= Duration::from_millis(1500));
        assert!(emissions[0].at < Duration::from_millis(1510));
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_emitted_exactly_once() {
        let output = Recorder::new();
        actuator(NoteEvent::new(7, 100, 0.0, 0.03))
            .run(&output, Instant::now(), StopSignal::never())
            .await;

        let emissions = output.for_note(7);
        let zeros = emissions.iter().filter(|e| e.level == 0).count();
        assert_eq!(zeros, 1);
        assert_eq!(emissions.last().unwrap().level, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_still_releases() {
        let output = Recorder::new();
        actuator(NoteEvent::new(1, 100, 0.0, 0.0))
            .run(&output, Instant::now(), StopSignal::never())
            .await;

        assert_eq!(output.emissions().last().unwrap().level, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_sounding_releases_immediately() {
        let output = Recorder::new();
        let (handle, signal) = stop_channel();

        let note = actuator(NoteEvent::new(2, 127, 0.0, 10.0));
        let run = note.run(&output, Instant::now(), signal);
        let stopper = async {
            sleep(Duration::from_millis(55)).await;
            handle.stop();
        };
        let (outcome, ()) = tokio::join!(run, stopper);

        assert_eq!(outcome, ActuatorOutcome::Cancelled);
        let last = output.emissions().last().copied().unwrap();
        assert_eq!(last.level, 0);
        assert!(last.at < Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_pending_emits_nothing() {
        let output = Recorder::new();
        let (handle, signal) = stop_channel();
        handle.stop();

        let outcome = actuator(NoteEvent::new(2, 127, 5.0, 1.0))
            .run(&output, Instant::now(), signal)
            .await;

        assert_eq!(outcome, ActuatorOutcome::Cancelled);
        assert!(output.emissions().is_empty());
    }

    #[test]
    fn starts_pending() {
        let note = actuator(NoteEvent::new(0, 1, 0.0, 1.0));
        assert_eq!(note.state, ActuatorState::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn offset_counts_from_session_start() {
        let output = Recorder::new();
        let session_start = Instant::now();
        sleep(Duration::from_millis(30)).await;

        actuator(NoteEvent::new(4, 90, 0.05, 0.02))
            .run(&output, session_start, StopSignal::never())
            .await;

        assert_eq!(output.for_note(4)[0].at, Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_note_sounds_at_once() {
        let output = Recorder::new();
        let session_start = Instant::now();
        sleep(Duration::from_millis(80)).await;

        actuator(NoteEvent::new(4, 90, 0.05, 0.02))
            .run(&output, session_start, StopSignal::never())
            .await;

        assert_eq!(output.for_note(4)[0].at, Duration::from_millis(80));
    }
}
