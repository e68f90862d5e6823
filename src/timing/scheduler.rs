use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error};

use super::StopSignal;
use crate::config::{Config, EnvelopeConfig};
use crate::events::NoteEvent;
use crate::solenoid::{ActuatorOutcome, NoteActuator, SolenoidOutput};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub envelope: EnvelopeConfig,
    pub poll_interval: Duration,
}

impl PlaybackSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            envelope: config.envelope,
            poll_interval: config.playback.poll_interval(),
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub notes: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Actuators that panicked. Their siblings keep playing.
    pub failed: usize,
}

/// One run of a set of notes. Every note gets its own actuator task and the
/// session only finishes once all of them have.
pub struct PlaybackSession {
    events: Vec<NoteEvent>,
    started_at: Instant,
}

impl PlaybackSession {
    pub fn new(events: Vec<NoteEvent>) -> Self {
        Self {
            events,
            started_at: Instant::now(),
        }
    }

    /// Seconds until the last note releases.
    pub fn length_s(&self) -> f64 {
        self.events.iter().map(NoteEvent::end_s).fold(0.0, f64::max)
    }

    pub async fn run<O>(
        self,
        output: Arc<O>,
        settings: PlaybackSettings,
        stop: StopSignal,
    ) -> PlaybackReport
    where
        O: SolenoidOutput + ?Sized + 'static,
    {
        let mut report = PlaybackReport {
            notes: self.events.len(),
            ..PlaybackReport::default()
        };
        debug!(
            notes = report.notes,
            length_s = self.length_s(),
            "Starting playback session"
        );

        let started_at = self.started_at;
        let mut actuators = JoinSet::new();
        for note in self.events {
            let output = Arc::clone(&output);
            let stop = stop.clone();
            let actuator = NoteActuator::new(note, settings.envelope, settings.poll_interval);
            actuators.spawn(async move { actuator.run(&*output, started_at, stop).await });
        }

        while let Some(result) = actuators.join_next().await {
            match result {
                Ok(ActuatorOutcome::Completed) => report.completed += 1,
                Ok(ActuatorOutcome::Cancelled) => report.cancelled += 1,
                Err(e) => {
                    error!("Note actuator failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        output.settle();

        debug!(
            elapsed_s = self.started_at.elapsed().as_secs_f64(),
            "Playback session finished"
        );
        report
    }
}

/// Plays every note concurrently and returns once all have been released.
pub async fn play_note_events<O>(
    events: Vec<NoteEvent>,
    output: Arc<O>,
    settings: PlaybackSettings,
    stop: StopSignal,
) -> PlaybackReport
where
    O: SolenoidOutput + ?Sized + 'static,
{
    PlaybackSession::new(events).run(output, settings, stop).await
}
