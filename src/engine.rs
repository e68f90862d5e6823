use crate::events::{DecodedStream, NoteEvent};
use crate::timing::{self, PlaybackReport, PlaybackSettings, StopHandle, StopSignal};
use crate::{Config, PlayerError, midi_file};
use crate::solenoid::SolenoidOutput;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info};

/// Lifecycle signal sent to observers around every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Playing,
    Cooldown,
    Waiting,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Playing => "playing",
            CycleStatus::Cooldown => "cooldown",
            CycleStatus::Waiting => "waiting",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something the controller can turn into notes.
pub trait Playable: Send + 'static {
    fn label(&self) -> String;

    fn note_events(&self, base_note: i32) -> Result<Vec<NoteEvent>, PlayerError>;
}

/// A MIDI file on disk.
impl Playable for PathBuf {
    fn label(&self) -> String {
        self.display().to_string()
    }

    fn note_events(&self, base_note: i32) -> Result<Vec<NoteEvent>, PlayerError> {
        let stream = midi_file::load(self)?;
        Ok(timing::extract_note_events(&stream, base_note))
    }
}

impl Playable for DecodedStream {
    fn label(&self) -> String {
        format!("decoded stream ({} messages)", self.messages.len())
    }

    fn note_events(&self, base_note: i32) -> Result<Vec<NoteEvent>, PlayerError> {
        Ok(timing::extract_note_events(self, base_note))
    }
}

/// Notes that are already relative to the instrument.
impl Playable for Vec<NoteEvent> {
    fn label(&self) -> String {
        format!("{} notes", self.len())
    }

    fn note_events(&self, _base_note: i32) -> Result<Vec<NoteEvent>, PlayerError> {
        Ok(self.clone())
    }
}

impl Playable for Box<dyn Playable> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn note_events(&self, base_note: i32) -> Result<Vec<NoteEvent>, PlayerError> {
        (**self).note_events(base_note)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    pub playback: PlaybackSettings,
    pub base_note: i32,
    pub cooldown: Duration,
    pub wait_timeout: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            playback: PlaybackSettings::from_config(config),
            base_note: config.instrument.base_note,
            cooldown: config.playback.cooldown(),
            wait_timeout: config.playback.wait_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub cycles: usize,
    /// Cycles whose item could not be decoded or played
    pub failed: usize,
}

/// Plays items from a work queue one at a time, with a cooldown after each.
///
/// Runs until stopped or until every sender of the work queue is dropped.
/// A failing item only ends its own cycle.
pub struct CycleController<T, O: ?Sized> {
    work: Receiver<T>,
    status: Sender<CycleStatus>,
    output: Arc<O>,
    settings: ControllerSettings,
    stop: StopSignal,
}

impl<T, O> CycleController<T, O>
where
    T: Playable,
    O: SolenoidOutput + ?Sized + 'static,
{
    pub fn new(
        work: Receiver<T>,
        status: Sender<CycleStatus>,
        output: Arc<O>,
        settings: ControllerSettings,
        stop: StopSignal,
    ) -> Self {
        Self {
            work,
            status,
            output,
            settings,
            stop,
        }
    }

    pub fn run(self) -> Result<CycleSummary, PlayerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(PlayerError::Runtime)?;

        let mut summary = CycleSummary::default();
        info!("Waiting for something to play");

        while !self.stop.is_stopped() {
            match self.work.recv_timeout(self.settings.wait_timeout) {
                Ok(item) => self.run_cycle(&runtime, item, &mut summary),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Work queue closed");
                    break;
                }
            }
        }

        info!(
            cycles = summary.cycles,
            failed = summary.failed,
            "Playback controller shut down"
        );
        Ok(summary)
    }

    fn run_cycle(&self, runtime: &Runtime, item: T, summary: &mut CycleSummary) {
        let label = item.label();
        info!(item = %label, "Starting playback");
        self.signal(CycleStatus::Playing);

        let played = panic::catch_unwind(AssertUnwindSafe(|| self.play(runtime, &item)));
        summary.cycles += 1;
        match played {
            Ok(Ok(report)) => info!(
                item = %label,
                notes = report.notes,
                cancelled = report.cancelled,
                failed = report.failed,
                "Finished playback"
            ),
            Ok(Err(e)) => {
                error!(item = %label, "Playback failed: {}", e);
                summary.failed += 1;
            }
            Err(_) => {
                error!(item = %label, "Playback panicked");
                summary.failed += 1;
            }
        }

        self.signal(CycleStatus::Cooldown);
        self.cool_down(runtime);
        self.signal(CycleStatus::Waiting);
    }

    fn play(&self, runtime: &Runtime, item: &T) -> Result<PlaybackReport, PlayerError> {
        let events = item.note_events(self.settings.base_note)?;
        let output = Arc::clone(&self.output);
        Ok(runtime.block_on(timing::play_note_events(
            events,
            output,
            self.settings.playback,
            self.stop.clone(),
        )))
    }

    fn cool_down(&self, runtime: &Runtime) {
        let mut stop = self.stop.clone();
        let cooldown = self.settings.cooldown;
        debug!(seconds = cooldown.as_secs_f64(), "Cooling down solenoids");
        runtime.block_on(async {
            tokio::select! {
                _ = tokio::time::sleep(cooldown) => {}
                _ = stop.stopped() => debug!("Cooldown cut short"),
            }
        });
    }

    fn signal(&self, status: CycleStatus) {
        debug!(status = %status, "Cycle status");
        if self.status.send(status).is_err() {
            debug!(status = %status, "No status observer, update dropped");
        }
    }
}

pub struct PlayerHandle<T> {
    pub item_tx: Sender<T>,
    pub status_rx: Receiver<CycleStatus>,
    stop: StopHandle,
    thread: JoinHandle<Result<CycleSummary, PlayerError>>,
}

impl<T> PlayerHandle<T> {
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Closes the work queue and waits for the controller to finish what is
    /// already queued.
    pub fn join(self) -> Result<CycleSummary, PlayerError> {
        let PlayerHandle {
            item_tx, thread, ..
        } = self;
        drop(item_tx);
        match thread.join() {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// Starts a cycle controller on its own thread.
pub fn spawn_player<T, O>(output: Arc<O>, settings: ControllerSettings) -> PlayerHandle<T>
where
    T: Playable,
    O: SolenoidOutput + ?Sized + 'static,
{
    let (item_tx, item_rx) = crossbeam::channel::unbounded();
    let (status_tx, status_rx) = crossbeam::channel::unbounded();
    let (stop, signal) = timing::stop_channel();

    let thread = std::thread::spawn(move || {
        CycleController::new(item_rx, status_tx, output, settings, signal).run()
    });

    PlayerHandle {
        item_tx,
        status_rx,
        stop,
        thread,
    }
}

/// Every note in turn at full velocity, each held for `hold_s`.
pub fn sweep_every_note(note_count: usize, hold_s: f64) -> Vec<NoteEvent> {
    (0..note_count)
        .map(|i| NoteEvent::new(i as i32, 127, i as f64 * hold_s, hold_s))
        .collect()
}

/// The first `count` notes together at full velocity.
pub fn sweep_chord(count: usize, hold_s: f64) -> Vec<NoteEvent> {
    (0..count)
        .map(|i| NoteEvent::new(i as i32, 127, 0.0, hold_s))
        .collect()
}
