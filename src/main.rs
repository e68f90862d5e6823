use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pianola::engine::{sweep_chord, sweep_every_note};
use pianola::timing::StopHandle;
use pianola::{Backend, Config, ControllerSettings, Playable, PlayerError, spawn_player};
use rand::seq::SliceRandom;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pianola")]
#[command(about = "Play MIDI files on a player-piano solenoid array", long_about = None)]
struct Cli {
    /// RON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Draw solenoid levels on a text visualizer instead of driving hardware
    #[arg(long, global = true)]
    simulate: bool,

    /// Serial port of the solenoid driver board
    #[arg(long, global = true)]
    port: Option<String>,

    /// Visualizer address (`host:port` or `stdout`)
    #[arg(long, global = true)]
    visualizer: Option<String>,

    /// Seconds to rest the solenoids after every song
    #[arg(long, global = true)]
    cooldown: Option<f64>,

    /// Log filter, e.g. `debug` or `pianola::output=debug`
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play MIDI files, or every file in a directory
    Play {
        paths: Vec<PathBuf>,

        /// Play in random order
        #[arg(long)]
        shuffle: bool,
    },

    /// Exercise the solenoids
    Sweep {
        /// Seconds each note is held
        #[arg(long, default_value = "0.25")]
        hold: f64,

        /// Hold the first N notes together instead of one after another
        #[arg(long)]
        chord: Option<usize>,
    },

    /// Print the effective configuration
    ShowConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PlayerError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        config.hardware.port = Some(port);
    }
    if let Some(address) = cli.visualizer {
        config.visualizer.address = address;
    }
    if let Some(cooldown) = cli.cooldown {
        config.playback.cooldown_s = cooldown;
    }

    let items: Vec<Box<dyn Playable>> = match cli.command {
        Commands::ShowConfig => {
            println!("{}", config.to_ron());
            return Ok(());
        }
        Commands::Play { paths, shuffle } => {
            let mut files = collect_files(&paths)?;
            if shuffle {
                files.shuffle(&mut rand::thread_rng());
            }
            files
                .into_iter()
                .map(|f| Box::new(f) as Box<dyn Playable>)
                .collect()
        }
        Commands::Sweep { hold, chord } => {
            let notes = match chord {
                Some(count) => sweep_chord(count, hold),
                None => sweep_every_note(config.instrument.note_count, hold),
            };
            vec![Box::new(notes) as Box<dyn Playable>]
        }
    };

    let backend = Arc::new(Backend::connect(&config, cli.simulate)?);
    info!(backend = backend.name(), items = items.len(), "Output ready");

    let player = spawn_player(Arc::clone(&backend), ControllerSettings::from_config(&config));
    stop_on_ctrl_c(player.stop_handle());

    let status_rx = player.status_rx.clone();
    std::thread::spawn(move || {
        for status in status_rx.iter() {
            info!(status = %status, "Player status");
        }
    });

    for item in items {
        if player.item_tx.send(item).is_err() {
            break;
        }
    }
    let summary = player.join()?;

    info!(
        cycles = summary.cycles,
        failed = summary.failed,
        dropped_updates = backend.dropped_events(),
        connected = backend.is_connected(),
        "Done"
    );
    Ok(())
}

fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, PlayerError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(files_in(path)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn files_in(dir: &Path) -> Result<Vec<PathBuf>, PlayerError> {
    let io_error = |source: std::io::Error| PlayerError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && is_midi_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_midi_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
}

fn stop_on_ctrl_c(stop: StopHandle) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Ctrl-C handling unavailable: {}", e);
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Stopping, releasing all solenoids");
                stop.stop();
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_only_yield_midi_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mid", "a.MIDI", "README.md", ".DS_Store", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mid")).unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|f| f.file_name()?.to_str())
            .collect();
        assert_eq!(names, vec!["a.MIDI", "b.mid"]);
    }

    #[test]
    fn explicit_paths_are_kept_as_given() {
        let files = collect_files(&[PathBuf::from("/songs/take1.wav")]).unwrap();
        assert_eq!(files, vec![PathBuf::from("/songs/take1.wav")]);
    }
}
