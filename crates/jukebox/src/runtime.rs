//! Jukebox runtime.
//!
//! Wires the timer engine, the player and both consumer views, then serves the
//! console until `quit`, end of input, or Ctrl-C.

use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use jukebox_core::{DisplayCursor, DisplaySnapshot, EventStream, Player, WaitError};

use crate::config::JukeboxConfig;
use crate::console::{self, ConsoleCommand};
use crate::timer_engine::TimerEngine;

/// Player plus the consumers registered on it.
#[derive(Clone)]
pub struct Jukebox {
    pub player: Player,
    pub events: Arc<EventStream>,
    pub display: Arc<DisplaySnapshot>,
}

impl Jukebox {
    /// Start the engine and player and load the configured playlist.
    pub fn start(config: &JukeboxConfig) -> Result<Self> {
        let engine = Arc::new(TimerEngine::new(config.engine.clone()));
        let player = Player::new(engine).context("start player")?;
        let events = Arc::new(EventStream::new());
        let display = Arc::new(DisplaySnapshot::new());
        player.add_observer(events.clone());
        player.add_observer(display.clone());
        player.set_playlist(config.playlist.clone());
        if config.autoplay {
            player.play();
        }
        Ok(Self {
            player,
            events,
            display,
        })
    }

    /// Stop playback and release both consumers' waiters.
    pub fn shutdown(&self) {
        self.player.shutdown();
        self.events.close();
        self.display.close();
    }
}

/// Run the jukebox until the console exits.
pub fn run(config: JukeboxConfig) -> Result<()> {
    let jukebox = Jukebox::start(&config)?;
    tracing::info!(
        items = config.playlist.len(),
        autoplay = config.autoplay,
        "jukebox started"
    );

    let for_signal = jukebox.clone();
    ctrlc::set_handler(move || {
        for_signal.shutdown();
        std::process::exit(130);
    })
    .context("install ctrl-c handler")?;

    let printers = spawn_printers(&jukebox)?;

    let stdin = std::io::stdin();
    let mut out = std::io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("read console input")?;
        if line.trim().is_empty() {
            continue;
        }
        let cmd = match line.parse::<ConsoleCommand>() {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        if !console::execute(cmd, &jukebox.player, &jukebox.display, &mut out)? {
            break;
        }
    }

    jukebox.shutdown();
    for handle in printers {
        let _ = handle.join();
    }
    tracing::info!("jukebox stopped");
    Ok(())
}

/// One thread per consumer contract, printing until the consumer is closed.
fn spawn_printers(jukebox: &Jukebox) -> Result<Vec<JoinHandle<()>>> {
    let events = jukebox.events.clone();
    let event_printer = std::thread::Builder::new()
        .name("event-stream".to_string())
        .spawn(move || {
            loop {
                match events.take_next() {
                    Ok(event) => println!("[event] {}", console::format_event(&event)),
                    Err(WaitError::Closed) => break,
                    Err(e) => {
                        tracing::warn!("event stream consumer stopped: {e}");
                        break;
                    }
                }
            }
        })?;

    let display = jukebox.display.clone();
    let display_printer = std::thread::Builder::new()
        .name("display-poll".to_string())
        .spawn(move || {
            let mut cursor = DisplayCursor::default();
            loop {
                match display.await_update(&mut cursor) {
                    Ok(data) => println!("[display] {}", console::format_display(&data)),
                    Err(WaitError::Closed) => break,
                    Err(e) => {
                        tracing::warn!("display consumer stopped: {e}");
                        break;
                    }
                }
            }
        })?;

    Ok(vec![event_printer, display_printer])
}
