//! Line-oriented control console.

use std::io::Write;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use jukebox_core::{DisplaySnapshot, Player};
use jukebox_types::{DisplayData, PlayerEvent};

/// One console command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Play,
    Pause,
    Stop,
    Next,
    Prev,
    State,
    List,
    Show,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "play" | "p" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "stop" | "s" => Ok(Self::Stop),
            "next" | "n" => Ok(Self::Next),
            "prev" | "previous" => Ok(Self::Prev),
            "state" => Ok(Self::State),
            "list" | "ls" => Ok(Self::List),
            "show" => Ok(Self::Show),
            "help" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(anyhow!("unknown command {other:?} (try `help`)")),
        }
    }
}

const HELP: &str = "commands: play, pause, stop, next, prev, state, list, show, quit";

/// Run `cmd` against the player. Returns `false` when the console should exit.
pub fn execute(
    cmd: ConsoleCommand,
    player: &Player,
    display: &DisplaySnapshot,
    out: &mut impl Write,
) -> Result<bool> {
    match cmd {
        ConsoleCommand::Play => player.play(),
        ConsoleCommand::Pause => player.pause(),
        ConsoleCommand::Stop => player.stop(),
        ConsoleCommand::Next => player.next(),
        ConsoleCommand::Prev => player.previous(),
        ConsoleCommand::State => {
            let current = player
                .current_item()
                .map(|item| item.display_title().to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(out, "state: {} ({current})", player.state())?;
        }
        ConsoleCommand::List => {
            let playlist = player.playlist();
            if playlist.is_empty() {
                writeln!(out, "playlist is empty")?;
            }
            for (idx, item) in playlist.items().iter().enumerate() {
                let marker = if playlist.cursor() == Some(idx) { '>' } else { ' ' };
                writeln!(out, "{marker} {idx}: {}", item.display_title())?;
            }
        }
        ConsoleCommand::Show => writeln!(out, "now playing: {}", format_display(&display.peek()))?,
        ConsoleCommand::Help => writeln!(out, "{HELP}")?,
        ConsoleCommand::Quit => return Ok(false),
    }
    Ok(true)
}

/// One-line rendering of an event-stream entry.
pub fn format_event(event: &PlayerEvent) -> String {
    match event {
        PlayerEvent::StateChanged { state } => format!("state -> {state}"),
        PlayerEvent::Error { message } => format!("error: {message}"),
        PlayerEvent::Tag { key, value } => format!("tag {key}={value}"),
        PlayerEvent::NewSource { item } => format!("source -> {}", item.display_title()),
        PlayerEvent::PlaylistChanged { change, cursor } => match cursor {
            Some(idx) => format!("playlist {change:?} (cursor {idx})").to_lowercase(),
            None => format!("playlist {change:?} (empty)").to_lowercase(),
        },
    }
}

pub fn format_display(data: &DisplayData) -> String {
    if data.is_empty() {
        return "-".to_string();
    }
    data.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use jukebox_core::PlaybackEngine;
    use jukebox_types::{MediaItem, PlaybackState, PlaylistChange};

    use crate::config::EngineConfig;
    use crate::timer_engine::TimerEngine;

    fn player() -> (Player, Arc<DisplaySnapshot>) {
        let engine: Arc<dyn PlaybackEngine> = Arc::new(TimerEngine::new(EngineConfig {
            track_ms: 60_000,
            tag_delay_ms: 60_000,
            ..EngineConfig::default()
        }));
        let player = Player::new(engine).unwrap();
        let display = Arc::new(DisplaySnapshot::new());
        player.add_observer(display.clone());
        player.set_playlist(vec![MediaItem::new("a", "First"), MediaItem::new("b", "Second")]);
        (player, display)
    }

    fn run(player: &Player, display: &DisplaySnapshot, line: &str) -> (bool, String) {
        let mut out = Vec::new();
        let cmd: ConsoleCommand = line.parse().unwrap();
        let keep_going = execute(cmd, player, display, &mut out).unwrap();
        (keep_going, String::from_utf8(out).unwrap())
    }

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!("play".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Play);
        assert_eq!(" NEXT ".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Next);
        assert_eq!("previous".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Prev);
        assert_eq!("q".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Quit);
        let err = "rewind".parse::<ConsoleCommand>().unwrap_err();
        assert!(err.to_string().contains("rewind"));
    }

    #[test]
    fn commands_drive_the_player() {
        let (player, display) = player();

        run(&player, &display, "play");
        assert_eq!(player.state(), PlaybackState::Playing);
        run(&player, &display, "next");
        assert_eq!(player.current_item(), Some(MediaItem::new("b", "Second")));
        run(&player, &display, "pause");
        assert_eq!(player.state(), PlaybackState::Paused);
        run(&player, &display, "prev");
        assert_eq!(player.playlist().cursor(), Some(0));
        run(&player, &display, "stop");
        assert_eq!(player.state(), PlaybackState::Stopped);

        let (keep_going, _) = run(&player, &display, "quit");
        assert!(!keep_going);
        player.shutdown();
    }

    #[test]
    fn list_marks_the_cursor() {
        let (player, display) = player();
        let (_, out) = run(&player, &display, "list");
        assert_eq!(out, "> 0: First\n  1: Second\n");
        player.shutdown();
    }

    #[test]
    fn state_and_show_report_current_item() {
        let (player, display) = player();
        run(&player, &display, "play");

        let (_, state) = run(&player, &display, "state");
        assert_eq!(state, "state: playing (First)\n");
        let (_, show) = run(&player, &display, "show");
        assert_eq!(show, "now playing: source=First\n");
        player.shutdown();
    }

    #[test]
    fn formats_events() {
        assert_eq!(
            format_event(&PlayerEvent::state_changed(PlaybackState::Paused)),
            "state -> paused"
        );
        assert_eq!(
            format_event(&PlayerEvent::PlaylistChanged {
                change: PlaylistChange::Advanced,
                cursor: Some(2),
            }),
            "playlist advanced (cursor 2)"
        );
        assert_eq!(format_event(&PlayerEvent::error("boom")), "error: boom");
        assert_eq!(format_display(&DisplayData::new()), "-");
    }
}
