use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::{JukeboxConfig, item_from_arg};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "jukebox", version = VERSION)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the simulated track length in milliseconds
    #[arg(long)]
    pub track_ms: Option<u64>,

    /// Do not start playing after startup
    #[arg(long)]
    pub no_autoplay: bool,

    /// Items appended to the configured playlist (paths or ids)
    pub items: Vec<String>,
}

impl Args {
    /// Load the config file (or defaults) and apply command-line overrides.
    pub fn resolve_config(&self) -> Result<JukeboxConfig> {
        let mut cfg = match self.config.as_deref() {
            Some(path) => JukeboxConfig::load(path)?,
            None => JukeboxConfig::default(),
        };
        if let Some(track_ms) = self.track_ms {
            if track_ms == 0 {
                anyhow::bail!("--track-ms must be greater than zero");
            }
            cfg.engine.track_ms = track_ms;
        }
        if self.no_autoplay {
            cfg.autoplay = false;
        }
        cfg.playlist
            .extend(self.items.iter().map(|arg| item_from_arg(arg)));
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jukebox_types::MediaItem;

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let args = Args::try_parse_from([
            "jukebox",
            "--track-ms",
            "750",
            "--no-autoplay",
            "one.flac",
            "dir/two.mp3",
        ])
        .unwrap();

        let cfg = args.resolve_config().unwrap();
        assert_eq!(cfg.engine.track_ms, 750);
        assert!(!cfg.autoplay);
        assert_eq!(
            cfg.playlist,
            vec![
                MediaItem::new("one.flac", "one"),
                MediaItem::new("dir/two.mp3", "two"),
            ]
        );
    }

    #[test]
    fn zero_track_length_is_rejected() {
        let args = Args::try_parse_from(["jukebox", "--track-ms", "0"]).unwrap();
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = Args::try_parse_from([
            "jukebox",
            "--config",
            "/nonexistent/jukebox.toml",
        ])
        .unwrap();
        assert!(args.resolve_config().is_err());
    }
}
