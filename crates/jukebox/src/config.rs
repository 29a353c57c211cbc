//! Configuration loading and parsing.
//!
//! Defines the jukebox config schema and resolves defaults.

use std::path::Path;

use anyhow::{Context, Result};
use jukebox_types::MediaItem;
use serde::Deserialize;

const DEFAULT_LOG_FILTER: &str = "info,jukebox=info,jukebox_core=info";

/// Top-level jukebox configuration loaded from TOML.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct JukeboxConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
    /// Start playing the first item after startup.
    pub autoplay: bool,
    /// Simulated engine settings.
    pub engine: EngineConfig,
    /// Initial playlist.
    pub playlist: Vec<MediaItem>,
}

/// Timer engine settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulated playing time per item in milliseconds.
    pub track_ms: u64,
    /// Playing time before an item's tags are reported.
    pub tag_delay_ms: u64,
    /// Whether a session fault is answered by recreating the session.
    pub recover_errors: bool,
    /// Item ids whose first session faults halfway through.
    pub fail_items: Vec<String>,
}

impl Default for JukeboxConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            autoplay: true,
            engine: EngineConfig::default(),
            playlist: Vec::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            track_ms: 3000,
            tag_delay_ms: 200,
            recover_errors: true,
            fail_items: Vec::new(),
        }
    }
}

impl JukeboxConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let cfg = toml::from_str::<JukeboxConfig>(raw)?;
        if cfg.engine.track_ms == 0 {
            anyhow::bail!("engine.track_ms must be greater than zero");
        }
        Ok(cfg)
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Playlist entry for a command-line item; the title is the file stem.
pub fn item_from_arg(arg: &str) -> MediaItem {
    let title = Path::new(arg)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(arg);
    MediaItem::new(arg, title)
}
