use crate::model::{PlaybackMode, Theme};
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "sonora";
const MODE_FILE: &str = "playbackMode.config";
const THEME_FILE: &str = "theme.config";
const PLAYLISTS_DIR: &str = "playlists";
pub const TRACK_COUNTS_FILE: &str = "plays.count";
pub const PLAYLIST_COUNTS_FILE: &str = "playlist_plays.count";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("SONORA_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

/// `~/Music`, when a home directory is known.
pub fn default_music_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Music"))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

/// Locations of every file the player persists, rooted at one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub root: PathBuf,
}

impl ConfigPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve() -> Result<Self> {
        Ok(Self::new(ensure_config_dir()?))
    }

    pub fn mode_file(&self) -> PathBuf {
        self.root.join(MODE_FILE)
    }

    pub fn theme_file(&self) -> PathBuf {
        self.root.join(THEME_FILE)
    }

    pub fn track_counts_file(&self) -> PathBuf {
        self.root.join(TRACK_COUNTS_FILE)
    }

    pub fn playlist_counts_file(&self) -> PathBuf {
        self.root.join(PLAYLIST_COUNTS_FILE)
    }

    pub fn playlists_dir(&self) -> PathBuf {
        self.root.join(PLAYLISTS_DIR)
    }
}

/// Missing file or unknown token falls back to sequential playback.
pub fn load_mode(path: &Path) -> PlaybackMode {
    let Ok(raw) = fs::read_to_string(path) else {
        return PlaybackMode::default();
    };
    match PlaybackMode::from_token(&raw) {
        Some(mode) => {
            tracing::debug!(mode = mode.label(), "loaded playback mode");
            mode
        }
        None => {
            tracing::warn!(token = raw.trim(), "unknown playback mode token, using sequential");
            PlaybackMode::default()
        }
    }
}

pub fn save_mode(path: &Path, mode: PlaybackMode) -> Result<()> {
    write_token(path, mode.token())
}

pub fn load_theme(path: &Path) -> Theme {
    fs::read_to_string(path)
        .map(|raw| Theme::from_token(&raw))
        .unwrap_or_default()
}

pub fn save_theme(path: &Path, theme: Theme) -> Result<()> {
    write_token(path, theme.token())
}

fn write_token(path: &Path, token: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, token).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
