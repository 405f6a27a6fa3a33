use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ALL_TRACKS_PLAYLIST: &str = "All Tracks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlaybackMode {
    #[default]
    Sequential,
    Repeat,
    WeightedRandom,
}

impl PlaybackMode {
    pub fn next(self) -> Self {
        match self {
            Self::Sequential => Self::WeightedRandom,
            Self::WeightedRandom => Self::Repeat,
            Self::Repeat => Self::Sequential,
        }
    }

    /// Token written to the mode config file.
    pub fn token(self) -> &'static str {
        match self {
            Self::Sequential => "SEQUENZIALE",
            Self::Repeat => "RIPETI",
            Self::WeightedRandom => "CASUALE",
        }
    }

    pub fn from_token(raw: &str) -> Option<Self> {
        match raw.trim() {
            "SEQUENZIALE" => Some(Self::Sequential),
            "RIPETI" => Some(Self::Repeat),
            "CASUALE" => Some(Self::WeightedRandom),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Repeat => "repeat",
            Self::WeightedRandom => "weighted random",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

impl Theme {
    pub fn token(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn from_token(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("dark") {
            Self::Dark
        } else {
            Self::Light
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub path: PathBuf,
    #[serde(default)]
    pub author: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            author: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub original_order: Vec<Track>,
    #[serde(default)]
    pub custom_order: Option<Vec<Track>>,
    #[serde(default)]
    pub cover: Option<PathBuf>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_tracks(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let mut playlist = Self::new(name);
        for track in tracks {
            playlist.add_track(track);
        }
        playlist
    }

    /// Returns false when a track with the same title is already present.
    pub fn add_track(&mut self, track: Track) -> bool {
        if self.track(&track.title).is_some() {
            return false;
        }
        self.original_order.push(track.clone());
        if let Some(custom) = self.custom_order.as_mut() {
            custom.push(track.clone());
        }
        self.tracks.push(track);
        true
    }

    pub fn remove_track(&mut self, title: &str) -> bool {
        let wanted = display_key(title);
        let before = self.tracks.len();
        self.tracks.retain(|track| display_key(&track.title) != wanted);
        self.original_order
            .retain(|track| display_key(&track.title) != wanted);
        if let Some(custom) = self.custom_order.as_mut() {
            custom.retain(|track| display_key(&track.title) != wanted);
        }
        self.tracks.len() != before
    }

    /// Looks a track up by title, ignoring case, surrounding whitespace and
    /// underscores written in place of spaces.
    pub fn track(&self, title: &str) -> Option<&Track> {
        let wanted = display_key(title);
        self.tracks
            .iter()
            .find(|track| display_key(&track.title) == wanted)
    }

    pub fn titles(&self) -> Vec<String> {
        self.tracks.iter().map(|track| track.title.clone()).collect()
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.tracks.iter().any(|track| track.title == title)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn sort_alphabetically(&mut self) {
        self.tracks
            .sort_by_cached_key(|track| track.title.to_lowercase());
    }

    pub fn restore_original_order(&mut self) {
        self.tracks = self.original_order.clone();
    }

    /// Reorders the playlist to `titles`. Unknown titles are ignored and
    /// tracks missing from `titles` keep their relative order at the end.
    pub fn set_custom_order(&mut self, titles: &[String]) {
        let mut remaining = self.tracks.clone();
        let mut ordered = Vec::with_capacity(remaining.len());
        for title in titles {
            if let Some(pos) = remaining.iter().position(|track| &track.title == title) {
                ordered.push(remaining.remove(pos));
            }
        }
        ordered.extend(remaining);
        self.custom_order = Some(ordered.clone());
        self.tracks = ordered;
    }

    /// Points every track at `dir`, keeping each file name.
    pub fn relocate(&mut self, dir: &Path) {
        let rewrite = |track: &mut Track| {
            if let Some(file_name) = track.path.file_name() {
                track.path = dir.join(file_name);
            }
        };
        self.tracks.iter_mut().for_each(rewrite);
        self.original_order.iter_mut().for_each(rewrite);
        if let Some(custom) = self.custom_order.as_mut() {
            custom.iter_mut().for_each(rewrite);
        }
    }
}

/// Title as shown in lists: file-name underscores become spaces.
pub fn display_title(raw: &str) -> String {
    raw.trim().replace('_', " ")
}

fn display_key(raw: &str) -> String {
    display_title(raw).to_lowercase()
}
