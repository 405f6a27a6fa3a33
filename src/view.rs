use crate::model::Playlist;
use crate::sync::lock;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlayerStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }
}

/// What the playback controller needs from whatever shows the player.
///
/// Calls may come from the monitor thread, so implementations must be
/// shareable and cheap.
pub trait PlayerView: Send + Sync {
    fn selected_title(&self) -> Option<String>;
    fn select_title(&self, title: &str);
    fn displayed_playlist(&self) -> Option<Arc<Playlist>>;
    fn show_progress(&self, percentage: u8);
    fn refresh_controls(&self, status: PlayerStatus);
    fn show_now_playing(&self, title: Option<&str>);
}

#[derive(Debug, Clone, Default)]
struct ViewState {
    selected: Option<String>,
    displayed: Option<Arc<Playlist>>,
    progress: u8,
    status: PlayerStatus,
    now_playing: Option<String>,
    progress_updates: u64,
}

/// A view without a screen. It records what it was told so callers can ask
/// later, which is all the shell and the tests need.
#[derive(Debug, Default)]
pub struct HeadlessView {
    state: Mutex<ViewState>,
}

impl HeadlessView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playlist(playlist: Playlist) -> Self {
        let view = Self::new();
        view.set_displayed(Some(Arc::new(playlist)));
        view
    }

    pub fn set_displayed(&self, playlist: Option<Arc<Playlist>>) {
        let mut state = lock(&self.state);
        state.displayed = playlist;
        state.selected = None;
    }

    pub fn progress(&self) -> u8 {
        lock(&self.state).progress
    }

    pub fn progress_updates(&self) -> u64 {
        lock(&self.state).progress_updates
    }

    pub fn status(&self) -> PlayerStatus {
        lock(&self.state).status
    }

    pub fn now_playing(&self) -> Option<String> {
        lock(&self.state).now_playing.clone()
    }
}

impl PlayerView for HeadlessView {
    fn selected_title(&self) -> Option<String> {
        lock(&self.state).selected.clone()
    }

    fn select_title(&self, title: &str) {
        lock(&self.state).selected = Some(title.to_string());
    }

    fn displayed_playlist(&self) -> Option<Arc<Playlist>> {
        lock(&self.state).displayed.clone()
    }

    fn show_progress(&self, percentage: u8) {
        let mut state = lock(&self.state);
        state.progress = percentage.min(100);
        state.progress_updates += 1;
    }

    fn refresh_controls(&self, status: PlayerStatus) {
        lock(&self.state).status = status;
    }

    fn show_now_playing(&self, title: Option<&str>) {
        lock(&self.state).now_playing = title.map(str::to_string);
    }
}
