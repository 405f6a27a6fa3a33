//! The playback facade every UI event goes through.
//!
//! The controller owns the session, the queue, the selector and both play
//! counters. It starts the [`PlaybackMonitor`] and hands it a weak reference
//! to itself, so dropping the last strong handle shuts the monitor down.

use crate::config::{self, ConfigPaths};
use crate::counts::PlayCountStore;
use crate::model::{ALL_TRACKS_PLAYLIST, PlaybackMode, Playlist, Track};
use crate::monitor::{AdvanceTarget, MonitorPolicy, PlaybackMonitor};
use crate::queue::PlaybackQueue;
use crate::selection::{SelectionEngine, sequential_before};
use crate::session::{DecodeBackend, SessionConfig, TrackOpener, TrackSession};
use crate::stats::{self, RankedEntry};
use crate::sync::{Signal, SingleFlight, lock};
use crate::view::{PlayerStatus, PlayerView};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

/// At or below this progress "previous" goes to the prior title instead of
/// restarting the current one.
pub const PREVIOUS_RESTART_THRESHOLD: u8 = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerOptions {
    pub session: SessionConfig,
    pub monitor: MonitorPolicy,
    /// Fixed seed for the random picker; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

#[derive(Debug)]
struct PlaybackState {
    mode: PlaybackMode,
    currently_playing: Option<String>,
    active_playlist: Arc<Playlist>,
}

pub struct PlaybackController {
    session: Arc<TrackSession>,
    signal: Arc<Signal>,
    view: Arc<dyn PlayerView>,
    monitor: OnceLock<PlaybackMonitor>,
    state: Mutex<PlaybackState>,
    queue: Mutex<PlaybackQueue>,
    selector: Mutex<SelectionEngine>,
    track_counts: Mutex<PlayCountStore>,
    playlist_counts: Mutex<PlayCountStore>,
    paths: ConfigPaths,
    starting_track: SingleFlight,
    changing_track: SingleFlight,
    suppressed: AtomicBool,
}

impl PlaybackController {
    pub fn new(
        view: Arc<dyn PlayerView>,
        opener: Arc<dyn TrackOpener>,
        backend: Arc<dyn DecodeBackend>,
        paths: ConfigPaths,
        options: ControllerOptions,
    ) -> Result<Arc<Self>> {
        let session = Arc::new(TrackSession::new(opener, backend, options.session));
        let selector = match options.rng_seed {
            Some(seed) => SelectionEngine::seeded(seed),
            None => SelectionEngine::new(),
        };
        let mode = config::load_mode(&paths.mode_file());
        tracing::info!(mode = mode.label(), root = %paths.root.display(), "playback controller ready");

        let controller = Arc::new(Self {
            session: Arc::clone(&session),
            signal: Arc::new(Signal::new()),
            view,
            monitor: OnceLock::new(),
            state: Mutex::new(PlaybackState {
                mode,
                currently_playing: None,
                active_playlist: Arc::new(Playlist::new(ALL_TRACKS_PLAYLIST)),
            }),
            queue: Mutex::new(PlaybackQueue::new()),
            selector: Mutex::new(selector),
            track_counts: Mutex::new(PlayCountStore::open(paths.track_counts_file())),
            playlist_counts: Mutex::new(PlayCountStore::open(paths.playlist_counts_file())),
            paths,
            starting_track: SingleFlight::new(),
            changing_track: SingleFlight::new(),
            suppressed: AtomicBool::new(false),
        });

        let weak_self: Weak<Self> = Arc::downgrade(&controller);
        let target: Weak<dyn AdvanceTarget> = weak_self;
        let monitor = PlaybackMonitor::spawn(
            session,
            Arc::clone(&controller.signal),
            Arc::clone(&controller.view),
            target,
            options.monitor,
        )?;
        if controller.monitor.set(monitor).is_err() {
            tracing::warn!("playback monitor was already running");
        }

        controller.refresh_view();
        Ok(controller)
    }

    /// Play, pause or resume depending on where the session is.
    pub fn toggle_play_pause(&self) {
        if self.session.is_playing() {
            self.session.pause();
            tracing::info!(offset = self.session.paused_offset(), "paused");
        } else if self.has_resumable_session() {
            if self.session.resume() {
                self.signal.release();
                tracing::info!("resumed");
            }
        } else {
            match self.selected_or_first_title() {
                Some(title) => self.play_selected(&title),
                None => tracing::debug!("nothing selected and nothing displayed"),
            }
        }
        self.refresh_view();
    }

    /// Starts `title` from the displayed playlist, which becomes the active
    /// playlist.
    pub fn play_selected(&self, title: &str) {
        let Some(_starting) = self.starting_track.try_begin() else {
            tracing::debug!(title, "play ignored, a track is already starting");
            return;
        };
        let Some(playlist) = self.view.displayed_playlist() else {
            tracing::warn!(title, "no playlist is displayed");
            return;
        };
        let Some(track) = playlist.track(title).cloned() else {
            tracing::warn!(
                title,
                playlist = %playlist.name,
                available = ?playlist.titles(),
                "selected title is not in the displayed playlist"
            );
            return;
        };
        self.start(playlist, track);
    }

    /// Moves on to whatever the queue or the playback mode picks next.
    pub fn advance(&self) {
        let Some(_changing) = self.changing_track.try_begin() else {
            tracing::debug!("advance ignored, a track change is in flight");
            return;
        };
        let (mode, current, playlist) = self.selection_context();

        if mode == PlaybackMode::WeightedRandom
            && let Err(err) = lock(&self.track_counts).reload()
        {
            tracing::warn!("failed to reload play counts: {err:#}");
        }
        let counts = lock(&self.track_counts).counts().clone();
        let titles = playlist.titles();
        let next = {
            let mut queue = lock(&self.queue);
            lock(&self.selector).select_next(mode, &titles, current.as_deref(), &mut queue, &counts)
        };
        let Some(next) = next else {
            tracing::debug!(playlist = %playlist.name, "nothing left to play");
            return;
        };
        let Some(track) = playlist.track(&next).cloned() else {
            tracing::warn!(
                title = %next,
                playlist = %playlist.name,
                available = ?titles,
                "next title is not in the active playlist"
            );
            return;
        };
        self.start(playlist, track);
    }

    /// Early in a track goes back one title; later it restarts the track.
    pub fn previous(&self) {
        if self.session.current_percentage() > PREVIOUS_RESTART_THRESHOLD {
            self.seek(0);
            return;
        }
        let Some(_changing) = self.changing_track.try_begin() else {
            tracing::debug!("previous ignored, a track change is in flight");
            return;
        };
        let (_, current, playlist) = self.selection_context();
        let Some(title) = sequential_before(&playlist.titles(), current.as_deref()) else {
            return;
        };
        if let Some(track) = playlist.track(&title).cloned() {
            self.start(playlist, track);
        }
    }

    pub fn seek(&self, percentage: i32) {
        if !(0..=100).contains(&percentage) {
            tracing::debug!(percentage, "seek out of range ignored");
            return;
        }
        if self.session.current_track().is_none() {
            return;
        }
        self.signal.drain();
        self.session.stop();
        if self.session.seek_to_percentage(percentage) {
            self.signal.release();
        }
        self.refresh_view();
    }

    pub fn stop(&self) {
        self.signal.drain();
        self.session.stop();
        lock(&self.state).currently_playing = None;
        self.view.show_now_playing(None);
        self.view.show_progress(0);
        self.refresh_view();
    }

    pub fn set_mode(&self, mode: PlaybackMode) {
        lock(&self.state).mode = mode;
        if let Err(err) = config::save_mode(&self.paths.mode_file(), mode) {
            tracing::warn!("failed to save playback mode: {err:#}");
        }
        tracing::info!(mode = mode.label(), "playback mode changed");
    }

    pub fn cycle_mode(&self) -> PlaybackMode {
        let next = self.mode().next();
        self.set_mode(next);
        next
    }

    pub fn mode(&self) -> PlaybackMode {
        lock(&self.state).mode
    }

    pub fn enqueue(&self, title: &str) -> bool {
        let added = lock(&self.queue).enqueue(title);
        if !added {
            tracing::debug!(title, "already queued");
        }
        added
    }

    pub fn enqueue_top(&self, title: &str) -> bool {
        lock(&self.queue).enqueue_top(title)
    }

    pub fn queue_snapshot(&self) -> Vec<String> {
        lock(&self.queue).snapshot()
    }

    /// Swaps the whole queue for `order` in one step.
    pub fn replace_queue(&self, order: Vec<String>) {
        lock(&self.queue).replace_all(order);
    }

    pub fn remove_from_queue(&self, title: &str) -> bool {
        lock(&self.queue).remove(title)
    }

    pub fn clear_queue(&self) {
        lock(&self.queue).clear();
    }

    pub fn status(&self) -> PlayerStatus {
        if self.session.is_playing() {
            PlayerStatus::Playing
        } else if self.has_resumable_session() {
            PlayerStatus::Paused
        } else {
            PlayerStatus::Stopped
        }
    }

    pub fn now_playing(&self) -> Option<String> {
        lock(&self.state).currently_playing.clone()
    }

    pub fn progress(&self) -> u8 {
        self.session.current_percentage()
    }

    pub fn active_playlist(&self) -> Arc<Playlist> {
        Arc::clone(&lock(&self.state).active_playlist)
    }

    pub fn play_count(&self, title: &str) -> u64 {
        lock(&self.track_counts).get(title)
    }

    pub fn playlist_play_count(&self, name: &str) -> u64 {
        lock(&self.playlist_counts).get(name)
    }

    pub fn top_tracks(&self, limit: usize) -> Vec<RankedEntry> {
        stats::rank(lock(&self.track_counts).counts(), limit)
    }

    pub fn top_playlists(&self, limit: usize) -> Vec<RankedEntry> {
        stats::rank(lock(&self.playlist_counts).counts(), limit)
    }

    pub fn set_auto_advance_suppressed(&self, suppressed: bool) {
        self.suppressed.store(suppressed, Ordering::SeqCst);
    }

    pub fn is_auto_advance_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst)
    }

    /// Holds auto-advance off until the guard drops, then restores the
    /// previous setting.
    pub fn suppress_auto_advance(&self) -> AutoAdvanceGuard<'_> {
        let previous = self.suppressed.swap(true, Ordering::SeqCst);
        AutoAdvanceGuard {
            suppressed: &self.suppressed,
            previous,
        }
    }

    fn start(&self, playlist: Arc<Playlist>, track: Track) -> bool {
        self.signal.drain();
        self.session.stop();
        let started = self.session.play(&track);
        {
            let mut state = lock(&self.state);
            state.currently_playing = Some(track.title.clone());
            state.active_playlist = Arc::clone(&playlist);
        }

        if started {
            self.signal.release();
            self.record_play(&track.title, &playlist.name);
            tracing::info!(title = %track.title, playlist = %playlist.name, "now playing");
        }
        self.view.select_title(&track.title);
        self.view
            .show_now_playing(started.then_some(track.title.as_str()));
        self.refresh_view();
        started
    }

    fn record_play(&self, title: &str, playlist: &str) {
        if let Err(err) = lock(&self.track_counts).increment(title) {
            tracing::warn!(title, "failed to record play: {err:#}");
        }
        if let Err(err) = lock(&self.playlist_counts).increment(playlist) {
            tracing::warn!(playlist, "failed to record playlist play: {err:#}");
        }
    }

    /// Mode, current title and the playlist to pick from. Before anything has
    /// played the displayed playlist stands in for the active one.
    fn selection_context(&self) -> (PlaybackMode, Option<String>, Arc<Playlist>) {
        let (mode, current, active) = {
            let state = lock(&self.state);
            (
                state.mode,
                state.currently_playing.clone(),
                Arc::clone(&state.active_playlist),
            )
        };
        let playlist = if current.is_none() {
            self.view.displayed_playlist().unwrap_or(active)
        } else {
            active
        };
        (mode, current, playlist)
    }

    fn has_resumable_session(&self) -> bool {
        self.session.is_paused()
            && self.session.paused_offset() > 0
            && self.session.current_track().is_some()
    }

    fn selected_or_first_title(&self) -> Option<String> {
        if let Some(title) = self.view.selected_title() {
            return Some(title);
        }
        let first = self.view.displayed_playlist()?.titles().into_iter().next()?;
        self.view.select_title(&first);
        Some(first)
    }

    fn refresh_view(&self) {
        self.view.refresh_controls(self.status());
    }
}

impl AdvanceTarget for PlaybackController {
    fn advance(&self) {
        PlaybackController::advance(self);
    }

    fn auto_advance_suppressed(&self) -> bool {
        self.is_auto_advance_suppressed()
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.get() {
            monitor.shutdown();
        }
        self.session.stop();
    }
}

pub struct AutoAdvanceGuard<'a> {
    suppressed: &'a AtomicBool,
    previous: bool,
}

impl Drop for AutoAdvanceGuard<'_> {
    fn drop(&mut self) {
        self.suppressed.store(self.previous, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PacedBackend;
    use crate::session::{CancelToken, MeteredInput, OpenedTrack};
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;
    use crate::view::HeadlessView;
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::{TempDir, tempdir};

    struct SizedOpener {
        len: usize,
    }

    impl TrackOpener for SizedOpener {
        fn open(&self, path: &Path) -> Result<OpenedTrack> {
            if path.ends_with("missing.mp3") {
                anyhow::bail!("no such file {}", path.display());
            }
            Ok(OpenedTrack::new(
                Cursor::new(vec![0_u8; self.len]),
                self.len as u64,
            ))
        }
    }

    fn mix() -> Playlist {
        Playlist::with_tracks(
            "mix",
            vec![
                Track::new("A", "/music/A.mp3"),
                Track::new("B", "/music/B.mp3"),
                Track::new("C", "/music/C.mp3"),
            ],
        )
    }

    struct Rig {
        controller: Arc<PlaybackController>,
        view: Arc<HeadlessView>,
        paths: ConfigPaths,
        _dir: TempDir,
    }

    /// `bytes_per_second` against 1000-byte tracks decides how long each
    /// track lasts.
    fn rig(bytes_per_second: u64, monitor_tick: Duration) -> Rig {
        let dir = tempdir().expect("tempdir");
        let paths = ConfigPaths::new(dir.path());
        let view = Arc::new(HeadlessView::with_playlist(mix()));
        let controller = PlaybackController::new(
            view.clone(),
            Arc::new(SizedOpener { len: 1_000 }),
            Arc::new(PacedBackend::new(bytes_per_second, 10)),
            paths.clone(),
            ControllerOptions {
                session: SessionConfig {
                    sample_interval: Duration::from_millis(2),
                    join_timeout: Duration::from_secs(2),
                },
                monitor: MonitorPolicy {
                    tick: monitor_tick,
                    stall_samples: 0,
                },
                rng_seed: Some(3),
            },
        )
        .expect("controller");
        Rig {
            controller,
            view,
            paths,
            _dir: dir,
        }
    }

    /// Runs until cancelled and remembers how many decodes ever overlapped.
    #[derive(Default)]
    struct OverlapBackend {
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl DecodeBackend for OverlapBackend {
        fn run(&self, _input: MeteredInput, cancel: &CancelToken) -> Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn slow_rig() -> Rig {
        rig(500, Duration::from_secs(60))
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn play_selected_counts_track_and_playlist() {
        let rig = slow_rig();
        rig.controller.play_selected("B");

        assert_eq!(rig.controller.now_playing().as_deref(), Some("B"));
        assert_eq!(rig.controller.status(), PlayerStatus::Playing);
        assert_eq!(rig.controller.play_count("B"), 1);
        assert_eq!(rig.controller.playlist_play_count("mix"), 1);
        assert_eq!(rig.view.now_playing().as_deref(), Some("B"));

        let raw = fs::read_to_string(rig.paths.track_counts_file()).expect("counts");
        assert_eq!(raw, "B=1\n");
        let raw = fs::read_to_string(rig.paths.playlist_counts_file()).expect("counts");
        assert_eq!(raw, "mix=1\n");
    }

    #[test]
    fn simultaneous_plays_leave_one_decode_running() {
        let dir = tempdir().expect("tempdir");
        let backend = Arc::new(OverlapBackend::default());
        let view = Arc::new(HeadlessView::with_playlist(mix()));
        let controller = PlaybackController::new(
            view.clone(),
            Arc::new(SizedOpener { len: 1_000 }),
            backend.clone(),
            ConfigPaths::new(dir.path()),
            ControllerOptions {
                monitor: MonitorPolicy {
                    tick: Duration::from_secs(60),
                    stall_samples: 0,
                },
                ..ControllerOptions::default()
            },
        )
        .expect("controller");

        let callers = 8;
        let barrier = Arc::new(Barrier::new(callers));
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let controller = Arc::clone(&controller);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    controller.play_selected("A");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("caller thread");
        }

        assert!(wait_until(|| backend.active.load(Ordering::SeqCst) == 1));
        assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(controller.now_playing().as_deref(), Some("A"));
        assert_eq!(view.now_playing().as_deref(), Some("A"));
        assert!(controller.session.decode_starts() >= 1);
        assert_eq!(controller.play_count("A"), controller.session.decode_starts());

        controller.stop();
        assert_eq!(backend.active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_title_is_not_played() {
        let rig = slow_rig();
        rig.controller.play_selected("Z");

        assert_eq!(rig.controller.now_playing(), None);
        assert_eq!(rig.controller.status(), PlayerStatus::Stopped);
        assert!(rig.controller.top_tracks(10).is_empty());
    }

    #[test]
    fn failed_open_records_nothing() {
        let rig = slow_rig();
        rig.view.set_displayed(Some(Arc::new(Playlist::with_tracks(
            "broken",
            vec![Track::new("gone", "/music/missing.mp3")],
        ))));
        rig.controller.play_selected("gone");

        assert_eq!(rig.controller.status(), PlayerStatus::Stopped);
        assert_eq!(rig.controller.play_count("gone"), 0);
    }

    #[test]
    fn advance_walks_the_playlist_and_wraps() {
        let rig = slow_rig();
        rig.controller.play_selected("B");
        rig.controller.advance();
        assert_eq!(rig.controller.now_playing().as_deref(), Some("C"));
        rig.controller.advance();
        assert_eq!(rig.controller.now_playing().as_deref(), Some("A"));
    }

    #[test]
    fn queue_plays_before_the_mode_pick() {
        let rig = slow_rig();
        rig.controller.play_selected("A");
        assert!(rig.controller.enqueue("C"));
        assert!(!rig.controller.enqueue("C"));

        rig.controller.advance();
        assert_eq!(rig.controller.now_playing().as_deref(), Some("C"));
        assert!(rig.controller.queue_snapshot().is_empty());
    }

    #[test]
    fn queued_title_outside_active_playlist_is_dropped() {
        let rig = slow_rig();
        rig.controller.play_selected("A");
        rig.controller.enqueue("elsewhere");

        rig.controller.advance();
        assert_eq!(rig.controller.now_playing().as_deref(), Some("A"));
        assert!(rig.controller.queue_snapshot().is_empty());
    }

    #[test]
    fn replace_and_remove_queue_entries() {
        let rig = slow_rig();
        rig.controller.enqueue("A");
        rig.controller.enqueue_top("B");
        assert_eq!(rig.controller.queue_snapshot(), vec!["B", "A"]);

        rig.controller
            .replace_queue(vec![String::from("C"), String::from("A")]);
        assert!(rig.controller.remove_from_queue("C"));
        assert_eq!(rig.controller.queue_snapshot(), vec!["A"]);

        rig.controller.clear_queue();
        assert!(rig.controller.queue_snapshot().is_empty());
    }

    #[test]
    fn repeat_mode_replays_current() {
        let rig = slow_rig();
        rig.controller.set_mode(PlaybackMode::Repeat);
        rig.controller.play_selected("B");
        rig.controller.advance();

        assert_eq!(rig.controller.now_playing().as_deref(), Some("B"));
        assert_eq!(rig.controller.play_count("B"), 2);
    }

    #[test]
    fn mode_is_persisted_and_reloaded() {
        let rig = slow_rig();
        assert_eq!(rig.controller.cycle_mode(), PlaybackMode::WeightedRandom);
        let raw = fs::read_to_string(rig.paths.mode_file()).expect("mode file");
        assert_eq!(raw.trim(), "CASUALE");
        assert_eq!(config::load_mode(&rig.paths.mode_file()), PlaybackMode::WeightedRandom);
    }

    #[test]
    fn previous_early_in_track_goes_back_one() {
        let rig = slow_rig();
        rig.controller.play_selected("A");
        rig.controller.previous();
        assert_eq!(rig.controller.now_playing().as_deref(), Some("C"));
    }

    #[test]
    fn previous_late_in_track_restarts_it() {
        let rig = slow_rig();
        rig.controller.play_selected("B");
        rig.controller.seek(50);
        assert_eq!(rig.controller.progress(), 50);

        rig.controller.previous();
        assert_eq!(rig.controller.now_playing().as_deref(), Some("B"));
        assert!(rig.controller.progress() < 50);
        assert_eq!(rig.controller.play_count("B"), 1);
    }

    #[test]
    fn seek_out_of_range_keeps_playing() {
        let rig = slow_rig();
        rig.controller.play_selected("A");
        rig.controller.seek(150);
        rig.controller.seek(-3);
        assert_eq!(rig.controller.status(), PlayerStatus::Playing);
        assert!(rig.controller.progress() < 50);
    }

    #[test]
    fn toggle_starts_first_title_then_pauses_and_resumes() {
        let rig = slow_rig();
        rig.controller.toggle_play_pause();
        assert_eq!(rig.controller.now_playing().as_deref(), Some("A"));
        assert_eq!(rig.view.selected_title().as_deref(), Some("A"));
        assert_eq!(rig.view.status(), PlayerStatus::Playing);

        thread::sleep(Duration::from_millis(60));
        rig.controller.toggle_play_pause();
        assert_eq!(rig.controller.status(), PlayerStatus::Paused);
        assert_eq!(rig.view.status(), PlayerStatus::Paused);

        rig.controller.toggle_play_pause();
        assert_eq!(rig.controller.status(), PlayerStatus::Playing);
        assert_eq!(rig.controller.play_count("A"), 1);
    }

    #[test]
    fn stop_clears_now_playing() {
        let rig = slow_rig();
        rig.controller.play_selected("C");
        rig.controller.stop();
        assert_eq!(rig.controller.status(), PlayerStatus::Stopped);
        assert_eq!(rig.controller.now_playing(), None);
        assert_eq!(rig.view.now_playing(), None);
    }

    #[test]
    fn finished_track_advances_on_its_own() {
        let rig = rig(100_000, Duration::from_millis(5));
        rig.controller.play_selected("A");

        assert!(wait_until(|| rig.controller.play_count("B") >= 1));
        assert!(rig.controller.top_playlists(1)[0].plays >= 2);
    }

    #[test]
    fn suppression_guard_holds_auto_advance() {
        let rig = rig(100_000, Duration::from_millis(5));
        {
            let _hold = rig.controller.suppress_auto_advance();
            assert!(rig.controller.is_auto_advance_suppressed());
            rig.controller.play_selected("A");
            assert!(wait_until(|| rig.controller.status() != PlayerStatus::Playing));
            thread::sleep(Duration::from_millis(40));
            assert_eq!(rig.controller.play_count("B"), 0);
        }
        assert!(!rig.controller.is_auto_advance_suppressed());
    }
}
