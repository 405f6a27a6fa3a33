//! One decode attempt at a time for one track.
//!
//! A [`TrackSession`] opens the track through a [`TrackOpener`], hands a
//! [`MeteredInput`] to a [`DecodeBackend`] on its own thread and samples how
//! far into the file the decoder has read. Pausing remembers that byte
//! offset; resuming and seeking reopen the file and skip ahead.

use crate::model::Track;
use crate::sync::{SingleFlight, lock};
use anyhow::{Context, Result};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub trait TrackInput: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> TrackInput for T {}

pub struct OpenedTrack {
    pub input: Box<dyn TrackInput>,
    pub len: u64,
}

impl OpenedTrack {
    pub fn new(input: impl TrackInput + 'static, len: u64) -> Self {
        Self {
            input: Box::new(input),
            len,
        }
    }
}

pub trait TrackOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<OpenedTrack>;
}

pub trait DecodeBackend: Send + Sync {
    /// Plays `input` until it runs dry or `cancel` fires. Returning `Ok`
    /// without cancellation means the track reached its natural end.
    fn run(&self, input: MeteredInput, cancel: &CancelToken) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct StreamProbe {
    len: u64,
    position: AtomicU64,
    closed: AtomicBool,
}

impl StreamProbe {
    fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    fn percentage(&self) -> u8 {
        percentage_of(self.position(), self.len)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn percentage_of(position: u64, len: u64) -> u8 {
    if len == 0 {
        return 0;
    }
    (u128::from(position.min(len)) * 100 / u128::from(len)) as u8
}

/// A byte window over an opened track that starts at the skip offset,
/// records how far it has been read and reports end-of-stream once the
/// owning session closes it.
pub struct MeteredInput {
    inner: Box<dyn TrackInput>,
    start: u64,
    position: u64,
    probe: Arc<StreamProbe>,
}

impl MeteredInput {
    pub fn new(opened: OpenedTrack, skip: u64) -> io::Result<Self> {
        let OpenedTrack { mut input, len } = opened;
        let start = skip.min(len);
        input.seek(SeekFrom::Start(start))?;
        Ok(Self {
            inner: input,
            start,
            position: start,
            probe: Arc::new(StreamProbe {
                len,
                position: AtomicU64::new(start),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Absolute offset the window starts at.
    pub fn start_offset(&self) -> u64 {
        self.start
    }

    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn total_len(&self) -> u64 {
        self.probe.len
    }

    /// Bytes between the window start and the end of the track.
    pub fn window_len(&self) -> u64 {
        self.probe.len - self.start
    }

    pub fn remaining(&self) -> u64 {
        self.probe.len.saturating_sub(self.position)
    }

    fn probe(&self) -> Arc<StreamProbe> {
        Arc::clone(&self.probe)
    }

    fn advance_to(&mut self, position: u64) {
        self.position = position;
        self.probe.position.store(position, Ordering::SeqCst);
    }
}

impl Read for MeteredInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.probe.is_closed() {
            return Ok(0);
        }
        let read = self.inner.read(buf)?;
        self.advance_to(self.position + read as u64);
        Ok(read)
    }
}

impl Seek for MeteredInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(self.start) + i128::from(offset),
            SeekFrom::End(delta) => i128::from(self.probe.len) + i128::from(delta),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
        };
        if target < i128::from(self.start) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the track window",
            ));
        }
        let absolute = self.inner.seek(SeekFrom::Start(target as u64))?;
        self.advance_to(absolute);
        Ok(absolute - self.start)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub sample_interval: Duration,
    pub join_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(500),
            join_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Default)]
struct SessionFlags {
    // generation that is producing audio, 0 when idle
    playing: AtomicU64,
    paused: AtomicBool,
    percentage: AtomicU8,
    generation: AtomicU64,
    completed: AtomicU64,
    starts: AtomicU64,
}

/// Clears the playing flag when the decode thread exits, unless a newer
/// session has taken over.
struct PlayingReset {
    flags: Arc<SessionFlags>,
    generation: u64,
}

impl Drop for PlayingReset {
    fn drop(&mut self) {
        let _ = self.flags.playing.compare_exchange(
            self.generation,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

struct ActiveDecode {
    cancel: CancelToken,
    probe: Arc<StreamProbe>,
    decode: JoinHandle<()>,
    sampler: JoinHandle<()>,
}

#[derive(Default)]
struct SessionState {
    track: Option<Track>,
    total_len: u64,
    paused_offset: u64,
    active: Option<ActiveDecode>,
}

#[derive(Debug, Clone, Copy)]
enum StartAt {
    Byte(u64),
    Percent(u8),
}

pub struct TrackSession {
    opener: Arc<dyn TrackOpener>,
    backend: Arc<dyn DecodeBackend>,
    config: SessionConfig,
    flags: Arc<SessionFlags>,
    state: Mutex<SessionState>,
    starting: SingleFlight,
}

impl TrackSession {
    pub fn new(
        opener: Arc<dyn TrackOpener>,
        backend: Arc<dyn DecodeBackend>,
        config: SessionConfig,
    ) -> Self {
        let flags = SessionFlags::default();
        flags.paused.store(true, Ordering::SeqCst);
        Self {
            opener,
            backend,
            config,
            flags: Arc::new(flags),
            state: Mutex::new(SessionState::default()),
            starting: SingleFlight::new(),
        }
    }

    /// Starts `track` from the beginning, stopping whatever was playing.
    /// Returns false when another start is already in flight or the track
    /// could not be opened.
    pub fn play(&self, track: &Track) -> bool {
        let Some(_starting) = self.starting.try_begin() else {
            tracing::debug!(title = %track.title, "play ignored, another start is in flight");
            return false;
        };
        self.stop();
        lock(&self.state).track = Some(track.clone());
        self.start(StartAt::Byte(0))
    }

    pub fn pause(&self) {
        if !self.is_playing() {
            return;
        }
        let active = {
            let mut state = lock(&self.state);
            let Some(active) = state.active.take() else {
                return;
            };
            state.paused_offset = active.probe.position();
            active
        };
        self.flags.paused.store(true, Ordering::SeqCst);
        self.halt(active);
        tracing::debug!(offset = self.paused_offset(), "paused");
    }

    pub fn resume(&self) -> bool {
        if !self.is_paused() || self.is_playing() {
            return false;
        }
        let offset = {
            let state = lock(&self.state);
            if state.track.is_none() {
                return false;
            }
            state.paused_offset
        };
        let Some(_starting) = self.starting.try_begin() else {
            return false;
        };
        self.cancel_active();
        self.start(StartAt::Byte(offset))
    }

    /// Cancels any decode and waits (bounded) for its threads. Safe to call
    /// when idle.
    pub fn stop(&self) {
        self.flags.paused.store(true, Ordering::SeqCst);
        self.cancel_active();
        self.flags.percentage.store(0, Ordering::SeqCst);
        lock(&self.state).paused_offset = 0;
    }

    /// Restarts the loaded track `percentage` percent into the file.
    /// Values outside 0..=100, or no loaded track, are ignored.
    pub fn seek_to_percentage(&self, percentage: i32) -> bool {
        let Ok(percentage @ 0..=100) = u8::try_from(percentage) else {
            tracing::debug!(percentage, "seek out of range ignored");
            return false;
        };
        if lock(&self.state).track.is_none() {
            return false;
        }
        let Some(_starting) = self.starting.try_begin() else {
            return false;
        };
        self.stop();
        self.start(StartAt::Percent(percentage))
    }

    pub fn is_playing(&self) -> bool {
        self.flags.playing.load(Ordering::SeqCst) != 0
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// Last sampled progress, 0 without a session.
    pub fn current_percentage(&self) -> u8 {
        self.flags.percentage.load(Ordering::SeqCst)
    }

    pub fn paused_offset(&self) -> u64 {
        lock(&self.state).paused_offset
    }

    pub fn current_track(&self) -> Option<Track> {
        lock(&self.state).track.clone()
    }

    pub fn total_len(&self) -> u64 {
        lock(&self.state).total_len
    }

    pub fn consumed_bytes(&self) -> u64 {
        let state = lock(&self.state);
        state
            .active
            .as_ref()
            .map(|active| active.probe.position())
            .unwrap_or(state.paused_offset)
    }

    /// Bumped every time a decode starts.
    pub fn generation(&self) -> u64 {
        self.flags.generation.load(Ordering::SeqCst)
    }

    /// Most recent generation that played through to its end.
    pub fn completed_generation(&self) -> u64 {
        self.flags.completed.load(Ordering::SeqCst)
    }

    pub fn decode_starts(&self) -> u64 {
        self.flags.starts.load(Ordering::SeqCst)
    }

    fn cancel_active(&self) {
        let active = lock(&self.state).active.take();
        if let Some(active) = active {
            self.halt(active);
        }
    }

    fn halt(&self, active: ActiveDecode) {
        active.cancel.cancel();
        active.probe.close();
        active.sampler.thread().unpark();
        join_bounded(active.decode, self.config.join_timeout, "decode");
        join_bounded(active.sampler, self.config.join_timeout, "progress sampler");
    }

    fn start(&self, at: StartAt) -> bool {
        match self.try_start(at) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("playback did not start: {err:#}");
                false
            }
        }
    }

    fn try_start(&self, at: StartAt) -> Result<()> {
        let mut state = lock(&self.state);
        let track = state.track.clone().context("no track loaded")?;
        let opened = self
            .opener
            .open(&track.path)
            .with_context(|| format!("failed to open {}", track.path.display()))?;
        let total_len = opened.len;
        let offset = match at {
            StartAt::Byte(offset) => offset,
            StartAt::Percent(percentage) => {
                (u128::from(total_len) * u128::from(percentage) / 100) as u64
            }
        };
        let input = MeteredInput::new(opened, offset).with_context(|| {
            format!("failed to skip {offset} bytes into {}", track.path.display())
        })?;
        let probe = input.probe();
        let cancel = CancelToken::new();

        let generation = self.flags.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.flags.percentage.store(probe.percentage(), Ordering::SeqCst);
        self.flags.paused.store(false, Ordering::SeqCst);
        self.flags.playing.store(generation, Ordering::SeqCst);

        let decode = {
            let backend = Arc::clone(&self.backend);
            let flags = Arc::clone(&self.flags);
            let probe = Arc::clone(&probe);
            let cancel = cancel.clone();
            let title = track.title.clone();
            thread::Builder::new()
                .name(String::from("sonora-decode"))
                .spawn(move || {
                    let _finished = PlayingReset {
                        flags: Arc::clone(&flags),
                        generation,
                    };
                    match backend.run(input, &cancel) {
                        Ok(()) if !cancel.is_cancelled() => {
                            flags.percentage.store(probe.percentage(), Ordering::SeqCst);
                            flags.completed.store(generation, Ordering::SeqCst);
                            tracing::debug!(%title, "track finished");
                        }
                        Ok(()) => {}
                        Err(err) => tracing::warn!(%title, "decode failed: {err:#}"),
                    }
                })
        };
        let decode = match decode {
            Ok(handle) => handle,
            Err(err) => {
                self.flags.playing.store(0, Ordering::SeqCst);
                self.flags.paused.store(true, Ordering::SeqCst);
                return Err(err).context("failed to spawn decode thread");
            }
        };

        let sampler = {
            let flags = Arc::clone(&self.flags);
            let probe = Arc::clone(&probe);
            let cancel = cancel.clone();
            let interval = self.config.sample_interval;
            thread::Builder::new()
                .name(String::from("sonora-progress"))
                .spawn(move || {
                    while !cancel.is_cancelled()
                        && flags.playing.load(Ordering::SeqCst) == generation
                    {
                        flags.percentage.store(probe.percentage(), Ordering::SeqCst);
                        thread::park_timeout(interval);
                    }
                })
        };
        let sampler = match sampler {
            Ok(handle) => handle,
            Err(err) => {
                cancel.cancel();
                probe.close();
                join_bounded(decode, self.config.join_timeout, "decode");
                self.flags.paused.store(true, Ordering::SeqCst);
                return Err(err).context("failed to spawn progress sampler");
            }
        };

        self.flags.starts.fetch_add(1, Ordering::SeqCst);
        state.total_len = total_len;
        state.paused_offset = 0;
        state.active = Some(ActiveDecode {
            cancel,
            probe,
            decode,
            sampler,
        });
        tracing::info!(title = %track.title, offset, "decoding");
        Ok(())
    }
}

impl Drop for TrackSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_bounded(handle: JoinHandle<()>, timeout: Duration, role: &str) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!("{role} thread did not stop within {timeout:?}, detaching it");
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    if handle.join().is_err() {
        tracing::warn!("{role} thread panicked");
    }
}
