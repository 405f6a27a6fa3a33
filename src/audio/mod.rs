use crate::session::{CancelToken, DecodeBackend, MeteredInput, OpenedTrack, TrackOpener};
use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Opens tracks straight from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOpener;

impl TrackOpener for FileOpener {
    fn open(&self, path: &Path) -> Result<OpenedTrack> {
        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("failed to stat track {}", path.display()))?
            .len();
        Ok(OpenedTrack::new(BufReader::new(file), len))
    }
}

/// Decodes through rodio into the default output device. Each decode opens
/// its own output stream so no device handle outlives the session.
#[derive(Debug, Clone, Copy)]
pub struct RodioBackend {
    poll_interval: Duration,
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl RodioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens and drops one output stream to find out whether a device is
    /// there at all.
    pub fn probe_output() -> Result<()> {
        Self::open_output_stream().map(|_| ())
    }

    fn open_output_stream() -> Result<(OutputStream, Sink)> {
        let mut stream = with_silenced_stderr(|| {
            OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")?
                .with_error_callback(|_| {})
                .open_stream_or_fallback()
                .context("failed to start default output stream")
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        Ok((stream, sink))
    }
}

impl DecodeBackend for RodioBackend {
    fn run(&self, input: MeteredInput, cancel: &CancelToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let (_stream, sink) = Self::open_output_stream()?;
        let source = Decoder::new(input).context("failed to decode track")?;
        sink.append(source);

        while !sink.empty() {
            if cancel.is_cancelled() {
                sink.stop();
                return Ok(());
            }
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

/// Consumes the track at a fixed byte rate without touching an audio device.
/// Used for `--silent` runs and anywhere no output device is available.
#[derive(Debug, Clone, Copy)]
pub struct PacedBackend {
    bytes_per_second: u64,
    chunk: usize,
}

impl Default for PacedBackend {
    fn default() -> Self {
        // roughly a 128 kbps mp3
        Self::new(16_000, 4_096)
    }
}

impl PacedBackend {
    pub fn new(bytes_per_second: u64, chunk: usize) -> Self {
        Self {
            bytes_per_second: bytes_per_second.max(1),
            chunk: chunk.max(1),
        }
    }

    fn pause_for(&self, bytes: usize) -> Duration {
        Duration::from_micros((bytes as u64).saturating_mul(1_000_000) / self.bytes_per_second)
    }
}

impl DecodeBackend for PacedBackend {
    fn run(&self, mut input: MeteredInput, cancel: &CancelToken) -> Result<()> {
        let mut buf = vec![0_u8; self.chunk];
        while !cancel.is_cancelled() {
            let read = input.read(&mut buf).context("failed to read track")?;
            if read == 0 {
                break;
            }
            thread::sleep(self.pause_for(read));
        }
        Ok(())
    }
}

/// Real output when a device answers, the paced backend otherwise.
pub fn select_backend(silent: bool) -> Arc<dyn DecodeBackend> {
    if silent {
        return Arc::new(PacedBackend::default());
    }
    match RodioBackend::probe_output() {
        Ok(()) => Arc::new(RodioBackend::new()),
        Err(err) => {
            tracing::warn!("no audio output, playing silently: {err:#}");
            Arc::new(PacedBackend::default())
        }
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    // ALSA and JACK probing write straight to fd 2
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}
