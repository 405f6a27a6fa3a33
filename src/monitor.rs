//! Background thread that follows the playing session and moves on to the
//! next track when it ends.

use crate::session::TrackSession;
use crate::sync::{Signal, lock};
use crate::view::PlayerView;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Whoever decides what plays next.
pub trait AdvanceTarget: Send + Sync {
    fn advance(&self);
    fn auto_advance_suppressed(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorPolicy {
    pub tick: Duration,
    /// Ticks without any bytes consumed before a session counts as stalled.
    /// Zero turns stall detection off.
    pub stall_samples: u32,
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            stall_samples: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Watched {
    Ended(u64),
    Stalled(u64),
}

struct MonitorLoop {
    session: Arc<TrackSession>,
    signal: Arc<Signal>,
    view: Arc<dyn PlayerView>,
    target: Weak<dyn AdvanceTarget>,
    policy: MonitorPolicy,
    running: Arc<AtomicBool>,
}

impl MonitorLoop {
    fn run(self) {
        let mut handled = 0_u64;
        while self.is_running() {
            self.signal.acquire();
            if !self.is_running() {
                break;
            }

            let finished = match self.watch() {
                Watched::Stalled(generation) => Some(generation),
                Watched::Ended(generation) => {
                    (self.session.completed_generation() == generation).then_some(generation)
                }
            };
            let Some(generation) = finished else {
                continue;
            };
            if generation == handled || !self.is_running() {
                continue;
            }
            handled = generation;

            let Some(target) = self.target.upgrade() else {
                tracing::debug!("controller gone, monitor exiting");
                break;
            };
            if target.auto_advance_suppressed() {
                tracing::debug!("auto-advance suppressed");
                continue;
            }
            target.advance();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn watch(&self) -> Watched {
        let mut generation = self.session.generation();
        let mut last_consumed = self.session.consumed_bytes();
        let mut idle_ticks = 0_u32;

        while self.is_running() && self.session.is_playing() {
            let current = self.session.generation();
            if current != generation {
                generation = current;
                last_consumed = self.session.consumed_bytes();
                idle_ticks = 0;
            }
            self.view.show_progress(self.session.current_percentage());
            thread::park_timeout(self.policy.tick);

            let consumed = self.session.consumed_bytes();
            if consumed == last_consumed {
                idle_ticks = idle_ticks.saturating_add(1);
            } else {
                last_consumed = consumed;
                idle_ticks = 0;
            }

            if self.policy.stall_samples > 0
                && idle_ticks >= self.policy.stall_samples
                && self.session.is_playing()
                && self.session.generation() == generation
            {
                tracing::warn!(
                    consumed,
                    "no audio consumed for {idle_ticks} ticks, treating the track as finished"
                );
                self.session.stop();
                return Watched::Stalled(generation);
            }
        }

        self.view.show_progress(self.session.current_percentage());
        Watched::Ended(self.session.generation())
    }
}

pub struct PlaybackMonitor {
    running: Arc<AtomicBool>,
    signal: Arc<Signal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackMonitor {
    pub fn spawn(
        session: Arc<TrackSession>,
        signal: Arc<Signal>,
        view: Arc<dyn PlayerView>,
        target: Weak<dyn AdvanceTarget>,
        policy: MonitorPolicy,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let worker = MonitorLoop {
            session,
            signal: Arc::clone(&signal),
            view,
            target,
            policy,
            running: Arc::clone(&running),
        };
        let handle = thread::Builder::new()
            .name(String::from("sonora-monitor"))
            .spawn(move || worker.run())
            .context("failed to spawn playback monitor")?;

        Ok(Self {
            running,
            signal,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops the loop and joins the thread, unless called from the monitor
    /// thread itself.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.signal.release();
        let Some(handle) = lock(&self.handle).take() else {
            return;
        };
        handle.thread().unpark();
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::warn!("playback monitor panicked");
        }
    }
}

impl Drop for PlaybackMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PacedBackend;
    use crate::model::Track;
    use crate::session::{
        CancelToken, DecodeBackend, MeteredInput, OpenedTrack, SessionConfig, TrackOpener,
    };
    use crate::view::HeadlessView;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    struct BlankOpener;

    impl TrackOpener for BlankOpener {
        fn open(&self, _path: &Path) -> Result<OpenedTrack> {
            Ok(OpenedTrack::new(Cursor::new(vec![0_u8; 1_000]), 1_000))
        }
    }

    /// Never reads a byte.
    struct HungBackend;

    impl DecodeBackend for HungBackend {
        fn run(&self, _input: MeteredInput, cancel: &CancelToken) -> Result<()> {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingTarget {
        advances: AtomicUsize,
        suppressed: AtomicBool,
    }

    impl AdvanceTarget for CountingTarget {
        fn advance(&self) {
            self.advances.fetch_add(1, Ordering::SeqCst);
        }

        fn auto_advance_suppressed(&self) -> bool {
            self.suppressed.load(Ordering::SeqCst)
        }
    }

    struct Rig {
        session: Arc<TrackSession>,
        signal: Arc<Signal>,
        view: Arc<HeadlessView>,
        target: Arc<CountingTarget>,
        monitor: PlaybackMonitor,
    }

    impl Rig {
        fn new(backend: Arc<dyn DecodeBackend>, stall_samples: u32) -> Self {
            let session = Arc::new(TrackSession::new(
                Arc::new(BlankOpener),
                backend,
                SessionConfig {
                    sample_interval: Duration::from_millis(2),
                    join_timeout: Duration::from_secs(2),
                },
            ));
            let signal = Arc::new(Signal::new());
            let view = Arc::new(HeadlessView::new());
            let target = Arc::new(CountingTarget::default());
            let weak_target: Weak<CountingTarget> = Arc::downgrade(&target);
            let monitor = PlaybackMonitor::spawn(
                Arc::clone(&session),
                Arc::clone(&signal),
                view.clone(),
                weak_target,
                MonitorPolicy {
                    tick: Duration::from_millis(5),
                    stall_samples,
                },
            )
            .expect("spawn monitor");
            Self {
                session,
                signal,
                view,
                target,
                monitor,
            }
        }

        fn start(&self) {
            assert!(self.session.play(&Track::new("a", "/a.mp3")));
            self.signal.release();
        }

        fn advances(&self) -> usize {
            self.target.advances.load(Ordering::SeqCst)
        }
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
    fn natural_end_advances_once() {
        let rig = Rig::new(Arc::new(PacedBackend::new(20_000, 100)), 0);
        rig.start();

        assert!(wait_until(|| rig.advances() == 1));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(rig.advances(), 1);
        assert!(rig.view.progress_updates() > 0);
        assert_eq!(rig.view.progress(), 100);
    }

    #[test]
    fn pause_does_not_advance() {
        let rig = Rig::new(Arc::new(PacedBackend::new(1_000, 10)), 0);
        rig.start();
        thread::sleep(Duration::from_millis(30));
        rig.session.pause();

        thread::sleep(Duration::from_millis(60));
        assert_eq!(rig.advances(), 0);
    }

    #[test]
    fn suppressed_target_is_not_advanced() {
        let rig = Rig::new(Arc::new(PacedBackend::new(50_000, 100)), 0);
        rig.target.suppressed.store(true, Ordering::SeqCst);
        rig.start();

        assert!(wait_until(|| !rig.session.is_playing()));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(rig.advances(), 0);
    }

    #[test]
    fn stalled_session_is_stopped_and_advanced() {
        let rig = Rig::new(Arc::new(HungBackend), 3);
        rig.start();

        assert!(wait_until(|| rig.advances() == 1));
        assert!(!rig.session.is_playing());
    }

    #[test]
    fn shutdown_returns_while_waiting_for_signal() {
        let rig = Rig::new(Arc::new(HungBackend), 0);
        let started = Instant::now();
        rig.monitor.shutdown();
        assert!(!rig.monitor.is_running());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
