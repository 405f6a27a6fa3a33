use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counting handoff between whoever starts playback and the monitor thread.
#[derive(Debug, Default)]
pub struct Signal {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        let mut permits = lock(&self.permits);
        *permits = permits.saturating_add(1);
        self.available.notify_one();
    }

    /// Blocks until a permit is available and takes it.
    pub fn acquire(&self) {
        let mut permits = lock(&self.permits);
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
    }

    /// Drops every pending permit and returns how many there were.
    pub fn drain(&self) -> usize {
        std::mem::take(&mut *lock(&self.permits))
    }

    pub fn available(&self) -> usize {
        *lock(&self.permits)
    }
}

/// Admits one caller at a time; later callers are turned away instead of
/// waiting.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { busy: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn release_then_acquire_does_not_block() {
        let signal = Signal::new();
        signal.release();
        signal.release();
        assert_eq!(signal.available(), 2);
        signal.acquire();
        assert_eq!(signal.available(), 1);
    }

    #[test]
    fn drain_discards_stale_permits() {
        let signal = Signal::new();
        signal.release();
        signal.release();
        assert_eq!(signal.drain(), 2);
        assert_eq!(signal.available(), 0);
        assert_eq!(signal.drain(), 0);
    }

    #[test]
    fn acquire_wakes_on_release_from_other_thread() {
        let signal = Arc::new(Signal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.acquire())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        signal.release();
        waiter.join().expect("join");
        assert_eq!(signal.available(), 0);
    }

    #[test]
    fn single_flight_turns_away_second_caller() {
        let flight = SingleFlight::new();
        let first = flight.try_begin();
        assert!(first.is_some());
        assert!(flight.try_begin().is_none());
        drop(first);
        assert!(!flight.is_busy());
        assert!(flight.try_begin().is_some());
    }
}
