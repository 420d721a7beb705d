//! Trailing-edge debounce for continuous controls.
//!
//! Time is passed in rather than read, so the owner decides the clock.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replace any pending value and restart the timer.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// The pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    /// Take the pending value regardless of its deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, d)| *d)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_input_supersedes_earlier() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(200));
        d.schedule(1, t0);
        d.schedule(2, t0 + Duration::from_millis(150));
        // The first deadline has passed but was superseded.
        assert_eq!(d.poll(t0 + Duration::from_millis(250)), None);
        assert_eq!(d.poll(t0 + Duration::from_millis(350)), Some(2));
        assert!(!d.is_pending());
    }

    #[test]
    fn flush_ignores_deadline() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_secs(5));
        d.schedule("zoom", t0);
        assert_eq!(d.flush(), Some("zoom"));
        assert_eq!(d.flush(), None);
    }

    #[test]
    fn cancel_drops_pending() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::ZERO);
        d.schedule((), t0);
        d.cancel();
        assert_eq!(d.poll(t0), None);
    }
}
