//! Leading-edge throttle with a trailing call.
//!
//! The first offer after a quiet period fires immediately. Offers inside the
//! interval replace a single pending value that fires once the interval has
//! elapsed, so the trailing call always carries the latest value.
//!
//! Time is passed in explicitly; the session driver sleeps until
//! [`Throttle::deadline`] and then calls [`Throttle::poll`].

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval: Duration,
    last_fired: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
            pending: None,
        }
    }

    /// Offer a value. Returns it back if it should fire now.
    pub fn offer(&mut self, value: T, now: Instant) -> Option<T> {
        let ready = self
            .last_fired
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if ready {
            self.pending = None;
            self.last_fired = Some(now);
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Take the pending value if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.last_fired = Some(now);
                self.pending.take()
            }
            _ => None,
        }
    }

    /// When the pending value becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_none() {
            return None;
        }
        Some(match self.last_fired {
            Some(last) => last + self.interval,
            None => Instant::now(),
        })
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any pending value.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
