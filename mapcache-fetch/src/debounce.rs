//! Leading-edge debounce with a trailing flush.
//!
//! The first trigger after a quiet period fires immediately. Triggers that
//! land inside the window are collapsed into one pending value and each one
//! pushes the window out again. Once the window lapses, [`DebounceGate::flush`]
//! hands back the last pending value exactly once.
//!
//! The gate owns no timer. Callers poll it, or sleep until
//! [`DebounceGate::deadline`].

use mapcache_core::Timestamp;
use std::time::Duration;

/// Outcome of a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission<T> {
    /// Act on this value now.
    Fire(T),
    /// Held back; it may come out of a later flush.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct DebounceGate<T> {
    window: chrono::Duration,
    quiet_at: Option<Timestamp>,
    pending: Option<T>,
}

impl<T> DebounceGate<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero()),
            quiet_at: None,
            pending: None,
        }
    }

    pub fn trigger(&mut self, value: T, now: Timestamp) -> Admission<T> {
        let quiet = self.quiet_at.map_or(true, |quiet_at| now >= quiet_at);
        self.quiet_at = Some(now + self.window);
        if quiet {
            // A pending value that was never flushed is superseded.
            self.pending = None;
            Admission::Fire(value)
        } else {
            self.pending = Some(value);
            Admission::Deferred
        }
    }

    /// Take the trailing value once the window has lapsed.
    pub fn flush(&mut self, now: Timestamp) -> Option<T> {
        match self.quiet_at {
            Some(quiet_at) if now >= quiet_at => {
                self.quiet_at = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// When the pending value becomes flushable, if there is one.
    pub fn deadline(&self) -> Option<Timestamp> {
        self.pending.as_ref().and(self.quiet_at)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any pending value and reopen the gate.
    pub fn reset(&mut self) {
        self.quiet_at = None;
        self.pending = None;
    }
}
