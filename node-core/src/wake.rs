//! Single-slot handoff of wake edges from interrupt context to the supervisor.
//!
//! The acoustic modem raises its frame-synchronization line when a message is
//! inbound; the edge capture stamps three time sources and publishes them
//! through a [`WakeLatch`]. The latch is the only mutable state shared between
//! the capture context and the supervisor, and both sides touch it without
//! locking: the writer stores the counters behind a sequence stamp and then
//! publishes the pending flag with release ordering, the reader consumes the
//! flag with acquire ordering and re-reads until the stamp is stable.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Timestamps captured at a frame-synchronization edge.
///
/// `seconds` is wall-clock time and is the only field suitable for message
/// timestamping across long intervals. `millis` wraps after roughly 12.4 days
/// and `micros` after roughly 17.8 minutes; both pause during sleep modes, so
/// treat them as best-effort relative timing only.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct WakeSnapshot {
    pub seconds: u32,
    pub millis: u32,
    pub micros: u32,
}

impl WakeSnapshot {
    #[must_use]
    pub const fn new(seconds: u32, millis: u32, micros: u32) -> Self {
        Self {
            seconds,
            millis,
            micros,
        }
    }
}

/// Lock-free single-producer/single-consumer slot for wake events.
///
/// Exactly one instance exists for the process lifetime. `on_edge` is the
/// producer side and must only run in the edge-capture context; everything
/// else is the supervisor side. A second edge arriving before `take` simply
/// supersedes the captured counters; the event itself is never lost.
pub struct WakeLatch {
    pending: AtomicBool,
    stamp: AtomicU32,
    seconds: AtomicU32,
    millis: AtomicU32,
    micros: AtomicU32,
}

impl WakeLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            stamp: AtomicU32::new(0),
            seconds: AtomicU32::new(0),
            millis: AtomicU32::new(0),
            micros: AtomicU32::new(0),
        }
    }

    /// Records a frame-synchronization edge.
    ///
    /// Bounded time, no heap activity, no journaling: four primitive stores
    /// bracketed by the sequence stamp. Safe to call from interrupt context.
    pub fn on_edge(&self, snapshot: WakeSnapshot) {
        let opened = self.stamp.load(Ordering::Relaxed).wrapping_add(1);
        self.stamp.store(opened, Ordering::Relaxed);
        self.micros.store(snapshot.micros, Ordering::Relaxed);
        self.millis.store(snapshot.millis, Ordering::Relaxed);
        self.seconds.store(snapshot.seconds, Ordering::Relaxed);
        self.stamp.store(opened.wrapping_add(1), Ordering::Release);
        self.pending.store(true, Ordering::Release);
    }

    /// Non-consuming view of the pending flag, used by the activity policy
    /// and by the mandatory re-check before cutting power.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Consumes the pending flag and returns the latest edge's snapshot.
    ///
    /// The stamp loop guarantees the three fields originate from the same
    /// edge even if a new edge lands mid-read; in that case the fresher
    /// edge's values win.
    pub fn take(&self) -> Option<WakeSnapshot> {
        if !self.pending.swap(false, Ordering::Acquire) {
            return None;
        }
        Some(self.read_consistent())
    }

    /// Wall-clock second of the most recent edge, zero before the first one.
    ///
    /// Survives `take` so the activity window keeps counting from the last
    /// wake even after the event itself has been consumed.
    #[must_use]
    pub fn last_wake_seconds(&self) -> u32 {
        self.read_consistent().seconds
    }

    fn read_consistent(&self) -> WakeSnapshot {
        loop {
            let before = self.stamp.load(Ordering::Acquire);
            let snapshot = WakeSnapshot {
                seconds: self.seconds.load(Ordering::Relaxed),
                millis: self.millis.load(Ordering::Relaxed),
                micros: self.micros.load(Ordering::Relaxed),
            };
            let after = self.stamp.load(Ordering::Acquire);
            if before == after && before & 1 == 0 {
                return snapshot;
            }
        }
    }
}

impl Default for WakeLatch {
    fn default() -> Self {
        Self::new()
    }
}
