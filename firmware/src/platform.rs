//! Embassy-backed [`NodePlatform`] implementation.

#![cfg(target_os = "none")]
#![allow(dead_code)]

use core::time::Duration;

use embassy_futures::select::{Either, select};
use embassy_time::{Duration as EmbassyDuration, Instant, Timer};
use portable_atomic::{AtomicU32, Ordering};

use node_core::platform::{NodePlatform, ResetCause};

use crate::wake::WAKE_SIGNAL;

/// Offset added to uptime seconds to produce wall-clock time. Zero until a
/// time reference arrives over the acoustic link.
static EPOCH_OFFSET: AtomicU32 = AtomicU32::new(0);

/// Anchors the wall clock: `epoch_seconds` is the current wall-clock time.
pub fn align_wall_clock(epoch_seconds: u32) {
    let uptime = Instant::now().as_secs() as u32;
    EPOCH_OFFSET.store(epoch_seconds.wrapping_sub(uptime), Ordering::Relaxed);
}

/// Wall-clock seconds as seen by the supervisor and the edge-capture task.
pub fn wall_clock_seconds() -> u32 {
    (Instant::now().as_secs() as u32).wrapping_add(EPOCH_OFFSET.load(Ordering::Relaxed))
}

/// Monotonic millisecond counter. Wraps with the u32 truncation.
pub fn monotonic_millis() -> u32 {
    Instant::now().as_millis() as u32
}

/// Monotonic microsecond counter. Wraps with the u32 truncation.
pub fn monotonic_micros() -> u32 {
    Instant::now().as_micros() as u32
}

fn to_embassy(duration: Duration) -> EmbassyDuration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    EmbassyDuration::from_micros(micros)
}

/// Interval after which the light-sleep wait resumes even without an edge so
/// the supervisor's feed loop stays live.
const WAKE_TICK: EmbassyDuration = EmbassyDuration::from_secs(1);

/// Platform services bound to Embassy time and the Cortex-M reset path.
pub struct FirmwarePlatform {
    reset_cause: ResetCause,
}

impl FirmwarePlatform {
    pub const fn new(reset_cause: ResetCause) -> Self {
        Self { reset_cause }
    }
}

impl NodePlatform for FirmwarePlatform {
    fn reset_cause(&self) -> ResetCause {
        self.reset_cause
    }

    fn wall_clock_seconds(&self) -> u32 {
        wall_clock_seconds()
    }

    fn monotonic_millis(&self) -> u32 {
        monotonic_millis()
    }

    fn monotonic_micros(&self) -> u32 {
        monotonic_micros()
    }

    async fn delay(&mut self, duration: Duration) {
        Timer::after(to_embassy(duration)).await;
    }

    async fn wait_for_wake(&mut self) {
        // Executor idles in WFI here; resumes on the wake signal or the tick,
        // whichever hardware event comes first.
        match select(WAKE_SIGNAL.wait(), Timer::after(WAKE_TICK)).await {
            Either::First(()) | Either::Second(()) => {}
        }
    }

    fn reset(&mut self) {
        cortex_m::peripheral::SCB::sys_reset();
    }
}
