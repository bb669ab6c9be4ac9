//! Platform services the supervisor consumes: clocks, delays, the light-sleep
//! wait, device reset, and the reset-cause readout.

use core::fmt;
use core::time::Duration;

/// Why the device last reset. Read once at startup and journaled; it never
/// influences control flow beyond the log record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResetCause {
    PowerOn,
    Hard,
    Watchdog,
    DeepSleepWake,
    Soft,
    Undefined,
}

impl fmt::Display for ResetCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            ResetCause::PowerOn => "PWRON_RESET",
            ResetCause::Hard => "HARD_RESET",
            ResetCause::Watchdog => "WDT_RESET",
            ResetCause::DeepSleepWake => "DEEPSLEEP_RESET",
            ResetCause::Soft => "SOFT_RESET",
            ResetCause::Undefined => "UNDEFINED_RESET",
        };
        f.write_str(token)
    }
}

/// Clock, delay, and reset services provided by the execution environment.
///
/// The firmware backs this with Embassy time and the SCB reset path; hosts
/// back it with a simulated clock they can advance at will.
#[allow(async_fn_in_trait)]
pub trait NodePlatform {
    /// Reset cause latched by the hardware for the current boot.
    fn reset_cause(&self) -> ResetCause;

    /// Wall-clock seconds, the only time source stable across long intervals.
    fn wall_clock_seconds(&self) -> u32;

    /// Monotonic millisecond counter; wraps after roughly 12.4 days.
    fn monotonic_millis(&self) -> u32;

    /// Monotonic microsecond counter; wraps after roughly 17.8 minutes.
    fn monotonic_micros(&self) -> u32;

    /// Fixed-duration delay.
    async fn delay(&mut self, duration: Duration);

    /// Blocks in a low-power state until the next hardware event.
    ///
    /// The wake condition is the next hardware event (a frame-sync edge or a
    /// timer tick), not a fixed sleep interval; callers re-check the wake
    /// latch after every return and must keep feeding the watchdog between
    /// calls.
    async fn wait_for_wake(&mut self);

    /// Resets the device. Diverges on hardware; host implementations record
    /// the call and return so tests can observe it.
    fn reset(&mut self);

    /// Best-effort hint to compact or reclaim memory. Defaults to a no-op.
    fn compact_memory(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_cause_renders_operator_tokens() {
        let rendered: [(ResetCause, &str); 6] = [
            (ResetCause::PowerOn, "PWRON_RESET"),
            (ResetCause::Hard, "HARD_RESET"),
            (ResetCause::Watchdog, "WDT_RESET"),
            (ResetCause::DeepSleepWake, "DEEPSLEEP_RESET"),
            (ResetCause::Soft, "SOFT_RESET"),
            (ResetCause::Undefined, "UNDEFINED_RESET"),
        ];
        for (cause, token) in rendered {
            let mut buffer = heapless::String::<24>::new();
            core::fmt::write(&mut buffer, format_args!("{cause}")).unwrap();
            assert_eq!(buffer.as_str(), token);
        }
    }
}
