//! Arm-once wrapper around the hardware watchdog.
//!
//! The watchdog is started at the very beginning of the process and cannot be
//! stopped afterwards; every unhandled fault then becomes a bounded-time
//! automatic recovery instead of a silent hang. The supervisor must feed it
//! at least once per loop iteration and around every long settle delay.

use core::time::Duration;

/// Timeout configured when the watchdog is armed.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);

/// Abstraction over the physical watchdog peripheral.
pub trait WatchdogHardware {
    /// Starts the countdown. Once called the device resets unless
    /// [`WatchdogHardware::feed`] runs before `timeout` elapses.
    fn arm(&mut self, timeout: Duration);

    /// Restarts the countdown.
    fn feed(&mut self);
}

/// Watchdog that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopWatchdog;

impl NoopWatchdog {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl WatchdogHardware for NoopWatchdog {
    fn arm(&mut self, _: Duration) {}

    fn feed(&mut self) {}
}

/// Owns the watchdog peripheral and enforces the arm-once contract.
pub struct WatchdogSupervisor<W: WatchdogHardware> {
    hardware: W,
    armed: bool,
}

impl<W: WatchdogHardware> WatchdogSupervisor<W> {
    #[must_use]
    pub const fn new(hardware: W) -> Self {
        Self {
            hardware,
            armed: false,
        }
    }

    /// Arms the watchdog with [`WATCHDOG_TIMEOUT`]. Subsequent calls are
    /// no-ops; the first one commits the process.
    pub fn start(&mut self) {
        if !self.armed {
            self.hardware.arm(WATCHDOG_TIMEOUT);
            self.armed = true;
        }
    }

    /// Restarts the countdown.
    pub fn feed(&mut self) {
        self.hardware.feed();
    }

    /// Returns `true` once the watchdog has been armed.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    /// Accesses the underlying peripheral.
    pub fn hardware(&self) -> &W {
        &self.hardware
    }

    /// Mutably accesses the underlying peripheral.
    pub fn hardware_mut(&mut self) -> &mut W {
        &mut self.hardware
    }
}
