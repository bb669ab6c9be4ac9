//! Independent watchdog binding.

#![cfg(target_os = "none")]

use core::time::Duration;

use embassy_stm32::peripherals::IWDG;
use embassy_stm32::wdg::IndependentWatchdog;

use node_core::watchdog::WatchdogHardware;

/// IWDG adapter. The peripheral's timeout is fixed at construction; once
/// unleashed it cannot be stopped.
pub struct IwdgWatchdog<'d> {
    inner: IndependentWatchdog<'d, IWDG>,
}

impl<'d> IwdgWatchdog<'d> {
    pub fn new(peripheral: IWDG, timeout: Duration) -> Self {
        let timeout_us = u32::try_from(timeout.as_micros()).unwrap_or(u32::MAX);
        Self {
            inner: IndependentWatchdog::new(peripheral, timeout_us),
        }
    }
}

impl WatchdogHardware for IwdgWatchdog<'_> {
    fn arm(&mut self, _: Duration) {
        self.inner.unleash();
    }

    fn feed(&mut self) {
        self.inner.pet();
    }
}
