//! Shared wake-capture state for the firmware target.
//!
//! The wake latch is the only mutable state crossing from the edge-capture
//! task into the supervisor; the signal alongside it lets the light-sleep
//! wait resume as soon as an edge lands instead of waiting out the feed tick.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::signal::Signal;

use node_core::wake::WakeLatch;

#[cfg(target_os = "none")]
type WakeMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type WakeMutex = CriticalSectionRawMutex;

/// Process-wide wake event slot, written only by the edge-capture task.
pub static WAKE_LATCH: WakeLatch = WakeLatch::new();

/// Pulsed after every latched edge so the light-sleep wait can resume early.
pub static WAKE_SIGNAL: Signal<WakeMutex, ()> = Signal::new();
