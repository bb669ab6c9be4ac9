//! Hardware bindings for the supervisor's rail, watchdog, and reset-cause
//! collaborators.

#![cfg(target_os = "none")]

pub mod flags;
pub mod rails;
pub mod reset;
pub mod watchdog;
