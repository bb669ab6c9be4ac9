#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
extern crate panic_halt;

mod wake;

#[cfg(target_os = "none")]
mod hw;
#[cfg(target_os = "none")]
mod journal;
#[cfg(target_os = "none")]
mod modem;
#[cfg(target_os = "none")]
mod platform;
#[cfg(target_os = "none")]
mod runtime;

#[cfg(not(target_os = "none"))]
fn main() {}
