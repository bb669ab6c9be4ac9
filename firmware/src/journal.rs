//! defmt-backed journal sink.

#![cfg(target_os = "none")]

use defmt::{info, warn};

use node_core::journal::{Journal, SupervisorFault};

/// Forwards journal lines to the RTT console. The persistent event store
/// lives outside this crate; this sink is what the supervisor sees.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefmtJournal;

impl DefmtJournal {
    pub const fn new() -> Self {
        Self
    }
}

impl Journal for DefmtJournal {
    fn record(&mut self, line: &str, source: &'static str) {
        info!("{=str} [{=str}]", line, source);
    }

    fn record_fault(&mut self, fault: &SupervisorFault) {
        warn!("fault: {}", defmt::Display2Format(fault));
    }
}
