//! Best-effort event journal and the supervisor fault taxonomy.
//!
//! The journal is an external collaborator (persistent log, RTT console, or
//! a host-side buffer); its calls must never fail and never block for long.
//! Faults are folded into [`SupervisorFault`] so the loop boundary can journal
//! them and continue without propagating.

use core::fmt;

use crate::command::{FlagError, NetworkError};
use crate::modem::ModemError;

/// Best-effort event log. Implementations must not raise or block.
pub trait Journal {
    /// Records a free-form line attributed to `source`.
    fn record(&mut self, line: &str, source: &'static str);

    /// Records a fault caught at the loop boundary.
    fn record_fault(&mut self, fault: &SupervisorFault);
}

/// Journal that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullJournal;

impl NullJournal {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Journal for NullJournal {
    fn record(&mut self, _: &str, _: &'static str) {}

    fn record_fault(&mut self, _: &SupervisorFault) {}
}

/// Recovery class a fault belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultClass {
    /// Channel hiccups and malformed frames: journal and continue.
    Transient,
    /// Flag-record write failures: journal, never blocks the follow-up reset.
    Persistence,
    /// Everything else: journal and continue, the watchdog is the backstop.
    Fatal,
}

/// Faults surfaced by one supervisor iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SupervisorFault {
    Modem(ModemError),
    Flag(FlagError),
    Network(NetworkError),
    Unclassified,
}

impl SupervisorFault {
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        match self {
            SupervisorFault::Modem(_) => FaultClass::Transient,
            SupervisorFault::Flag(_) => FaultClass::Persistence,
            SupervisorFault::Network(_) | SupervisorFault::Unclassified => FaultClass::Fatal,
        }
    }
}

impl fmt::Display for SupervisorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorFault::Modem(err) => write!(f, "modem: {err}"),
            SupervisorFault::Flag(err) => write!(f, "flag store: {err}"),
            SupervisorFault::Network(err) => write!(f, "network: {err}"),
            SupervisorFault::Unclassified => f.write_str("unclassified fault"),
        }
    }
}

impl From<ModemError> for SupervisorFault {
    fn from(value: ModemError) -> Self {
        SupervisorFault::Modem(value)
    }
}

impl From<FlagError> for SupervisorFault {
    fn from(value: FlagError) -> Self {
        SupervisorFault::Flag(value)
    }
}

impl From<NetworkError> for SupervisorFault {
    fn from(value: NetworkError) -> Self {
        SupervisorFault::Network(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_classes_match_taxonomy() {
        assert_eq!(
            SupervisorFault::Modem(ModemError::Timeout).class(),
            FaultClass::Transient
        );
        assert_eq!(
            SupervisorFault::Flag(FlagError::WriteFailed).class(),
            FaultClass::Persistence
        );
        assert_eq!(
            SupervisorFault::Network(NetworkError::HandlerFailure).class(),
            FaultClass::Fatal
        );
        assert_eq!(SupervisorFault::Unclassified.class(), FaultClass::Fatal);
    }

    #[test]
    fn fault_rendering_names_the_concern() {
        let mut buffer = heapless::String::<64>::new();
        core::fmt::write(
            &mut buffer,
            format_args!("{}", SupervisorFault::Modem(ModemError::Timeout)),
        )
        .unwrap();
        assert_eq!(buffer.as_str(), "modem: modem response timeout");
    }
}
