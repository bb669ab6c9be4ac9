//! Rail sequence templates shared by firmware and host targets.
//!
//! Startup runs in two halves around opening the serial channel: the prelude
//! leaves the modem unpowered while the logic rail and line driver come up,
//! and the boot half applies modem power only after the channel is open so
//! the transmit line is in a legal state when the supply arrives.

use core::time::Duration;

use super::{RailAction, RailId, RailSequence, RailStep, SequenceKind};

/// Settle after forcing the line driver's transmit path on.
pub const TX_DRIVER_SETTLE: Duration = Duration::from_millis(20);
/// Supply settle before modem power is applied.
pub const MODEM_SUPPLY_SETTLE: Duration = Duration::from_secs(10);
/// Settle after modem power while its bootloader finishes.
pub const MODEM_BOOT_SETTLE: Duration = Duration::from_secs(10);
/// Trailing settle once the rails are down for sleep.
pub const SLEEP_RAIL_SETTLE: Duration = Duration::from_millis(10);

/// Rail steps run before the serial channel is opened.
pub const STARTUP_PRELUDE_STEPS: [RailStep; 5] = [
    // Transmit path off and modem unpowered before anything else changes.
    RailStep::immediate(RailId::TxDriver, RailAction::Disable),
    RailStep::immediate(RailId::Modem, RailAction::Disable),
    RailStep::immediate(RailId::Logic, RailAction::Enable),
    RailStep::immediate(RailId::StatusLed, RailAction::Enable),
    RailStep::new(
        RailId::TxDriver,
        RailAction::Enable,
        Duration::ZERO,
        TX_DRIVER_SETTLE,
    ),
];

/// Modem power-on, bracketed by the supply and bootloader settles.
pub const MODEM_BOOT_STEPS: [RailStep; 1] = [RailStep::new(
    RailId::Modem,
    RailAction::Enable,
    MODEM_SUPPLY_SETTLE,
    MODEM_BOOT_SETTLE,
)];

/// Rail steps for the sleep half of the power sequence.
pub const ENTER_SLEEP_STEPS: [RailStep; 4] = [
    RailStep::immediate(RailId::BusPullups, RailAction::Disable),
    RailStep::immediate(RailId::TxDriver, RailAction::Disable),
    RailStep::immediate(RailId::Logic, RailAction::Disable),
    RailStep::new(
        RailId::StatusLed,
        RailAction::Disable,
        Duration::ZERO,
        SLEEP_RAIL_SETTLE,
    ),
];

/// Rail steps for the wake half. The status LED stays off after the first
/// sleep to save power.
pub const WAKE_STEPS: [RailStep; 3] = [
    RailStep::immediate(RailId::Logic, RailAction::Enable),
    RailStep::immediate(RailId::TxDriver, RailAction::Enable),
    RailStep::immediate(RailId::BusPullups, RailAction::Enable),
];

pub const STARTUP_PRELUDE_TEMPLATE: RailSequence =
    RailSequence::new(SequenceKind::StartupPrelude, &STARTUP_PRELUDE_STEPS);

pub const MODEM_BOOT_TEMPLATE: RailSequence =
    RailSequence::new(SequenceKind::ModemBoot, &MODEM_BOOT_STEPS);

pub const ENTER_SLEEP_TEMPLATE: RailSequence =
    RailSequence::new(SequenceKind::EnterSleep, &ENTER_SLEEP_STEPS);

pub const WAKE_TEMPLATE: RailSequence = RailSequence::new(SequenceKind::Wake, &WAKE_STEPS);

/// Returns the shared startup-prelude template.
#[must_use]
pub const fn startup_prelude_template() -> RailSequence {
    STARTUP_PRELUDE_TEMPLATE
}

/// Returns the shared modem-boot template.
#[must_use]
pub const fn modem_boot_template() -> RailSequence {
    MODEM_BOOT_TEMPLATE
}

/// Returns the shared enter-sleep template.
#[must_use]
pub const fn enter_sleep_template() -> RailSequence {
    ENTER_SLEEP_TEMPLATE
}

/// Returns the shared wake template.
#[must_use]
pub const fn wake_template() -> RailSequence {
    WAKE_TEMPLATE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_forces_transmit_off_before_logic_comes_up() {
        let steps = STARTUP_PRELUDE_TEMPLATE.steps();
        assert_eq!(STARTUP_PRELUDE_TEMPLATE.kind, SequenceKind::StartupPrelude);
        assert_eq!(steps.len(), 5);

        assert_eq!(steps[0].rail, RailId::TxDriver);
        assert_eq!(steps[0].action, RailAction::Disable);
        assert_eq!(steps[1].rail, RailId::Modem);
        assert_eq!(steps[1].action, RailAction::Disable);
        assert_eq!(steps[2].rail, RailId::Logic);
        assert_eq!(steps[2].action, RailAction::Enable);

        let tx_enable = &steps[4];
        assert_eq!(tx_enable.rail, RailId::TxDriver);
        assert_eq!(tx_enable.action, RailAction::Enable);
        assert_eq!(tx_enable.settle_after, TX_DRIVER_SETTLE);
    }

    #[test]
    fn prelude_never_powers_the_modem() {
        assert!(
            STARTUP_PRELUDE_TEMPLATE
                .steps()
                .iter()
                .all(|step| step.rail != RailId::Modem || step.action == RailAction::Disable)
        );
    }

    #[test]
    fn modem_boot_brackets_power_with_long_settles() {
        let steps = MODEM_BOOT_TEMPLATE.steps();
        assert_eq!(MODEM_BOOT_TEMPLATE.step_count(), 1);

        let power_on = &steps[0];
        assert_eq!(power_on.rail, RailId::Modem);
        assert_eq!(power_on.action, RailAction::Enable);
        assert_eq!(power_on.settle_before, MODEM_SUPPLY_SETTLE);
        assert_eq!(power_on.settle_after, MODEM_BOOT_SETTLE);
        assert!(power_on.settle_before >= crate::power::FEED_GUARD_SETTLE);
    }

    #[test]
    fn sleep_drops_pullups_then_transmit_then_logic() {
        let steps = ENTER_SLEEP_TEMPLATE.steps();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].rail, RailId::BusPullups);
        assert_eq!(steps[1].rail, RailId::TxDriver);
        assert_eq!(steps[2].rail, RailId::Logic);
        assert!(steps.iter().all(|step| step.action == RailAction::Disable));
        assert_eq!(steps[3].settle_after, SLEEP_RAIL_SETTLE);
    }

    #[test]
    fn wake_reverses_the_sleep_order_without_the_led() {
        let steps = WAKE_TEMPLATE.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].rail, RailId::Logic);
        assert_eq!(steps[1].rail, RailId::TxDriver);
        assert_eq!(steps[2].rail, RailId::BusPullups);
        assert!(steps.iter().all(|step| step.action == RailAction::Enable));
        assert!(steps.iter().all(|step| step.rail != RailId::StatusLed));
    }
}
