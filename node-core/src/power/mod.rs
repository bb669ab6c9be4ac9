//! Power-rail catalog, sequence data structures, and the sequence runner.
//!
//! Rail transitions on this hardware need fixed settle delays: enabling the
//! modem supply, the line driver, and the bus pull-ups too quickly after each
//! other produces an invalid electrical state. Sequences are immutable step
//! lists shared by firmware and host targets; the runner applies them against
//! a [`RailControl`] implementation while keeping the watchdog fed around
//! every long settle.

use core::time::Duration;

use crate::platform::NodePlatform;
use crate::watchdog::{WatchdogHardware, WatchdogSupervisor};

pub mod templates;

pub use templates::{
    ENTER_SLEEP_TEMPLATE, MODEM_BOOT_TEMPLATE, STARTUP_PRELUDE_TEMPLATE, WAKE_TEMPLATE,
    enter_sleep_template, modem_boot_template, startup_prelude_template, wake_template,
};

/// Settle length at or above which the watchdog is fed immediately before and
/// after the delay.
pub const FEED_GUARD_SETTLE: Duration = Duration::from_secs(1);

/// Identifier for the switchable rails exposed by the supervisor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RailId {
    /// Logic supply feeding the line driver, sensors, and storage.
    Logic,
    /// Line driver's transmit-path force control.
    TxDriver,
    /// Bus pull-up pair for the peripheral bus.
    BusPullups,
    /// Acoustic modem supply.
    Modem,
    /// Activity indicator.
    StatusLed,
}

impl RailId {
    /// Deterministic index for lookups into [`ALL_RAILS`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            RailId::Logic => 0,
            RailId::TxDriver => 1,
            RailId::BusPullups => 2,
            RailId::Modem => 3,
            RailId::StatusLed => 4,
        }
    }

    /// Attempts to construct a [`RailId`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(RailId::Logic),
            1 => Some(RailId::TxDriver),
            2 => Some(RailId::BusPullups),
            3 => Some(RailId::Modem),
            4 => Some(RailId::StatusLed),
            _ => None,
        }
    }
}

/// Electrical polarity of a rail's enable control.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RailPolarity {
    ActiveHigh,
    ActiveLow,
}

/// Metadata describing how a rail is routed on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RailLine {
    pub id: RailId,
    pub name: &'static str,
    pub mcu_pin: &'static str,
    pub polarity: RailPolarity,
}

impl RailLine {
    #[must_use]
    pub const fn new(
        id: RailId,
        name: &'static str,
        mcu_pin: &'static str,
        polarity: RailPolarity,
    ) -> Self {
        Self {
            id,
            name,
            mcu_pin,
            polarity,
        }
    }
}

/// Compile-time catalog of every rail.
pub const ALL_RAILS: [RailLine; 5] = [
    RailLine::new(RailId::Logic, "EN-3V3", "PA8", RailPolarity::ActiveHigh),
    RailLine::new(RailId::TxDriver, "TX-FORCE", "PB5", RailPolarity::ActiveHigh),
    RailLine::new(RailId::BusPullups, "BUS-PULL", "PB8", RailPolarity::ActiveHigh),
    RailLine::new(RailId::Modem, "MODEM-EN", "PA10", RailPolarity::ActiveLow),
    RailLine::new(RailId::StatusLed, "LED-ACT", "PA15", RailPolarity::ActiveHigh),
];

/// Retrieve rail metadata by identifier.
#[must_use]
pub const fn rail_by_id(id: RailId) -> RailLine {
    ALL_RAILS[id.as_index()]
}

/// Action taken on a rail during a step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RailAction {
    Enable,
    Disable,
}

/// Ordered operation the runner applies to a rail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RailStep {
    pub rail: RailId,
    pub action: RailAction,
    pub settle_before: Duration,
    pub settle_after: Duration,
}

impl RailStep {
    #[must_use]
    pub const fn new(
        rail: RailId,
        action: RailAction,
        settle_before: Duration,
        settle_after: Duration,
    ) -> Self {
        Self {
            rail,
            action,
            settle_before,
            settle_after,
        }
    }

    /// Step with no settle on either side.
    #[must_use]
    pub const fn immediate(rail: RailId, action: RailAction) -> Self {
        Self::new(rail, action, Duration::ZERO, Duration::ZERO)
    }

    /// Returns the rail metadata associated with this step.
    #[must_use]
    pub fn rail_line(&self) -> RailLine {
        rail_by_id(self.rail)
    }
}

/// The transition described by a sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceKind {
    StartupPrelude,
    ModemBoot,
    EnterSleep,
    Wake,
}

/// Immutable rail sequence shared across targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RailSequence {
    pub kind: SequenceKind,
    steps: &'static [RailStep],
}

impl RailSequence {
    #[must_use]
    pub const fn new(kind: SequenceKind, steps: &'static [RailStep]) -> Self {
        Self { kind, steps }
    }

    /// Ordered rail steps that make up the sequence.
    #[must_use]
    pub const fn steps(&self) -> &'static [RailStep] {
        self.steps
    }

    /// Number of steps contained in the sequence.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Abstraction over the physical rail switches.
pub trait RailControl {
    /// Applies the requested action to the rail.
    fn apply(&mut self, rail: RailId, action: RailAction);
}

/// Rail control that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRailControl;

impl NoopRailControl {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RailControl for NoopRailControl {
    fn apply(&mut self, _: RailId, _: RailAction) {}
}

/// Executes a sequence, feeding the watchdog immediately before and after
/// every settle of [`FEED_GUARD_SETTLE`] or longer.
pub async fn run_sequence<R, W, P>(
    sequence: &RailSequence,
    rails: &mut R,
    watchdog: &mut WatchdogSupervisor<W>,
    platform: &mut P,
) where
    R: RailControl,
    W: WatchdogHardware,
    P: NodePlatform,
{
    for step in sequence.steps() {
        settle(step.settle_before, watchdog, platform).await;
        rails.apply(step.rail, step.action);
        settle(step.settle_after, watchdog, platform).await;
    }
}

async fn settle<W, P>(duration: Duration, watchdog: &mut WatchdogSupervisor<W>, platform: &mut P)
where
    W: WatchdogHardware,
    P: NodePlatform,
{
    if duration.is_zero() {
        return;
    }
    let guarded = duration >= FEED_GUARD_SETTLE;
    if guarded {
        watchdog.feed();
    }
    platform.delay(duration).await;
    if guarded {
        watchdog.feed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ResetCause;

    #[test]
    fn rail_lookup_returns_expected_metadata() {
        let modem = rail_by_id(RailId::Modem);
        assert_eq!(modem.name, "MODEM-EN");
        assert_eq!(modem.mcu_pin, "PA10");
        assert_eq!(modem.polarity, RailPolarity::ActiveLow);

        let logic = rail_by_id(RailId::Logic);
        assert_eq!(logic.polarity, RailPolarity::ActiveHigh);
    }

    #[test]
    fn rail_indices_round_trip() {
        for line in ALL_RAILS {
            assert_eq!(RailId::from_index(line.id.as_index()), Some(line.id));
        }
        assert_eq!(RailId::from_index(ALL_RAILS.len()), None);
    }

    #[derive(Default)]
    struct RecordingRails {
        applied: heapless::Vec<(RailId, RailAction), 16>,
    }

    impl RailControl for RecordingRails {
        fn apply(&mut self, rail: RailId, action: RailAction) {
            let _ = self.applied.push((rail, action));
        }
    }

    #[derive(Default)]
    struct FeedLog {
        feeds: usize,
    }

    impl WatchdogHardware for FeedLog {
        fn arm(&mut self, _: Duration) {}

        fn feed(&mut self) {
            self.feeds += 1;
        }
    }

    #[derive(Default)]
    struct InstantPlatform {
        delayed: heapless::Vec<Duration, 16>,
    }

    impl NodePlatform for InstantPlatform {
        fn reset_cause(&self) -> ResetCause {
            ResetCause::Undefined
        }

        fn wall_clock_seconds(&self) -> u32 {
            0
        }

        fn monotonic_millis(&self) -> u32 {
            0
        }

        fn monotonic_micros(&self) -> u32 {
            0
        }

        async fn delay(&mut self, duration: Duration) {
            let _ = self.delayed.push(duration);
        }

        async fn wait_for_wake(&mut self) {}

        fn reset(&mut self) {}
    }

    #[test]
    fn runner_applies_steps_in_order() {
        const STEPS: [RailStep; 2] = [
            RailStep::immediate(RailId::Logic, RailAction::Enable),
            RailStep::immediate(RailId::TxDriver, RailAction::Enable),
        ];
        let sequence = RailSequence::new(SequenceKind::Wake, &STEPS);

        let mut rails = RecordingRails::default();
        let mut watchdog = WatchdogSupervisor::new(FeedLog::default());
        let mut platform = InstantPlatform::default();

        embassy_futures::block_on(run_sequence(
            &sequence,
            &mut rails,
            &mut watchdog,
            &mut platform,
        ));

        assert_eq!(
            rails.applied.as_slice(),
            &[
                (RailId::Logic, RailAction::Enable),
                (RailId::TxDriver, RailAction::Enable),
            ]
        );
        assert!(platform.delayed.is_empty());
    }

    #[test]
    fn long_settles_are_bracketed_by_feeds() {
        const STEPS: [RailStep; 1] = [RailStep::new(
            RailId::Modem,
            RailAction::Enable,
            Duration::from_secs(10),
            Duration::from_secs(10),
        )];
        let sequence = RailSequence::new(SequenceKind::ModemBoot, &STEPS);

        let mut rails = RecordingRails::default();
        let mut watchdog = WatchdogSupervisor::new(FeedLog::default());
        let mut platform = InstantPlatform::default();

        embassy_futures::block_on(run_sequence(
            &sequence,
            &mut rails,
            &mut watchdog,
            &mut platform,
        ));

        // Two guarded settles, one feed before and one after each.
        assert_eq!(watchdog.hardware_mut().feeds, 4);
        assert_eq!(platform.delayed.len(), 2);
    }

    #[test]
    fn short_settles_skip_the_feed_guard() {
        const STEPS: [RailStep; 1] = [RailStep::new(
            RailId::StatusLed,
            RailAction::Disable,
            Duration::ZERO,
            Duration::from_millis(10),
        )];
        let sequence = RailSequence::new(SequenceKind::EnterSleep, &STEPS);

        let mut rails = RecordingRails::default();
        let mut watchdog = WatchdogSupervisor::new(FeedLog::default());
        let mut platform = InstantPlatform::default();

        embassy_futures::block_on(run_sequence(
            &sequence,
            &mut rails,
            &mut watchdog,
            &mut platform,
        ));

        assert_eq!(watchdog.hardware_mut().feeds, 0);
        assert_eq!(platform.delayed.as_slice(), &[Duration::from_millis(10)]);
    }
}
