//! The supervisory loop: ties the wake latch, activity policy, power
//! sequencer, watchdog, and command dispatcher together.
//!
//! One iteration feeds the watchdog, re-enables the logic rail, assesses the
//! activity policy, polls and dispatches while active, and runs the
//! sleep/wake halves of the power sequence when the window closes. Any fault
//! raised inside an iteration is journaled at the loop boundary and the loop
//! continues; the watchdog is the only backstop for a fault that recurs
//! tightly enough to starve feeding.

use core::fmt::Write as _;
use core::time::Duration;

use heapless::String;

use crate::command::{self, CommandDispatcher, FlagStore, ModuleCatalog, NetworkHandler};
use crate::journal::{Journal, SupervisorFault};
use crate::modem::ModemChannel;
use crate::platform::NodePlatform;
use crate::policy::{ActivityPolicy, Assessment, NodeState};
use crate::power::{
    self, RailAction, RailControl, RailId, enter_sleep_template, modem_boot_template,
    startup_prelude_template, wake_template,
};
use crate::wake::{WakeLatch, WakeSnapshot};
use crate::watchdog::{WatchdogHardware, WatchdogSupervisor};

/// Settle after opening the serial channel.
pub const CHANNEL_OPEN_SETTLE: Duration = Duration::from_millis(20);
/// Settle granted to the boot broadcast before the loop starts.
pub const STARTUP_BROADCAST_SETTLE: Duration = Duration::from_millis(500);
/// Settle after handing the modem to the network collaborator.
pub const NETWORK_INIT_SETTLE: Duration = Duration::from_millis(100);

const SOURCE: &str = "supervisor";

/// What a single iteration did, for host-side observation.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IterationReport {
    /// The poll branch ran this cycle.
    pub polled: bool,
    /// Messages drained through the dispatcher.
    pub dispatched: usize,
    /// The sleep half of the power sequence ran.
    pub slept: bool,
    /// The wake half of the power sequence ran.
    pub woke: bool,
}

/// Owns the collaborators and runs the control loop forever.
pub struct Supervisor<'a, M, R, N, F, J, P, W>
where
    M: ModemChannel,
    R: RailControl,
    N: NetworkHandler,
    F: FlagStore,
    J: Journal,
    P: NodePlatform,
    W: WatchdogHardware,
{
    modem: M,
    rails: R,
    network: N,
    flags: F,
    journal: J,
    platform: P,
    watchdog: WatchdogSupervisor<W>,
    latch: &'a WakeLatch,
    policy: ActivityPolicy,
    catalog: Option<ModuleCatalog>,
    last_snapshot: WakeSnapshot,
    uptime_start: u32,
}

impl<'a, M, R, N, F, J, P, W> Supervisor<'a, M, R, N, F, J, P, W>
where
    M: ModemChannel,
    R: RailControl,
    N: NetworkHandler,
    F: FlagStore,
    J: Journal,
    P: NodePlatform,
    W: WatchdogHardware,
{
    #[allow(clippy::too_many_arguments)]
    pub fn with_components(
        modem: M,
        rails: R,
        network: N,
        flags: F,
        journal: J,
        platform: P,
        watchdog_hardware: W,
        latch: &'a WakeLatch,
    ) -> Self {
        Self {
            modem,
            rails,
            network,
            flags,
            journal,
            platform,
            watchdog: WatchdogSupervisor::new(watchdog_hardware),
            latch,
            policy: ActivityPolicy::new(),
            catalog: None,
            last_snapshot: WakeSnapshot::default(),
            uptime_start: 0,
        }
    }

    /// Injects the installed-module catalog. Must run before the loop starts;
    /// without it the list-modules command is a no-op.
    pub fn set_module_catalog(&mut self, catalog: ModuleCatalog) {
        self.catalog = Some(catalog);
    }

    /// Current coarse operating state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.policy.state()
    }

    /// Wall-clock second captured at the end of startup.
    #[must_use]
    pub fn uptime_start(&self) -> u32 {
        self.uptime_start
    }

    /// One-time boot sequence. Arms the watchdog first; from that point the
    /// process is committed and every later step runs under its deadline.
    pub async fn startup(&mut self) -> Result<(), SupervisorFault> {
        self.watchdog.start();

        // Journal the reset cause before any rail is touched.
        let cause = self.platform.reset_cause();
        let mut line = String::<48>::new();
        let _ = write!(line, "Reset cause: {cause}");
        self.journal.record(line.as_str(), SOURCE);
        self.watchdog.feed();

        self.journal.record("Powering off modem", SOURCE);
        power::run_sequence(
            &startup_prelude_template(),
            &mut self.rails,
            &mut self.watchdog,
            &mut self.platform,
        )
        .await;

        // Channel open precedes modem power so the transmit line is legal
        // when the supply arrives.
        self.modem.open().await?;
        self.platform.delay(CHANNEL_OPEN_SETTLE).await;
        self.watchdog.feed();

        self.journal.record("Powering on modem", SOURCE);
        power::run_sequence(
            &modem_boot_template(),
            &mut self.rails,
            &mut self.watchdog,
            &mut self.platform,
        )
        .await;
        self.watchdog.feed();
        self.journal.record("Modem running", SOURCE);

        let address = self.modem.address().await?;
        self.platform.delay(command::QUERY_SETTLE).await;
        let voltage = self.modem.battery_voltage().await?;
        self.platform.delay(command::QUERY_SETTLE).await;
        let mut status = String::<48>::new();
        let _ = write!(status, "Modem address {address:03} voltage {voltage:.2}V");
        self.journal.record(status.as_str(), SOURCE);

        command::send_alive_message(&mut self.modem, &mut self.platform).await?;
        self.watchdog.feed();
        self.platform.delay(STARTUP_BROADCAST_SETTLE).await;

        self.network.attach()?;
        self.platform.delay(NETWORK_INIT_SETTLE).await;
        self.watchdog.feed();

        self.uptime_start = self.platform.wall_clock_seconds();
        Ok(())
    }

    /// Runs startup and then iterates forever. Faults are journaled and the
    /// loop moves on; nothing propagates past this point.
    pub async fn run(&mut self) -> ! {
        if let Err(fault) = self.startup().await {
            self.journal.record_fault(&fault);
        }
        loop {
            if let Err(fault) = self.run_iteration().await {
                self.journal.record_fault(&fault);
            }
        }
    }

    /// One loop iteration.
    pub async fn run_iteration(&mut self) -> Result<IterationReport, SupervisorFault> {
        let mut report = IterationReport::default();

        self.watchdog.feed();
        // Idempotent re-enable every cycle, even mid sleep transition.
        self.rails.apply(RailId::Logic, RailAction::Enable);

        let now = self.platform.wall_clock_seconds();
        let pending = self.latch.is_pending();
        if self
            .policy
            .assess(pending, now, self.latch.last_wake_seconds())
            == Assessment::Poll
        {
            report.polled = true;
            report.dispatched = self.poll_and_dispatch().await?;
        }

        let now = self.platform.wall_clock_seconds();
        if !self.latch.is_pending()
            && self.policy.window_elapsed(now, self.latch.last_wake_seconds())
        {
            // Double-check closes the race against an edge that arrived
            // between the test above and cutting power.
            if !self.latch.is_pending() {
                self.journal.record("Going to sleep", SOURCE);
                power::run_sequence(
                    &enter_sleep_template(),
                    &mut self.rails,
                    &mut self.watchdog,
                    &mut self.platform,
                )
                .await;
                self.policy.note_sleep();
                report.slept = true;
            }

            while !self.latch.is_pending() {
                self.watchdog.feed();
                self.platform.wait_for_wake().await;
            }

            self.watchdog.feed();
            power::run_sequence(
                &wake_template(),
                &mut self.rails,
                &mut self.watchdog,
                &mut self.platform,
            )
            .await;
            self.policy.note_wake();
            report.woke = true;
        }

        Ok(report)
    }

    async fn poll_and_dispatch(&mut self) -> Result<usize, SupervisorFault> {
        if let Some(snapshot) = self.latch.take() {
            self.journal.record("Frame-sync flag latched", SOURCE);
            self.last_snapshot = snapshot;
        }

        self.modem.poll_receiver().await?;
        self.modem.process_incoming_buffer();

        let mut dispatched = 0;
        while self.modem.has_received_message() {
            let Some(mut message) = self.modem.take_received_message() else {
                break;
            };
            self.journal.record("Received acoustic message", SOURCE);
            message.timestamp = self.last_snapshot;

            let mut dispatcher = CommandDispatcher {
                modem: &mut self.modem,
                network: &mut self.network,
                flags: &mut self.flags,
                journal: &mut self.journal,
                platform: &mut self.platform,
                watchdog: &mut self.watchdog,
                catalog: self.catalog.as_ref(),
            };
            dispatcher.dispatch(&message).await?;
            dispatched += 1;
        }
        Ok(dispatched)
    }
}
