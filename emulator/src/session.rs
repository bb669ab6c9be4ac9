use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use embassy_futures::block_on;
use node_core::command::{
    FlagError, FlagStore, ModuleCatalog, NetworkError, NetworkHandler,
};
use node_core::journal::{Journal, SupervisorFault};
use node_core::modem::{ModemChannel, ModemError, ReceivedMessage};
use node_core::platform::{NodePlatform, ResetCause};
use node_core::power::{RailAction, RailControl, RailId, rail_by_id};
use node_core::supervisor::Supervisor;
use node_core::wake::{WakeLatch, WakeSnapshot};
use node_core::watchdog::{WATCHDOG_TIMEOUT, WatchdogHardware};

const TRANSCRIPT_PATH: &str = "transcripts/node-emulator.log";

/// Light-sleep waits tolerated with no edge on the schedule before the
/// emulated hardware injects one to keep the session responsive.
const STARVED_WAIT_LIMIT: u32 = 120;

pub const HELP_LINES: &[&str] = &[
    "boot                 - run the startup sequence",
    "run [n]              - run n supervisor iterations (default 1)",
    "edge                 - raise the frame-sync line now",
    "edge +<secs>         - schedule an edge on the simulated clock",
    "msg <payload>        - queue an acoustic payload for the next poll",
    "advance <secs>       - move the simulated clock forward",
    "status               - show clock, state, and pending flag",
    "help                 - this text",
    "exit                 - close the session",
];

/// Simulated hardware shared by every collaborator.
struct SimWorld {
    clock_millis: u64,
    scheduled_edges: VecDeque<u64>,
    latch: &'static WakeLatch,
    lines: Vec<String>,
    starved_waits: u32,
    last_feed_millis: Option<u64>,
    reset_requests: u32,
}

impl SimWorld {
    fn new(latch: &'static WakeLatch, start_millis: u64) -> Self {
        Self {
            clock_millis: start_millis,
            scheduled_edges: VecDeque::new(),
            latch,
            lines: Vec::new(),
            starved_waits: 0,
            last_feed_millis: None,
            reset_requests: 0,
        }
    }

    fn now_secs(&self) -> u32 {
        (self.clock_millis / 1000) as u32
    }

    fn note(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn snapshot_at(&self, millis: u64) -> WakeSnapshot {
        WakeSnapshot::new(
            (millis / 1000) as u32,
            millis as u32,
            millis.wrapping_mul(1000) as u32,
        )
    }

    fn fire_edge(&mut self, at_millis: u64) {
        let snapshot = self.snapshot_at(at_millis);
        self.latch.on_edge(snapshot);
        self.note(format!("[{}s] frame-sync edge", snapshot.seconds));
    }

    fn schedule_edge(&mut self, at_millis: u64) {
        let position = self
            .scheduled_edges
            .iter()
            .position(|due| *due > at_millis)
            .unwrap_or(self.scheduled_edges.len());
        self.scheduled_edges.insert(position, at_millis);
    }

    fn fire_due_edges(&mut self) {
        while let Some(due) = self.scheduled_edges.front().copied() {
            if due > self.clock_millis {
                break;
            }
            self.scheduled_edges.pop_front();
            self.fire_edge(due);
        }
    }

    fn advance(&mut self, millis: u64) {
        self.clock_millis += millis;
        self.fire_due_edges();
    }
}

type World = Rc<RefCell<SimWorld>>;
type Inbox = Rc<RefCell<VecDeque<Vec<u8>>>>;

struct SimModem {
    world: World,
    inbox: Inbox,
    ready: VecDeque<ReceivedMessage>,
    address: u16,
    voltage: f32,
}

impl ModemChannel for SimModem {
    async fn open(&mut self) -> Result<(), ModemError> {
        self.world.borrow_mut().note("serial channel open");
        Ok(())
    }

    async fn address(&mut self) -> Result<u16, ModemError> {
        Ok(self.address)
    }

    async fn battery_voltage(&mut self) -> Result<f32, ModemError> {
        Ok(self.voltage)
    }

    async fn send_broadcast(&mut self, payload: &[u8]) -> Result<(), ModemError> {
        let text = String::from_utf8_lossy(payload).into_owned();
        self.world.borrow_mut().note(format!("broadcast: {text}"));
        Ok(())
    }

    async fn poll_receiver(&mut self) -> Result<(), ModemError> {
        Ok(())
    }

    fn process_incoming_buffer(&mut self) {
        let mut inbox = self.inbox.borrow_mut();
        while let Some(payload) = inbox.pop_front() {
            self.ready
                .push_back(ReceivedMessage::from_payload(&payload));
        }
    }

    fn has_received_message(&self) -> bool {
        !self.ready.is_empty()
    }

    fn take_received_message(&mut self) -> Option<ReceivedMessage> {
        self.ready.pop_front()
    }
}

struct SimRails {
    world: World,
    states: [Option<RailAction>; 5],
}

impl RailControl for SimRails {
    fn apply(&mut self, rail: RailId, action: RailAction) {
        let slot = &mut self.states[rail.as_index()];
        if *slot == Some(action) {
            return;
        }
        *slot = Some(action);
        let verb = match action {
            RailAction::Enable => "on",
            RailAction::Disable => "off",
        };
        self.world
            .borrow_mut()
            .note(format!("rail {} -> {verb}", rail_by_id(rail).name));
    }
}

struct SimNetwork {
    world: World,
}

impl NetworkHandler for SimNetwork {
    fn attach(&mut self) -> Result<(), NetworkError> {
        self.world.borrow_mut().note("network collaborator attached");
        Ok(())
    }

    async fn handle_packet(&mut self, message: &ReceivedMessage) -> Result<(), NetworkError> {
        let text = String::from_utf8_lossy(&message.payload).into_owned();
        self.world
            .borrow_mut()
            .note(format!("network packet: {text}"));
        Ok(())
    }
}

struct SimFlags {
    world: World,
}

impl FlagStore for SimFlags {
    fn write_update_marker(&mut self) -> Result<(), FlagError> {
        self.world.borrow_mut().note("update marker written");
        Ok(())
    }
}

struct SimJournal {
    world: World,
}

impl Journal for SimJournal {
    fn record(&mut self, line: &str, source: &'static str) {
        self.world.borrow_mut().note(format!("jot[{source}]: {line}"));
    }

    fn record_fault(&mut self, fault: &SupervisorFault) {
        self.world.borrow_mut().note(format!("fault: {fault}"));
    }
}

struct SimWatchdog {
    world: World,
}

impl WatchdogHardware for SimWatchdog {
    fn arm(&mut self, timeout: Duration) {
        let mut world = self.world.borrow_mut();
        world.last_feed_millis = Some(world.clock_millis);
        world.note(format!("watchdog armed ({}s)", timeout.as_secs()));
    }

    fn feed(&mut self) {
        let mut world = self.world.borrow_mut();
        let now = world.clock_millis;
        if let Some(last) = world.last_feed_millis
            && now.saturating_sub(last) > WATCHDOG_TIMEOUT.as_millis() as u64
        {
            world.note("!! watchdog starved, a real node would have reset");
        }
        world.last_feed_millis = Some(now);
    }
}

struct SimPlatform {
    world: World,
    cause: ResetCause,
}

impl NodePlatform for SimPlatform {
    fn reset_cause(&self) -> ResetCause {
        self.cause
    }

    fn wall_clock_seconds(&self) -> u32 {
        self.world.borrow().now_secs()
    }

    fn monotonic_millis(&self) -> u32 {
        self.world.borrow().clock_millis as u32
    }

    fn monotonic_micros(&self) -> u32 {
        self.world.borrow().clock_millis.wrapping_mul(1000) as u32
    }

    async fn delay(&mut self, duration: Duration) {
        self.world.borrow_mut().advance(duration.as_millis() as u64);
    }

    async fn wait_for_wake(&mut self) {
        let mut world = self.world.borrow_mut();
        world.advance(1000);
        if world.scheduled_edges.is_empty() && !world.latch.is_pending() {
            world.starved_waits += 1;
            if world.starved_waits > STARVED_WAIT_LIMIT {
                world.starved_waits = 0;
                world.note("no edge scheduled; emulated hardware raises the flag line");
                let at = world.clock_millis;
                world.fire_edge(at);
            }
        } else {
            world.starved_waits = 0;
        }
    }

    fn reset(&mut self) {
        let mut world = self.world.borrow_mut();
        world.reset_requests += 1;
        world.note("** device reset requested **");
    }
}

type SimSupervisor = Supervisor<
    'static,
    SimModem,
    SimRails,
    SimNetwork,
    SimFlags,
    SimJournal,
    SimPlatform,
    SimWatchdog,
>;

pub struct Session {
    supervisor: SimSupervisor,
    world: World,
    inbox: Inbox,
    transcript: TranscriptLogger,
    command_count: usize,
    booted: bool,
}

impl Session {
    pub fn new() -> io::Result<Self> {
        let latch: &'static WakeLatch = Box::leak(Box::new(WakeLatch::new()));
        // Wall clock starts at an epoch-like value so the first idle
        // iteration goes to sleep, matching a freshly deployed node.
        let world: World = Rc::new(RefCell::new(SimWorld::new(latch, 1_600_000_000_000)));
        let inbox: Inbox = Rc::new(RefCell::new(VecDeque::new()));

        let mut supervisor = Supervisor::with_components(
            SimModem {
                world: world.clone(),
                inbox: inbox.clone(),
                ready: VecDeque::new(),
                address: 7,
                voltage: 3.91,
            },
            SimRails {
                world: world.clone(),
                states: [None; 5],
            },
            SimNetwork {
                world: world.clone(),
            },
            SimFlags {
                world: world.clone(),
            },
            SimJournal {
                world: world.clone(),
            },
            SimPlatform {
                world: world.clone(),
                cause: ResetCause::PowerOn,
            },
            SimWatchdog {
                world: world.clone(),
            },
            latch,
        );

        let mut catalog = ModuleCatalog::new();
        let _ = catalog.push("mainloop", Some("0.1.0"));
        let _ = catalog.push("localisation", None);
        supervisor.set_module_catalog(catalog);

        Ok(Self {
            supervisor,
            world,
            inbox,
            transcript: TranscriptLogger::new()?,
            command_count: 0,
            booted: false,
        })
    }

    pub fn handle_command(&mut self, input: &str) -> io::Result<Vec<String>> {
        self.command_count += 1;
        self.transcript.log(&format!("> {input}"))?;

        let mut responses = Vec::new();
        let mut parts = input.split_whitespace();
        match parts.next() {
            Some("boot") => {
                if self.booted {
                    responses.push("already booted".to_string());
                } else {
                    self.booted = true;
                    match block_on(self.supervisor.startup()) {
                        Ok(()) => responses.push("startup complete".to_string()),
                        Err(fault) => responses.push(format!("startup fault: {fault}")),
                    }
                }
            }
            Some("run") => {
                let count = parts
                    .next()
                    .and_then(|raw| raw.parse::<usize>().ok())
                    .unwrap_or(1);
                for _ in 0..count {
                    match block_on(self.supervisor.run_iteration()) {
                        Ok(report) => {
                            if report.slept || report.woke || report.dispatched > 0 {
                                responses.push(format!(
                                    "iteration: polled={} dispatched={} slept={} woke={}",
                                    report.polled, report.dispatched, report.slept, report.woke
                                ));
                            }
                        }
                        Err(fault) => responses.push(format!("iteration fault: {fault}")),
                    }
                }
            }
            Some("edge") => match parts.next() {
                None => {
                    let now = self.world.borrow().clock_millis;
                    self.world.borrow_mut().fire_edge(now);
                }
                Some(offset) => match parse_offset_secs(offset) {
                    Some(secs) => {
                        let mut world = self.world.borrow_mut();
                        let due = world.clock_millis + secs * 1000;
                        world.schedule_edge(due);
                        responses.push(format!("edge scheduled in {secs}s"));
                    }
                    None => responses.push("usage: edge [+<secs>]".to_string()),
                },
            },
            Some("msg") => {
                let payload = input.trim_start().strip_prefix("msg").unwrap_or("").trim();
                if payload.is_empty() {
                    responses.push("usage: msg <payload>".to_string());
                } else {
                    self.inbox
                        .borrow_mut()
                        .push_back(payload.as_bytes().to_vec());
                    responses.push(format!("queued {} byte payload", payload.len()));
                }
            }
            Some("advance") => match parts.next().and_then(|raw| raw.parse::<u64>().ok()) {
                Some(secs) => {
                    self.world.borrow_mut().advance(secs * 1000);
                    responses.push(format!("clock advanced {secs}s"));
                }
                None => responses.push("usage: advance <secs>".to_string()),
            },
            Some("status") => {
                let world = self.world.borrow();
                responses.push(format!(
                    "clock={}s state={:?} pending={} resets={}",
                    world.now_secs(),
                    self.supervisor.state(),
                    world.latch.is_pending(),
                    world.reset_requests,
                ));
            }
            Some("help") => {
                responses.extend(HELP_LINES.iter().map(ToString::to_string));
            }
            Some(other) => {
                responses.push(format!("unknown command `{other}`, try `help`"));
            }
            None => {}
        }

        // Collaborator notes come first so the causality reads top-down.
        let mut lines: Vec<String> = self.world.borrow_mut().lines.drain(..).collect();
        lines.extend(responses);
        for line in &lines {
            self.transcript.log(line)?;
        }
        Ok(lines)
    }
}

fn parse_offset_secs(raw: &str) -> Option<u64> {
    raw.strip_prefix('+')?.parse().ok()
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new() -> io::Result<Self> {
        if let Some(parent) = Path::new(TRANSCRIPT_PATH).parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(TRANSCRIPT_PATH)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "--- sensor node emulator session ---")?;
        Ok(Self { writer })
    }

    fn log(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }
}
