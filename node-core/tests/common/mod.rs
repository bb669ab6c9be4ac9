//! Mock collaborators shared by the integration scenarios.
//!
//! Every mock appends to one ordered event log so tests can assert relative
//! ordering across collaborators (journal lines vs. rail switches vs. modem
//! calls). The clock is a shared millisecond counter advanced by delays and
//! by the light-sleep wait.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use node_core::command::{FlagError, FlagStore, NetworkError, NetworkHandler};
use node_core::journal::{Journal, SupervisorFault};
use node_core::modem::{ModemChannel, ModemError, ReceivedMessage};
use node_core::platform::{NodePlatform, ResetCause};
use node_core::power::{RailAction, RailControl, RailId};
use node_core::wake::{WakeLatch, WakeSnapshot};
use node_core::watchdog::WatchdogHardware;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Journal(String),
    Fault(String),
    Rail(RailId, RailAction),
    ModemOpen,
    Poll,
    Broadcast(Vec<u8>),
    NetworkAttach,
    NetworkPacket(Vec<u8>),
    FlagWrite,
    Reset,
    Armed(u64),
    Feed(u32),
    WaitForWake,
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;
pub type SharedClock = Rc<RefCell<u64>>;

pub fn new_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn new_clock(start_millis: u64) -> SharedClock {
    Rc::new(RefCell::new(start_millis))
}

pub fn leak_latch() -> &'static WakeLatch {
    Box::leak(Box::new(WakeLatch::new()))
}

pub fn snapshot_at(clock: &SharedClock) -> WakeSnapshot {
    let millis = *clock.borrow();
    WakeSnapshot::new(
        (millis / 1000) as u32,
        millis as u32,
        millis.wrapping_mul(1000) as u32,
    )
}

pub fn events(log: &EventLog) -> Vec<Event> {
    log.borrow().clone()
}

pub fn broadcasts(log: &EventLog) -> Vec<Vec<u8>> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Broadcast(payload) => Some(payload.clone()),
            _ => None,
        })
        .collect()
}

pub fn reset_count(log: &EventLog) -> usize {
    log.borrow()
        .iter()
        .filter(|event| matches!(event, Event::Reset))
        .count()
}

pub fn feed_seconds(log: &EventLog) -> Vec<u32> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Feed(at) => Some(*at),
            _ => None,
        })
        .collect()
}

pub struct MockModem {
    pub log: EventLog,
    pub address: u16,
    pub voltage: f32,
    pub inbox: VecDeque<ReceivedMessage>,
    ready: VecDeque<ReceivedMessage>,
    pub poll_hook: Option<Box<dyn FnMut()>>,
    pub poll_failure: Option<ModemError>,
}

impl MockModem {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            address: 7,
            voltage: 3.9,
            inbox: VecDeque::new(),
            ready: VecDeque::new(),
            poll_hook: None,
            poll_failure: None,
        }
    }

    pub fn queue_payload(&mut self, payload: &[u8]) {
        self.inbox.push_back(ReceivedMessage::from_payload(payload));
    }
}

impl ModemChannel for MockModem {
    async fn open(&mut self) -> Result<(), ModemError> {
        self.log.borrow_mut().push(Event::ModemOpen);
        Ok(())
    }

    async fn address(&mut self) -> Result<u16, ModemError> {
        Ok(self.address)
    }

    async fn battery_voltage(&mut self) -> Result<f32, ModemError> {
        Ok(self.voltage)
    }

    async fn send_broadcast(&mut self, payload: &[u8]) -> Result<(), ModemError> {
        self.log
            .borrow_mut()
            .push(Event::Broadcast(payload.to_vec()));
        Ok(())
    }

    async fn poll_receiver(&mut self) -> Result<(), ModemError> {
        self.log.borrow_mut().push(Event::Poll);
        if let Some(hook) = self.poll_hook.as_mut() {
            hook();
        }
        if let Some(failure) = self.poll_failure {
            return Err(failure);
        }
        Ok(())
    }

    fn process_incoming_buffer(&mut self) {
        while let Some(message) = self.inbox.pop_front() {
            self.ready.push_back(message);
        }
    }

    fn has_received_message(&self) -> bool {
        !self.ready.is_empty()
    }

    fn take_received_message(&mut self) -> Option<ReceivedMessage> {
        self.ready.pop_front()
    }
}

pub struct MockRails {
    pub log: EventLog,
    /// Runs on every apply; used to land an edge between the supervisor's
    /// liveness checks.
    pub apply_hook: Option<Box<dyn FnMut()>>,
}

impl MockRails {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            apply_hook: None,
        }
    }
}

impl RailControl for MockRails {
    fn apply(&mut self, rail: RailId, action: RailAction) {
        self.log.borrow_mut().push(Event::Rail(rail, action));
        if let Some(hook) = self.apply_hook.as_mut() {
            hook();
        }
    }
}

pub struct MockNetwork {
    pub log: EventLog,
    pub failure: Option<NetworkError>,
}

impl MockNetwork {
    pub fn new(log: EventLog) -> Self {
        Self { log, failure: None }
    }
}

impl NetworkHandler for MockNetwork {
    fn attach(&mut self) -> Result<(), NetworkError> {
        self.log.borrow_mut().push(Event::NetworkAttach);
        Ok(())
    }

    async fn handle_packet(&mut self, message: &ReceivedMessage) -> Result<(), NetworkError> {
        self.log
            .borrow_mut()
            .push(Event::NetworkPacket(message.payload.to_vec()));
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

pub struct MockFlags {
    pub log: EventLog,
    pub fail_writes: bool,
}

impl MockFlags {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_writes: false,
        }
    }
}

impl FlagStore for MockFlags {
    fn write_update_marker(&mut self) -> Result<(), FlagError> {
        self.log.borrow_mut().push(Event::FlagWrite);
        if self.fail_writes {
            Err(FlagError::WriteFailed)
        } else {
            Ok(())
        }
    }
}

pub struct MockJournal {
    pub log: EventLog,
}

impl Journal for MockJournal {
    fn record(&mut self, line: &str, source: &'static str) {
        self.log
            .borrow_mut()
            .push(Event::Journal(format!("{source}: {line}")));
    }

    fn record_fault(&mut self, fault: &SupervisorFault) {
        self.log.borrow_mut().push(Event::Fault(fault.to_string()));
    }
}

pub struct MockPlatform {
    pub log: EventLog,
    pub clock: SharedClock,
    pub cause: ResetCause,
    pub latch: &'static WakeLatch,
    /// Inject an edge after this many light-sleep waits; `None` never wakes
    /// from an edge (tests must bound iterations themselves).
    pub edge_after_waits: Option<u32>,
    waits_seen: u32,
}

impl MockPlatform {
    pub fn new(log: EventLog, clock: SharedClock, latch: &'static WakeLatch) -> Self {
        Self {
            log,
            clock,
            cause: ResetCause::PowerOn,
            latch,
            edge_after_waits: None,
            waits_seen: 0,
        }
    }
}

impl NodePlatform for MockPlatform {
    fn reset_cause(&self) -> ResetCause {
        self.cause
    }

    fn wall_clock_seconds(&self) -> u32 {
        (*self.clock.borrow() / 1000) as u32
    }

    fn monotonic_millis(&self) -> u32 {
        *self.clock.borrow() as u32
    }

    fn monotonic_micros(&self) -> u32 {
        self.clock.borrow().wrapping_mul(1000) as u32
    }

    async fn delay(&mut self, duration: Duration) {
        *self.clock.borrow_mut() += duration.as_millis() as u64;
    }

    async fn wait_for_wake(&mut self) {
        self.log.borrow_mut().push(Event::WaitForWake);
        *self.clock.borrow_mut() += 1000;
        self.waits_seen += 1;
        if let Some(after) = self.edge_after_waits
            && self.waits_seen > after
        {
            let millis = *self.clock.borrow();
            self.latch.on_edge(WakeSnapshot::new(
                (millis / 1000) as u32,
                millis as u32,
                millis.wrapping_mul(1000) as u32,
            ));
        }
    }

    fn reset(&mut self) {
        self.log.borrow_mut().push(Event::Reset);
    }
}

pub struct MockWatchdog {
    pub log: EventLog,
    pub clock: SharedClock,
    pub armed_with: Option<Duration>,
}

impl MockWatchdog {
    pub fn new(log: EventLog, clock: SharedClock) -> Self {
        Self {
            log,
            clock,
            armed_with: None,
        }
    }
}

impl WatchdogHardware for MockWatchdog {
    fn arm(&mut self, timeout: Duration) {
        self.armed_with = Some(timeout);
        self.log.borrow_mut().push(Event::Armed(timeout.as_secs()));
    }

    fn feed(&mut self) {
        let seconds = (*self.clock.borrow() / 1000) as u32;
        self.log.borrow_mut().push(Event::Feed(seconds));
    }
}
