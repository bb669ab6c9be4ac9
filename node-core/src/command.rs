//! Classification and dispatch of control commands received over the
//! acoustic link.
//!
//! Payloads are classified once into a [`CommandKind`] using exact marker
//! matches followed by the network prefix check, in that fixed order; the
//! first match wins. Unrecognized payloads are not an error, the node simply
//! ignores them.

use core::fmt;
use core::fmt::Write as _;
use core::time::Duration;

use heapless::{String, Vec};

use crate::journal::{Journal, SupervisorFault};
use crate::modem::{ModemChannel, ModemError, ReceivedMessage};
use crate::platform::NodePlatform;
use crate::watchdog::{WatchdogHardware, WatchdogSupervisor};

/// Immediate unconditional device reset.
pub const RESET_MARKER: &[u8] = b"USMRT";
/// Persist the update flag, then reset so the next boot fetches an update.
pub const OTA_MARKER: &[u8] = b"USOTA";
/// Re-send the alive announcement.
pub const PING_MARKER: &[u8] = b"USPNG";
/// Broadcast one message per installed module.
pub const LIST_MODULES_MARKER: &[u8] = b"USMOD";
/// First byte reserved for sensor-network packets.
pub const NETWORK_PREFIX: u8 = b'#';
/// Shortest payload forwarded to the network collaborator.
pub const MIN_NETWORK_PAYLOAD: usize = 3;

/// Revision tag appended to the alive announcement so an operator can tell
/// whether an over-the-air update took effect.
pub const FIRMWARE_REVISION: &str = "REV:2025-11-03T09:12:00";

/// Settle between consecutive modem queries.
pub const QUERY_SETTLE: Duration = Duration::from_millis(20);
/// Pacing between consecutive module-list broadcasts.
pub const SEND_PACING: Duration = Duration::from_secs(1);

/// Capacity of a formatted broadcast.
pub const MAX_BROADCAST: usize = 64;

const SOURCE: &str = "command";

/// Tagged classification of a received payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandKind {
    Reset,
    OtaRequest,
    Ping,
    ListModules,
    Network,
    Unrecognized,
}

impl CommandKind {
    /// Classifies `payload`, checking the exact markers first and the network
    /// prefix last. Evaluated once per message.
    #[must_use]
    pub fn classify(payload: &[u8]) -> Self {
        if payload == RESET_MARKER {
            CommandKind::Reset
        } else if payload == OTA_MARKER {
            CommandKind::OtaRequest
        } else if payload == PING_MARKER {
            CommandKind::Ping
        } else if payload == LIST_MODULES_MARKER {
            CommandKind::ListModules
        } else if payload.len() >= MIN_NETWORK_PAYLOAD && payload[0] == NETWORK_PREFIX {
            CommandKind::Network
        } else {
            CommandKind::Unrecognized
        }
    }
}

/// Persistence faults from the flag store.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FlagError {
    WriteFailed,
}

impl fmt::Display for FlagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagError::WriteFailed => f.write_str("update marker write failed"),
        }
    }
}

/// Persistent flag storage read by code outside this core at the next boot.
pub trait FlagStore {
    /// Creates or overwrites the zero-length update marker record.
    fn write_update_marker(&mut self) -> Result<(), FlagError>;
}

/// Faults from the sensor-network collaborator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NetworkError {
    HandlerFailure,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::HandlerFailure => f.write_str("packet handler failure"),
        }
    }
}

/// Sensor-network collaborator consuming `#`-prefixed packets.
#[allow(async_fn_in_trait)]
pub trait NetworkHandler {
    /// Called once at startup, after the modem is running. The collaborator
    /// receives its modem and watchdog handles at construction.
    fn attach(&mut self) -> Result<(), NetworkError>;

    /// Hands over a network packet unmodified.
    async fn handle_packet(&mut self, message: &ReceivedMessage) -> Result<(), NetworkError>;
}

/// Network handler that accepts every packet without acting on it. Stands in
/// until the deployment links the real collaborator.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopNetwork;

impl NoopNetwork {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl NetworkHandler for NoopNetwork {
    fn attach(&mut self) -> Result<(), NetworkError> {
        Ok(())
    }

    async fn handle_packet(&mut self, _: &ReceivedMessage) -> Result<(), NetworkError> {
        Ok(())
    }
}

/// Longest module name the catalog stores.
pub const MAX_MODULE_NAME: usize = 24;
/// Longest version string the catalog stores.
pub const MAX_MODULE_VERSION: usize = 16;
/// Maximum number of installed modules tracked.
pub const MAX_MODULES: usize = 8;

/// One installed module and its optional version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModuleEntry {
    pub name: String<MAX_MODULE_NAME>,
    pub version: Option<String<MAX_MODULE_VERSION>>,
}

/// Errors raised while building a [`ModuleCatalog`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModuleCatalogError {
    Full,
    NameTooLong,
    VersionTooLong,
}

/// Insertion-ordered list of installed modules, injected before the loop
/// starts and read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct ModuleCatalog {
    entries: Vec<ModuleEntry, MAX_MODULES>,
}

impl ModuleCatalog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a module, preserving insertion order.
    pub fn push(&mut self, name: &str, version: Option<&str>) -> Result<(), ModuleCatalogError> {
        let mut entry_name = String::new();
        entry_name
            .push_str(name)
            .map_err(|_| ModuleCatalogError::NameTooLong)?;
        let entry_version = match version {
            Some(text) => {
                let mut owned = String::new();
                owned
                    .push_str(text)
                    .map_err(|_| ModuleCatalogError::VersionTooLong)?;
                Some(owned)
            }
            None => None,
        };
        self.entries
            .push(ModuleEntry {
                name: entry_name,
                version: entry_version,
            })
            .map_err(|_| ModuleCatalogError::Full)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, ModuleEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Formats the alive announcement: `UA<3-digit-address>B<voltage>V` plus the
/// firmware revision tag.
#[must_use]
pub fn format_alive_message(address: u16, voltage: f32) -> String<MAX_BROADCAST> {
    let mut message = String::new();
    let _ = write!(message, "UA{address:03}B{voltage:.2}V{FIRMWARE_REVISION}");
    message
}

/// Formats one module-list broadcast: `UM<3-digit-address>:<name>:<version>`,
/// rendering a missing version as `None`.
#[must_use]
pub fn format_module_message(address: u16, entry: &ModuleEntry) -> String<MAX_BROADCAST> {
    let mut message = String::new();
    let _ = write!(message, "UM{address:03}:{}:", entry.name);
    match &entry.version {
        Some(version) => {
            let _ = message.push_str(version);
        }
        None => {
            let _ = message.push_str("None");
        }
    }
    message
}

/// Queries the modem for address and battery voltage, then broadcasts the
/// alive announcement. Used at startup and on the ping command.
pub async fn send_alive_message<M, P>(modem: &mut M, platform: &mut P) -> Result<(), ModemError>
where
    M: ModemChannel,
    P: NodePlatform,
{
    let address = modem.address().await?;
    platform.delay(QUERY_SETTLE).await;
    let voltage = modem.battery_voltage().await?;
    platform.delay(QUERY_SETTLE).await;
    let message = format_alive_message(address, voltage);
    modem.send_broadcast(message.as_bytes()).await
}

/// Borrowed view over the collaborators a single dispatch needs.
///
/// Constructed per message by the supervisor from its own fields; the
/// dispatcher owns nothing.
pub struct CommandDispatcher<'a, M, N, F, J, P, W>
where
    M: ModemChannel,
    N: NetworkHandler,
    F: FlagStore,
    J: Journal,
    P: NodePlatform,
    W: WatchdogHardware,
{
    pub modem: &'a mut M,
    pub network: &'a mut N,
    pub flags: &'a mut F,
    pub journal: &'a mut J,
    pub platform: &'a mut P,
    pub watchdog: &'a mut WatchdogSupervisor<W>,
    pub catalog: Option<&'a ModuleCatalog>,
}

impl<M, N, F, J, P, W> CommandDispatcher<'_, M, N, F, J, P, W>
where
    M: ModemChannel,
    N: NetworkHandler,
    F: FlagStore,
    J: Journal,
    P: NodePlatform,
    W: WatchdogHardware,
{
    /// Classifies and executes one received message. Device reset and the
    /// update-marker write are irreversible within the cycle.
    pub async fn dispatch(
        &mut self,
        message: &ReceivedMessage,
    ) -> Result<CommandKind, SupervisorFault> {
        let kind = CommandKind::classify(&message.payload);
        match kind {
            CommandKind::Reset => {
                self.journal.record("Reset command received", SOURCE);
                self.platform.reset();
            }
            CommandKind::OtaRequest => {
                self.journal.record("Update request received", SOURCE);
                if let Err(fault) = self.flags.write_update_marker() {
                    // The marker is best-effort, the reset is not.
                    self.journal.record_fault(&fault.into());
                }
                self.platform.reset();
            }
            CommandKind::Ping => {
                self.journal.record("Ping received", SOURCE);
                send_alive_message(&mut *self.modem, &mut *self.platform)
                    .await
                    .map_err(SupervisorFault::Modem)?;
            }
            CommandKind::ListModules => {
                self.journal.record("Module list requested", SOURCE);
                self.broadcast_module_catalog().await?;
            }
            CommandKind::Network => {
                self.platform.compact_memory();
                self.network
                    .handle_packet(message)
                    .await
                    .map_err(SupervisorFault::Network)?;
                self.platform.compact_memory();
            }
            CommandKind::Unrecognized => {}
        }
        Ok(kind)
    }

    async fn broadcast_module_catalog(&mut self) -> Result<(), SupervisorFault> {
        let Some(catalog) = self.catalog else {
            return Ok(());
        };
        if catalog.is_empty() {
            return Ok(());
        }

        let address = self
            .modem
            .address()
            .await
            .map_err(SupervisorFault::Modem)?;
        for entry in catalog.iter() {
            let message = format_module_message(address, entry);
            self.modem
                .send_broadcast(message.as_bytes())
                .await
                .map_err(SupervisorFault::Modem)?;
            // Respect the channel's send rate between broadcasts.
            self.platform.delay(SEND_PACING).await;
            self.watchdog.feed();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_the_fixed_order() {
        assert_eq!(CommandKind::classify(b"USMRT"), CommandKind::Reset);
        assert_eq!(CommandKind::classify(b"USOTA"), CommandKind::OtaRequest);
        assert_eq!(CommandKind::classify(b"USPNG"), CommandKind::Ping);
        assert_eq!(CommandKind::classify(b"USMOD"), CommandKind::ListModules);
        assert_eq!(CommandKind::classify(b"#ab"), CommandKind::Network);
    }

    #[test]
    fn near_misses_are_unrecognized() {
        assert_eq!(CommandKind::classify(b""), CommandKind::Unrecognized);
        assert_eq!(CommandKind::classify(b"USMRTX"), CommandKind::Unrecognized);
        assert_eq!(CommandKind::classify(b"usmrt"), CommandKind::Unrecognized);
        // Too short for a network packet even with the prefix.
        assert_eq!(CommandKind::classify(b"#a"), CommandKind::Unrecognized);
        assert_eq!(CommandKind::classify(b"UX123"), CommandKind::Unrecognized);
    }

    #[test]
    fn network_prefix_needs_three_bytes() {
        assert_eq!(CommandKind::classify(b"#ab"), CommandKind::Network);
        assert_eq!(
            CommandKind::classify(b"#network-payload"),
            CommandKind::Network
        );
    }

    #[test]
    fn alive_message_format_matches_the_announcement() {
        let message = format_alive_message(7, 3.9);
        let mut expected = String::<MAX_BROADCAST>::new();
        let _ = write!(expected, "UA007B3.90V{FIRMWARE_REVISION}");
        assert_eq!(message, expected);
    }

    #[test]
    fn alive_message_rounds_voltage_to_two_decimals() {
        let message = format_alive_message(123, 4.176);
        assert!(message.as_str().starts_with("UA123B4.18V"));
    }

    #[test]
    fn module_message_renders_missing_version_as_none() {
        let mut catalog = ModuleCatalog::new();
        catalog.push("alpha", Some("1.0")).unwrap();
        catalog.push("beta", None).unwrap();

        let mut rendered = catalog
            .iter()
            .map(|entry| format_module_message(7, entry));
        assert_eq!(rendered.next().unwrap().as_str(), "UM007:alpha:1.0");
        assert_eq!(rendered.next().unwrap().as_str(), "UM007:beta:None");
        assert!(rendered.next().is_none());
    }

    #[test]
    fn catalog_rejects_oversized_entries() {
        let mut catalog = ModuleCatalog::new();
        let long_name = "a-module-name-well-past-the-limit";
        assert_eq!(
            catalog.push(long_name, None),
            Err(ModuleCatalogError::NameTooLong)
        );
        assert!(catalog.is_empty());
    }
}
