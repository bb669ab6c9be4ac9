//! Interface boundary to the acoustic modem.
//!
//! The modem's byte-level framing and command protocol live outside this
//! crate; the supervisor only needs the narrow surface below. All sends are
//! fire-and-forget with no delivery acknowledgement at this layer.

use core::fmt;

use heapless::Vec;

use crate::wake::WakeSnapshot;

/// Upper bound on a single acoustic payload handled by the supervisor.
pub const MAX_PAYLOAD: usize = 64;

/// A fully-received acoustic message, owned transiently by the dispatch step.
///
/// The modem fills `payload`; the supervisor overwrites `timestamp` with the
/// wake snapshot latched at the frame-sync edge that announced the message.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReceivedMessage {
    pub payload: Vec<u8, MAX_PAYLOAD>,
    pub timestamp: WakeSnapshot,
}

impl ReceivedMessage {
    /// Builds a message from a raw payload, truncating at [`MAX_PAYLOAD`].
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Self {
        let take = payload.len().min(MAX_PAYLOAD);
        let mut buffer = Vec::new();
        // Length is clamped above, extend cannot fail.
        let _ = buffer.extend_from_slice(&payload[..take]);
        Self {
            payload: buffer,
            timestamp: WakeSnapshot::default(),
        }
    }
}

/// Transient I/O faults surfaced by the modem channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModemError {
    /// Bounded read or query expired without a response.
    Timeout,
    /// Serial channel is not open or was lost.
    ChannelClosed,
    /// Response arrived but could not be understood.
    Malformed,
    /// Underlying transport failure.
    Io,
}

impl fmt::Display for ModemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ModemError::Timeout => "modem response timeout",
            ModemError::ChannelClosed => "modem channel closed",
            ModemError::Malformed => "malformed modem response",
            ModemError::Io => "modem transport failure",
        };
        f.write_str(text)
    }
}

/// Minimum contract the supervisor requires from the modem driver.
#[allow(async_fn_in_trait)]
pub trait ModemChannel {
    /// Opens the serial channel. Must run before modem power is applied so
    /// the transmit line is in a legal state when the supply arrives.
    async fn open(&mut self) -> Result<(), ModemError>;

    /// Queries the modem for this node's address.
    async fn address(&mut self) -> Result<u16, ModemError>;

    /// Queries the modem's battery voltage in volts.
    async fn battery_voltage(&mut self) -> Result<f32, ModemError>;

    /// Fire-and-forget broadcast of `payload` over the acoustic link.
    async fn send_broadcast(&mut self, payload: &[u8]) -> Result<(), ModemError>;

    /// Non-blocking, bounded-latency pull of bytes from the serial channel.
    async fn poll_receiver(&mut self) -> Result<(), ModemError>;

    /// Parses whatever the receiver has buffered into complete messages.
    fn process_incoming_buffer(&mut self);

    /// `true` while at least one fully-received message is queued.
    fn has_received_message(&self) -> bool;

    /// Removes and returns the oldest fully-received message.
    fn take_received_message(&mut self) -> Option<ReceivedMessage>;
}
