//! UART transport implementing the supervisor's modem contract.
//!
//! Only the narrow surface the supervisor needs lives here: the status query
//! for address and battery voltage, fire-and-forget broadcasts, and a
//! bounded-latency receive path that hands complete line-framed payloads to
//! the dispatcher. The modem's wider command protocol stays in the modem.

#![cfg(target_os = "none")]

use embassy_time::{Duration, with_timeout};
use embedded_io_async::{Read, Write};
use heapless::{Deque, Vec};

use node_core::modem::{MAX_PAYLOAD, ModemChannel, ModemError, ReceivedMessage};

/// Bound on a single non-blocking receive poll.
const POLL_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Deadline for a status-query response.
const QUERY_TIMEOUT: Duration = Duration::from_millis(500);
/// Raw receive buffer between polls.
const RX_BUFFER: usize = 256;
/// Complete messages awaiting dispatch.
const RX_QUEUE: usize = 4;

/// Scale factor from the modem's raw 16-bit battery reading to volts.
const BATTERY_SCALE: f32 = 15.0 / 65536.0;

pub struct UartModem<T> {
    uart: T,
    opened: bool,
    rx_buffer: Vec<u8, RX_BUFFER>,
    received: Deque<ReceivedMessage, RX_QUEUE>,
}

impl<T> UartModem<T>
where
    T: Read + Write,
{
    pub fn new(uart: T) -> Self {
        Self {
            uart,
            opened: false,
            rx_buffer: Vec::new(),
            received: Deque::new(),
        }
    }

    fn ensure_open(&self) -> Result<(), ModemError> {
        if self.opened {
            Ok(())
        } else {
            Err(ModemError::ChannelClosed)
        }
    }

    async fn read_chunk(&mut self, deadline: Duration) -> Result<usize, ModemError> {
        let mut chunk = [0u8; 32];
        match with_timeout(deadline, self.uart.read(&mut chunk)).await {
            Ok(Ok(count)) => {
                for byte in &chunk[..count] {
                    // A full buffer means the parser is behind; drop the
                    // oldest unparsed bytes rather than the newest.
                    if self.rx_buffer.is_full() {
                        self.rx_buffer.remove(0);
                    }
                    let _ = self.rx_buffer.push(*byte);
                }
                Ok(count)
            }
            Ok(Err(_)) => Err(ModemError::Io),
            Err(_) => Ok(0),
        }
    }

    fn pop_line(&mut self) -> Option<Vec<u8, MAX_PAYLOAD>> {
        let newline = self.rx_buffer.iter().position(|byte| *byte == b'\n')?;
        let mut line = Vec::new();
        for byte in &self.rx_buffer[..newline] {
            if *byte != b'\r' && line.push(*byte).is_err() {
                break;
            }
        }
        // Drop the line and its terminator from the raw buffer.
        let remainder: Vec<u8, RX_BUFFER> = Vec::from_slice(&self.rx_buffer[newline + 1..])
            .unwrap_or_else(|_| Vec::new());
        self.rx_buffer = remainder;
        Some(line)
    }

    /// Issues the status query and parses `#A<3-digit-address>V<raw>`.
    async fn query_status(&mut self) -> Result<(u16, f32), ModemError> {
        self.ensure_open()?;
        self.uart
            .write_all(b"$?\r\n")
            .await
            .map_err(|_| ModemError::Io)?;

        let response = with_timeout(QUERY_TIMEOUT, async {
            loop {
                if let Some(line) = self.pop_line() {
                    if line.starts_with(b"#A") {
                        return Ok::<_, ModemError>(line);
                    }
                    // Not the status response; keep it for the dispatcher.
                    self.queue_payload(&line);
                    continue;
                }
                self.read_chunk(POLL_READ_TIMEOUT).await?;
            }
        })
        .await
        .map_err(|_| ModemError::Timeout)??;

        parse_status_line(&response)
    }

    fn queue_payload(&mut self, payload: &[u8]) {
        if payload.is_empty() {
            return;
        }
        if self.received.is_full() {
            let _ = self.received.pop_front();
        }
        let _ = self
            .received
            .push_back(ReceivedMessage::from_payload(payload));
    }
}

fn parse_status_line(line: &[u8]) -> Result<(u16, f32), ModemError> {
    let rest = line.strip_prefix(b"#A").ok_or(ModemError::Malformed)?;
    if rest.len() < 3 {
        return Err(ModemError::Malformed);
    }
    let address = ascii_number(&rest[..3]).ok_or(ModemError::Malformed)?;
    let volt_at = rest
        .iter()
        .position(|byte| *byte == b'V')
        .ok_or(ModemError::Malformed)?;
    let raw = ascii_number(&rest[volt_at + 1..]).ok_or(ModemError::Malformed)?;
    Ok((address, f32::from(raw) * BATTERY_SCALE))
}

fn ascii_number(digits: &[u8]) -> Option<u16> {
    if digits.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for byte in digits {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value * 10 + u32::from(byte - b'0');
        if value > u32::from(u16::MAX) {
            return None;
        }
    }
    Some(value as u16)
}

impl<T> ModemChannel for UartModem<T>
where
    T: Read + Write,
{
    async fn open(&mut self) -> Result<(), ModemError> {
        self.opened = true;
        Ok(())
    }

    async fn address(&mut self) -> Result<u16, ModemError> {
        self.query_status().await.map(|(address, _)| address)
    }

    async fn battery_voltage(&mut self) -> Result<f32, ModemError> {
        self.query_status().await.map(|(_, voltage)| voltage)
    }

    async fn send_broadcast(&mut self, payload: &[u8]) -> Result<(), ModemError> {
        self.ensure_open()?;
        let length = payload.len().min(99);
        let header = [
            b'$',
            b'B',
            b'0' + (length / 10) as u8,
            b'0' + (length % 10) as u8,
        ];
        self.uart
            .write_all(&header)
            .await
            .map_err(|_| ModemError::Io)?;
        self.uart
            .write_all(&payload[..length])
            .await
            .map_err(|_| ModemError::Io)?;
        self.uart
            .write_all(b"\r\n")
            .await
            .map_err(|_| ModemError::Io)
    }

    async fn poll_receiver(&mut self) -> Result<(), ModemError> {
        self.ensure_open()?;
        self.read_chunk(POLL_READ_TIMEOUT).await.map(|_| ())
    }

    fn process_incoming_buffer(&mut self) {
        while let Some(line) = self.pop_line() {
            self.queue_payload(&line);
        }
    }

    fn has_received_message(&self) -> bool {
        !self.received.is_empty()
    }

    fn take_received_message(&mut self) -> Option<ReceivedMessage> {
        self.received.pop_front()
    }
}
