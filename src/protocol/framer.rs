//! Packet framer.
//!
//! Splits messages into header-prefixed packets sized for the radio and
//! reassembles them on the way back. Delivery is best effort: there is no
//! retransmission, and an incomplete message is discarded when the listen
//! window closes.

use crate::config::FramerConfig;
use crate::core::packet::{Packet, PacketHeader, HEADER_SIZE};
use crate::error::{constants, ProtocolError, Result};
use crate::nvm::Counter;
use crate::transport::Transport;
use crate::utils::metrics::{global_metrics, Timer};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Payload of an acknowledgement
pub const ACK: &[u8] = b"ACK";

/// Fragments and reassembles messages over a single-packet [`Transport`].
///
/// One caller owns a `PacketManager`; `&mut self` on every radio operation
/// keeps the identifier counter and the transport serialized.
pub struct PacketManager<T: Transport> {
    transport: T,
    license: String,
    message_counter: Counter,
    config: FramerConfig,
}

impl<T: Transport> PacketManager<T> {
    pub fn new(
        transport: T,
        license: impl Into<String>,
        message_counter: Counter,
        config: FramerConfig,
    ) -> Self {
        Self {
            transport,
            license: license.into(),
            message_counter,
            config,
        }
    }

    /// Payload bytes per packet, re-derived from the radio on every call
    pub fn payload_size(&self) -> usize {
        self.transport.max_packet_size().saturating_sub(HEADER_SIZE)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn license(&self) -> &str {
        &self.license
    }

    /// Send a message, reporting failure as `false`.
    ///
    /// Fire and forget: nothing is retried and no acknowledgement is awaited.
    pub fn send(&mut self, data: &[u8]) -> bool {
        match self.try_send(data) {
            Ok(_) => true,
            Err(ProtocolError::LicenseMissing) => {
                warn!("{}", constants::ERR_LICENSE_MISSING);
                false
            }
            Err(e) => {
                error!(error = %e, data_length = data.len(), "Failed to send message");
                false
            }
        }
    }

    /// Send a message and return the number of packets transmitted
    #[instrument(skip_all, fields(data_length = data.len()))]
    pub fn try_send(&mut self, data: &[u8]) -> Result<usize> {
        if self.license.is_empty() {
            return Err(ProtocolError::LicenseMissing);
        }

        let _timer = Timer::start("framer_send");
        let packets = self.pack_data(data)?;
        let total_packets = packets.len();
        debug!(num_packets = total_packets, "Sending packets...");

        for packet in &packets {
            if let Err(e) = self.transport.send(packet) {
                global_metrics().transport_error();
                return Err(e);
            }
            global_metrics().packet_sent();

            // Multi-packet messages give the half-duplex receiver time to re-arm
            if total_packets > 1 && !self.config.send_delay.is_zero() {
                thread::sleep(self.config.send_delay);
            }
        }

        global_metrics().message_sent(data.len() as u64);
        debug!(num_packets = total_packets, "Successfully sent all the packets!");
        Ok(total_packets)
    }

    /// Split `data` into wire packets, consuming one message identifier
    pub fn pack_data(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        let payload_size = self.payload_size();
        if payload_size == 0 {
            return Err(ProtocolError::TransportError(
                constants::ERR_PACKET_SIZE_TOO_SMALL.to_string(),
            ));
        }

        let total = data.len().div_ceil(payload_size);
        let total = u16::try_from(total).map_err(|_| ProtocolError::OversizedMessage {
            len: data.len(),
            max_packets: usize::from(u16::MAX),
        })?;

        debug!(
            num_packets = total,
            data_length = data.len(),
            "Packing data into packets"
        );

        let identifier = self.next_identifier()?;
        let rssi = u8::try_from(self.transport.rssi().unsigned_abs()).unwrap_or(u8::MAX);

        Ok(data
            .chunks(payload_size)
            .enumerate()
            .map(|(sequence, chunk)| {
                let header = PacketHeader {
                    identifier,
                    sequence: sequence as u16,
                    total,
                    rssi,
                };
                Packet::new(header, chunk).to_bytes()
            })
            .collect())
    }

    fn next_identifier(&mut self) -> Result<u8> {
        self.message_counter.increment()?;
        self.message_counter.get()
    }

    /// Wait for one complete message.
    ///
    /// The first well-formed packet fixes the message identifier; packets
    /// from other messages are dropped. Returns `None` when `timeout`
    /// (default [`FramerConfig::listen_timeout`]) passes first, discarding any
    /// partial message.
    #[instrument(skip_all)]
    pub fn listen(&mut self, timeout: Option<Duration>) -> Option<Vec<u8>> {
        let timeout = timeout.unwrap_or(self.config.listen_timeout);
        let metrics = global_metrics();
        debug!(timeout_ms = timeout.as_millis() as u64, "Listening for data...");

        let start = Instant::now();
        let mut received: Vec<Packet> = Vec::new();

        loop {
            let elapsed = start.elapsed();
            if elapsed > timeout {
                debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    partial_packets = received.len(),
                    "Listen timeout reached"
                );
                metrics.listen_timeout();
                return None;
            }

            let raw = match self.transport.receive(timeout - elapsed) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    if !self.config.poll_interval.is_zero() {
                        thread::sleep(self.config.poll_interval.min(timeout - elapsed));
                    }
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Radio receive failed");
                    metrics.transport_error();
                    return None;
                }
            };

            let packet = match Packet::from_bytes(&raw) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(error = %e, packet_length = raw.len(), "Discarding malformed packet");
                    metrics.malformed_packet();
                    continue;
                }
            };
            metrics.packet_received();

            let header = packet.header;
            debug!(
                packet_length = raw.len(),
                identifier = header.identifier,
                sequence = header.sequence,
                total = header.total,
                rssi_dbm = header.rssi_dbm(),
                "Received packet"
            );

            if let Some(first) = received.first() {
                if first.header.identifier != header.identifier {
                    debug!(
                        expected = first.header.identifier,
                        identifier = header.identifier,
                        "Discarding packet from another message"
                    );
                    metrics.crosstalk();
                    continue;
                }
            }

            received.push(packet);

            if usize::from(header.total) == received.len() {
                debug!(received = header.total, "Received all expected packets");
                break;
            }
        }

        let data = Self::unpack_data(received);
        metrics.message_received(data.len() as u64);
        Some(data)
    }

    /// Reassemble payloads in sequence order.
    ///
    /// The sort is stable, so duplicate sequence numbers keep arrival order.
    pub fn unpack_data(mut packets: Vec<Packet>) -> Vec<u8> {
        packets.sort_by_key(|packet| packet.header.sequence);
        packets
            .into_iter()
            .flat_map(|packet| packet.payload)
            .collect()
    }

    /// Send the literal `ACK`. It carries no correlation id.
    pub fn send_acknowledgement(&mut self) -> bool {
        let sent = self.send(ACK);
        debug!(sent, "Sent acknowledgment packet");
        sent
    }
}
