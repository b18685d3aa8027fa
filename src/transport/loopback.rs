//! In-memory radio.
//!
//! `LoopbackRadio` handles are cheap clones sharing one state, so a test can
//! hand one handle to a `PacketManager` and keep another to inject inbound
//! packets and inspect what was transmitted. [`LoopbackRadio::pair`] wires two
//! radios back to back, like a satellite and a ground station on one channel.

use super::{Modulation, Transport};
use crate::error::{constants, ProtocolError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::trace;

/// Default packet size of the RFM9x LoRa radio
pub const DEFAULT_MAX_PACKET_SIZE: usize = 252;

#[derive(Debug, Default)]
struct Channel {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    fail_sends: bool,
    fail_receives: bool,
    max_packet_size: usize,
    rssi: i32,
    modulation: Option<Modulation>,
}

#[derive(Debug, Clone)]
pub struct LoopbackRadio {
    channel: Arc<Mutex<Channel>>,
    peer: Option<Arc<Mutex<Channel>>>,
}

impl Default for LoopbackRadio {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKET_SIZE)
    }
}

impl LoopbackRadio {
    /// Create a radio carrying packets of at most `max_packet_size` bytes
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            channel: Arc::new(Mutex::new(Channel {
                max_packet_size,
                rssi: -70,
                ..Channel::default()
            })),
            peer: None,
        }
    }

    /// Create two radios where each one's transmissions arrive at the other
    pub fn pair(max_packet_size: usize) -> (Self, Self) {
        let mut a = Self::new(max_packet_size);
        let mut b = Self::new(max_packet_size);
        a.peer = Some(b.channel.clone());
        b.peer = Some(a.channel.clone());
        (a, b)
    }

    fn lock(&self) -> MutexGuard<'_, Channel> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a raw packet for a later `receive`
    pub fn inject(&self, packet: impl Into<Vec<u8>>) {
        self.lock().inbound.push_back(packet.into());
    }

    /// Queue several raw packets in order
    pub fn inject_all<I, P>(&self, packets: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        let mut channel = self.lock();
        channel.inbound.extend(packets.into_iter().map(Into::into));
    }

    /// Packets waiting to be received
    pub fn pending(&self) -> usize {
        self.lock().inbound.len()
    }

    /// Copy of every packet transmitted so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Drain the transmit log
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Make every subsequent `send` fail
    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Make every subsequent `receive` fail
    pub fn fail_receives(&self, fail: bool) {
        self.lock().fail_receives = fail;
    }

    pub fn set_rssi(&self, rssi: i32) {
        self.lock().rssi = rssi;
    }

    pub fn set_max_packet_size(&self, size: usize) {
        self.lock().max_packet_size = size;
    }

    pub fn set_modulation(&self, modulation: Modulation) {
        self.lock().modulation = Some(modulation);
    }
}

impl Transport for LoopbackRadio {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        let mut channel = self.lock();
        if channel.fail_sends {
            return Err(ProtocolError::TransportError(
                constants::ERR_SEND_FAILED.to_string(),
            ));
        }
        if packet.len() > channel.max_packet_size {
            return Err(ProtocolError::TransportError(format!(
                "Packet of {} bytes exceeds radio limit of {}",
                packet.len(),
                channel.max_packet_size
            )));
        }
        channel.sent.push(packet.to_vec());
        drop(channel);

        if let Some(peer) = &self.peer {
            peer.lock()
                .map_err(|_| ProtocolError::LockPoisoned)?
                .inbound
                .push_back(packet.to_vec());
        }
        trace!(packet_length = packet.len(), "Loopback transmitted packet");
        Ok(())
    }

    fn receive(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        let mut channel = self.lock();
        if channel.fail_receives {
            return Err(ProtocolError::TransportError(
                constants::ERR_RECEIVE_FAILED.to_string(),
            ));
        }
        Ok(channel.inbound.pop_front())
    }

    fn rssi(&self) -> i32 {
        self.lock().rssi
    }

    fn max_packet_size(&self) -> usize {
        self.lock().max_packet_size
    }

    fn modulation(&self) -> Modulation {
        self.lock().modulation.unwrap_or(Modulation::LoRa)
    }
}
