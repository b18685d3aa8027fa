//! # Transport Layer
//!
//! The single-packet radio interface the framer is built on.
//!
//! A [`Transport`] is implemented by a radio driver: it transmits one packet,
//! receives at most one packet per call, and reports signal strength and the
//! largest packet it can carry. Everything above this trait depends only on
//! the capability, never on a concrete chip driver.
//!
//! ## Implementations
//! - **Loopback**: in-memory radio for tests, benches and ground tooling

pub mod loopback;

pub use loopback::LoopbackRadio;

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Radio modulation schemes supported by the satellite's radios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modulation {
    #[serde(rename = "LoRa")]
    LoRa,
    #[serde(rename = "FSK")]
    Fsk,
}

impl Modulation {
    /// Get the configuration name of the modulation
    pub fn name(self) -> &'static str {
        match self {
            Modulation::LoRa => "LoRa",
            Modulation::Fsk => "FSK",
        }
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modulation {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LoRa" => Ok(Modulation::LoRa),
            "FSK" => Ok(Modulation::Fsk),
            other => Err(ProtocolError::ValidationError {
                key: "modulation".to_string(),
                reason: format!("'{other}' is not one of LoRa, FSK"),
            }),
        }
    }
}

/// Single-packet radio transport.
///
/// Implementations report failures as errors; the framer converts them into
/// a logged `false` or an empty receive so they never reach the control loop.
pub trait Transport {
    /// Transmit one packet
    fn send(&mut self, packet: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one packet
    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Last observed received signal strength in dBm (normally negative)
    fn rssi(&self) -> i32;

    /// Largest packet, header included, the radio can carry.
    /// May change at runtime, e.g. after a modulation switch.
    fn max_packet_size(&self) -> usize;

    /// Modulation the radio is currently using
    fn modulation(&self) -> Modulation;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        (**self).send(packet)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        (**self).receive(timeout)
    }

    fn rssi(&self) -> i32 {
        (**self).rssi()
    }

    fn max_packet_size(&self) -> usize {
        (**self).max_packet_size()
    }

    fn modulation(&self) -> Modulation {
        (**self).modulation()
    }
}
