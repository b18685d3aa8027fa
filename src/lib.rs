//! # cubesat-link
//!
//! Radio protocol stack for small-satellite flight software.
//!
//! The crate turns application data (telemetry beacons, ground commands) into
//! fixed-size over-the-air packets, reassembles incoming fragments, and
//! authenticates and dispatches remote commands.
//!
//! ## Layers
//! - **Binary codec** ([`core::codec`]): compact self-describing telemetry records
//! - **Packet framer** ([`protocol::framer`]): fragmentation and reassembly over a
//!   single-packet [`transport::Transport`]
//! - **Command protocol** ([`protocol::command`]): authenticated command dispatch
//!   layered on the framer
//!
//! Supporting modules provide NVM-backed counters and flags ([`nvm`]), validated
//! configuration ([`config`]), the telemetry beacon ([`beacon`]), and logging and
//! metrics helpers ([`utils`]).
//!
//! ## Example
//! ```rust
//! use cubesat_link::config::FramerConfig;
//! use cubesat_link::nvm::{self, Counter, MemoryNvm};
//! use cubesat_link::protocol::framer::PacketManager;
//! use cubesat_link::transport::LoopbackRadio;
//!
//! # fn main() -> cubesat_link::error::Result<()> {
//! let store = nvm::shared(MemoryNvm::new(16));
//! let counter = Counter::new(store, 0)?;
//! let radio = LoopbackRadio::new(32);
//!
//! let config = FramerConfig::immediate();
//! let mut manager = PacketManager::new(radio.clone(), "KK4XYZ", counter, config);
//! assert!(manager.send(b"Hello world! This message spans several packets."));
//! assert_eq!(radio.sent().len(), 2);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod beacon;
pub mod config;
pub mod core;
pub mod error;
pub mod nvm;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::codec::{BinaryDecoder, BinaryEncoder, Value};
pub use crate::core::packet::{Packet, PacketHeader};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::command::CommandDataHandler;
pub use crate::protocol::framer::PacketManager;
pub use crate::transport::Transport;
