//! # Error Types
//!
//! Error handling for the radio protocol stack.
//!
//! This module defines all error variants that can occur while encoding
//! telemetry, framing packets, talking to the radio, and processing commands.
//!
//! ## Error Categories
//! - **Encoding Errors**: Oversized strings, unsupported or overflowing integers
//! - **Packet Errors**: Truncated headers, messages too long to frame
//! - **Transport Errors**: Failures reported by the radio driver
//! - **Command Errors**: Malformed envelopes and unknown commands
//! - **Configuration Errors**: Load failures and schema violations
//! - **NVM Errors**: Out-of-range counter or flag locations
//! - **Sensor Errors**: Failed telemetry reads, logged and skipped by the beacon
//!
//! Decoding anomalies (truncated blobs, unknown type ids) are *not* errors;
//! the decoder treats them as end of stream.
//!
//! ## Example Usage
//! ```rust
//! use cubesat_link::core::codec::BinaryEncoder;
//! use cubesat_link::error::ProtocolError;
//!
//! let mut encoder = BinaryEncoder::new();
//! let long = "x".repeat(300);
//! match encoder.add_string("callsign", &long, None) {
//!     Err(ProtocolError::StringTooLong { len, max }) => assert_eq!((len, max), (300, 255)),
//!     other => panic!("unexpected result: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framer errors
    pub const ERR_LICENSE_MISSING: &str = "License is required to send data";
    pub const ERR_PACKET_SIZE_TOO_SMALL: &str =
        "Transport max packet size leaves no room for a payload";

    /// Transport errors
    pub const ERR_SEND_FAILED: &str = "Radio failed to transmit packet";
    pub const ERR_RECEIVE_FAILED: &str = "Radio failed to receive packet";

    /// Command errors
    pub const ERR_NOT_UTF8: &str = "Command message is not valid UTF-8";
    pub const ERR_NOT_OBJECT: &str = "Command message is not a JSON object";
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("String too long: {len} > {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("Unsupported integer size: {0}")]
    UnsupportedIntSize(u8),

    #[error("Integer {value} does not fit in {size} byte(s)")]
    IntOutOfRange { value: i128, size: u8 },

    #[error("Packet too short: {0} bytes")]
    TruncatedPacket(usize),

    #[error("Message too large: {len} bytes needs more than {max_packets} packets")]
    OversizedMessage { len: usize, max_packets: usize },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("License is required to send data")]
    LicenseMissing,

    #[error("Invalid command message: {0}")]
    InvalidCommand(String),

    #[error("Unknown command received: {0}")]
    UnknownCommand(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid value for '{key}': {reason}")]
    ValidationError { key: String, reason: String },

    #[error("NVM index {index} out of range (size {len})")]
    NvmIndex { index: usize, len: usize },

    #[error("NVM bit index {0} out of range (0-7)")]
    NvmBit(u8),

    #[error("Sensor reading failed: {0}")]
    SensorError(String),

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
