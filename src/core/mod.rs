//! # Core Protocol Components
//!
//! Low-level wire formats: the telemetry record codec and the radio packet header.
//!
//! ## Components
//! - **Codec**: self-describing `(key_hash, type_id, payload)` records for telemetry
//! - **Packet**: 6-byte fragment header plus payload slice
//!
//! ## Wire Formats
//! ```text
//! Record: [KeyHash(4)] [TypeId(1)] [Payload(N)]
//! Packet: [Identifier(1)] [Sequence(2)] [Total(2)] [Rssi(1)] [Payload(N)]
//! ```
//!
//! All multi-byte fields are big-endian. Blobs carry no framing of their own;
//! decoders parse until the input is exhausted or a record is malformed.

pub mod codec;
pub mod packet;
