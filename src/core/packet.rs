use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// 1 byte identifier, 2 bytes sequence, 2 bytes total, 1 byte RSSI
pub const HEADER_SIZE: usize = 6;

/// Fragment header carried at the front of every radio packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    /// Message id shared by all fragments of one message, wraps mod 256
    pub identifier: u8,
    /// 0-based index of this fragment
    pub sequence: u16,
    /// Number of fragments in the message
    pub total: u16,
    /// Magnitude of the sender's last observed RSSI
    pub rssi: u8,
}

impl PacketHeader {
    /// Get the RSSI in dBm. Radios report negative values; only the magnitude is sent.
    pub fn rssi_dbm(&self) -> i16 {
        -i16::from(self.rssi)
    }

    /// Serialize to the 6-byte big-endian wire form
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u8(self.identifier);
        buf.put_u16(self.sequence);
        buf.put_u16(self.total);
        buf.put_u8(self.rssi);
        out
    }

    /// Parse the header from the front of a raw packet
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::TruncatedPacket(data.len()));
        }
        let mut buf = &data[..HEADER_SIZE];
        Ok(Self {
            identifier: buf.get_u8(),
            sequence: buf.get_u16(),
            total: buf.get_u16(),
            rssi: buf.get_u8(),
        })
    }
}

/// One radio packet: header plus payload slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(header: PacketHeader, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// Serialize header and payload into radio bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_slice(&self.header.to_bytes());
        buf.put_slice(&self.payload);
        buf.to_vec()
    }

    /// Parse radio bytes. Anything after the header is payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = PacketHeader::from_bytes(data)?;
        Ok(Self {
            header,
            payload: data[HEADER_SIZE..].to_vec(),
        })
    }

    /// Total size on the wire
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}
