//! # Non-Volatile Memory
//!
//! Byte-addressable persistent storage and the small state cells kept in it.
//!
//! The store is an explicit handle ([`SharedNvm`]) created once at boot and
//! passed to every component that needs it; there is no global store.
//!
//! ## Components
//! - **NvmStore**: trait over a persistent byte array (implemented by the board's NVM)
//! - **MemoryNvm**: RAM-backed store for tests and ground tooling
//! - **Counter**: 8-bit counter with rollover, e.g. the outbound message identifier
//! - **Flag**: single bit within a byte, e.g. boot or burn-wire state

mod counter;
mod flag;

pub use counter::Counter;
pub use flag::Flag;

use crate::error::{ProtocolError, Result};
use std::sync::{Arc, Mutex, MutexGuard};

/// Persistent byte-addressable store
pub trait NvmStore: Send {
    /// Number of addressable bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the byte at `index`
    fn read(&self, index: usize) -> Result<u8>;

    /// Write the byte at `index`
    fn write(&mut self, index: usize, value: u8) -> Result<()>;
}

/// Shared handle to the board's NVM
pub type SharedNvm = Arc<Mutex<dyn NvmStore>>;

/// Wrap a store into a shareable handle
pub fn shared<S: NvmStore + 'static>(store: S) -> SharedNvm {
    Arc::new(Mutex::new(store))
}

pub(crate) fn lock(store: &SharedNvm) -> Result<MutexGuard<'_, dyn NvmStore + 'static>> {
    store.lock().map_err(|_| ProtocolError::LockPoisoned)
}

pub(crate) fn check_index(store: &SharedNvm, index: usize) -> Result<()> {
    let len = lock(store)?.len();
    if index < len {
        Ok(())
    } else {
        Err(ProtocolError::NvmIndex { index, len })
    }
}

/// RAM-backed NVM. Contents are lost when dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryNvm {
    bytes: Vec<u8>,
}

impl MemoryNvm {
    /// Create a zero-filled store of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Create a store from an existing image
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl NvmStore for MemoryNvm {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, index: usize) -> Result<u8> {
        self.bytes
            .get(index)
            .copied()
            .ok_or(ProtocolError::NvmIndex {
                index,
                len: self.bytes.len(),
            })
    }

    fn write(&mut self, index: usize, value: u8) -> Result<()> {
        let len = self.bytes.len();
        let slot = self
            .bytes
            .get_mut(index)
            .ok_or(ProtocolError::NvmIndex { index, len })?;
        *slot = value;
        Ok(())
    }
}
