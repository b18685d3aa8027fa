use super::{check_index, lock, SharedNvm};
use crate::error::{ProtocolError, Result};
use std::fmt;

/// Boolean flag stored as one bit of an NVM byte
#[derive(Clone)]
pub struct Flag {
    store: SharedNvm,
    index: usize,
    bit: u8,
}

impl Flag {
    /// Bind a flag to bit `bit` (0-7) of byte `index`
    pub fn new(store: SharedNvm, index: usize, bit: u8) -> Result<Self> {
        if bit > 7 {
            return Err(ProtocolError::NvmBit(bit));
        }
        check_index(&store, index)?;
        Ok(Self { store, index, bit })
    }

    fn mask(&self) -> u8 {
        1 << self.bit
    }

    pub fn get(&self) -> Result<bool> {
        Ok(lock(&self.store)?.read(self.index)? & self.mask() != 0)
    }

    /// Set the flag when `value` is true, clear it otherwise
    pub fn toggle(&self, value: bool) -> Result<()> {
        let mut store = lock(&self.store)?;
        let byte = store.read(self.index)?;
        let updated = if value {
            byte | self.mask()
        } else {
            byte & !self.mask()
        };
        store.write(self.index, updated)
    }

    /// Name used for telemetry, e.g. `Flag_index_0_bit_3`
    pub fn name(&self) -> String {
        format!("Flag_index_{}_bit_{}", self.index, self.bit)
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("index", &self.index)
            .field("bit", &self.bit)
            .field("value", &self.get().ok())
            .finish()
    }
}
