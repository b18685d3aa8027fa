use super::{check_index, lock, SharedNvm};
use crate::error::Result;
use std::fmt;

/// 8-bit counter stored in one NVM byte, rolling over from 255 to 0.
///
/// Not safe for interleaved use by several owners: `increment` is a
/// read-modify-write and only the store lock, not the counter, is held.
#[derive(Clone)]
pub struct Counter {
    store: SharedNvm,
    index: usize,
}

impl Counter {
    /// Bind a counter to byte `index` of `store`
    pub fn new(store: SharedNvm, index: usize) -> Result<Self> {
        check_index(&store, index)?;
        Ok(Self { store, index })
    }

    /// Get the current value
    pub fn get(&self) -> Result<u8> {
        lock(&self.store)?.read(self.index)
    }

    /// Add one, wrapping 255 to 0
    pub fn increment(&self) -> Result<()> {
        let mut store = lock(&self.store)?;
        let value = store.read(self.index)?.wrapping_add(1);
        store.write(self.index, value)
    }

    /// Overwrite the value
    pub fn set(&self, value: u8) -> Result<()> {
        lock(&self.store)?.write(self.index, value)
    }

    /// Name used for telemetry, e.g. `Counter_index_3`
    pub fn name(&self) -> String {
        format!("Counter_index_{}", self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("index", &self.index)
            .field("value", &self.get().ok())
            .finish()
    }
}
