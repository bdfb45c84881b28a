//! Register map held in memory.
//!
//! Serves as a stand-in chip for tests and for running the backend without
//! hardware. Word-sized block writes are stored one register per word, so
//! any word of a block reads back. Unless recording is switched off, every
//! read and write is logged so tests can assert on the exact bus traffic a
//! request produced.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{config as global_config, hex_dump};
use crate::error::SigmaDspError;
use crate::transport::{RegisterTransport, WORD_LENGTH};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportOp {
    Write { address: u16, data: Vec<u8> },
    Read { address: u16, length: usize },
}

#[derive(Debug)]
struct MemoryState {
    registers: BTreeMap<u16, Vec<u8>>,
    ops: Vec<TransportOp>,
    recording: bool,
    fail_reads: bool,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            registers: BTreeMap::new(),
            ops: Vec::new(),
            recording: true,
            fail_reads: false,
        }
    }
}

impl MemoryState {
    fn record(&mut self, op: TransportOp) {
        if self.recording {
            self.ops.push(op);
        }
    }

    fn store(&mut self, address: u16, data: &[u8]) {
        if data.len() > WORD_LENGTH && data.len() % WORD_LENGTH == 0 {
            for (i, word) in data.chunks_exact(WORD_LENGTH).enumerate() {
                self.registers
                    .insert(address.wrapping_add(i as u16), word.to_vec());
            }
        } else {
            self.registers.insert(address, data.to_vec());
        }
    }

    fn load(&self, address: u16, length: usize) -> Vec<u8> {
        let fetch = |address: u16, length: usize| {
            let mut data = self.registers.get(&address).cloned().unwrap_or_default();
            data.resize(length, 0);
            data
        };
        if length > WORD_LENGTH && length % WORD_LENGTH == 0 {
            (0..length / WORD_LENGTH)
                .flat_map(|i| fetch(address.wrapping_add(i as u16), WORD_LENGTH))
                .collect()
        } else {
            fetch(address, length)
        }
    }
}

/// Cloneable handle; all clones share the same register map.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// A recording register map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the operation log on or off. A long-running simulator turns it
    /// off so the log does not grow with every request.
    #[must_use]
    pub fn with_recording(self, recording: bool) -> Self {
        {
            let mut state = self.lock();
            state.recording = recording;
            if !recording {
                state.ops.clear();
            }
        }
        self
    }

    // a poisoned lock only means a test thread panicked; the map itself is intact
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Preload register contents without recording an operation.
    pub fn set_register(&self, address: u16, data: &[u8]) {
        self.lock().store(address, data);
    }

    /// Contents last written to `address`, if any. A word of a block write
    /// is found at its own address.
    #[must_use]
    pub fn register(&self, address: u16) -> Option<Vec<u8>> {
        self.lock().registers.get(&address).cloned()
    }

    #[must_use]
    pub fn ops(&self) -> Vec<TransportOp> {
        self.lock().ops.clone()
    }

    #[must_use]
    pub fn writes(&self) -> Vec<(u16, Vec<u8>)> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                TransportOp::Write { address, data } => Some((*address, data.clone())),
                TransportOp::Read { .. } => None,
            })
            .collect()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    /// Make subsequent reads fail like a bus fault would.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }
}

impl RegisterTransport for MemoryTransport {
    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>, SigmaDspError> {
        let mut state = self.lock();
        state.record(TransportOp::Read { address, length });
        if state.fail_reads {
            return Err(SigmaDspError::Bus(format!(
                "simulated read failure at 0x{address:04X}"
            )));
        }
        Ok(state.load(address, length))
    }

    fn write(&mut self, address: u16, data: &[u8]) {
        if global_config().log_payloads {
            log::debug!("[memory write 0x{address:04X}] {}", hex_dump(data));
        }
        let mut state = self.lock();
        state.store(address, data);
        state.record(TransportOp::Write {
            address,
            data: data.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_padded_and_truncated() {
        let mut t = MemoryTransport::new();
        t.set_register(0x10, &[1, 2, 3]);
        assert_eq!(t.read(0x10, 4).unwrap(), vec![1, 2, 3, 0]);
        assert_eq!(t.read(0x10, 2).unwrap(), vec![1, 2]);
        assert_eq!(t.read(0x99, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn clones_share_state() {
        let observer = MemoryTransport::new();
        let mut t = observer.clone();
        t.write(0x0100, &[0xAA]);
        assert_eq!(observer.register(0x0100), Some(vec![0xAA]));
        assert_eq!(observer.writes(), vec![(0x0100, vec![0xAA])]);
    }

    #[test]
    fn block_write_is_readable_word_by_word() {
        let mut t = MemoryTransport::new();
        t.write(0x0010, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(t.read(0x0011, 4).unwrap(), vec![5, 6, 7, 8]);
        assert_eq!(t.register(0x0010), Some(vec![1, 2, 3, 4]));
        assert_eq!(t.read(0x0010, 8).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        // the trailing word was never written
        assert_eq!(t.read(0x0011, 8).unwrap(), vec![5, 6, 7, 8, 0, 0, 0, 0]);
    }

    #[test]
    fn unrecorded_map_keeps_no_log() {
        let mut t = MemoryTransport::new().with_recording(false);
        for i in 0..100u16 {
            t.write(i, &[0, 0, 0, 1]);
            t.read(i, 4).unwrap();
        }
        assert!(t.ops().is_empty());
        assert_eq!(t.register(99), Some(vec![0, 0, 0, 1]));
    }

    #[test]
    fn simulated_read_failure() {
        let mut t = MemoryTransport::new();
        t.fail_reads(true);
        assert!(t.read(0, 4).is_err());
        assert_eq!(t.ops(), vec![TransportOp::Read { address: 0, length: 4 }]);
    }
}
