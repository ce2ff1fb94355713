use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub trait Bus {
    fn read_u8(&mut self, addr: u32) -> Result<u8>;
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()>;
    fn read_u16(&mut self, addr: u32) -> Result<u16>;
    fn write_u16(&mut self, addr: u32, val: u16) -> Result<()>;
}

/// Flat byte-addressed memory. Words are stored big-endian, high byte first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self { mem: vec![0; size] }
    }

    pub fn with_presets(size: usize, presets: &[(u8, u8)]) -> Self {
        let mut m = Self::new(size);
        m.apply_presets(presets);
        m
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mem
    }

    pub fn get(&self, addr: usize) -> Option<u8> {
        self.mem.get(addr).copied()
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.mem.fill(0);
    }

    pub fn apply_presets(&mut self, presets: &[(u8, u8)]) {
        for &(addr, val) in presets {
            if let Some(cell) = self.mem.get_mut(addr as usize) {
                *cell = val;
            }
        }
    }

    fn check(&self, addr: u32, width: usize) -> Result<usize> {
        let off = addr as usize;
        if off + width > self.mem.len() {
            bail!(
                "address {addr:#x} (+{width}) outside memory of {} bytes",
                self.mem.len()
            );
        }
        Ok(off)
    }
}

impl Bus for LinearMemory {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        let off = self.check(addr, 1)?;
        Ok(self.mem[off])
    }
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()> {
        let off = self.check(addr, 1)?;
        self.mem[off] = val;
        Ok(())
    }
    fn read_u16(&mut self, addr: u32) -> Result<u16> {
        let off = self.check(addr, 2)?;
        Ok(u16::from_be_bytes([self.mem[off], self.mem[off + 1]]))
    }
    fn write_u16(&mut self, addr: u32, val: u16) -> Result<()> {
        let off = self.check(addr, 2)?;
        self.mem[off..off + 2].copy_from_slice(&val.to_be_bytes());
        Ok(())
    }
}
