use anyhow::Error;
use crate::decoder::{Decoded, Decoder};
use crate::exec::Executor;
use crate::memory::Bus;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuConfig {
    pub preset_cells: bool,    // write the 128..130 defaults on a fresh/cleared memory
    pub halt_on_pc_wrap: bool, // stop when PC rolls over past the last cell
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            preset_cells: true,
            halt_on_pc_wrap: true,
        }
    }
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags: u8 {
const N = 1 << 0; // Negative: accumulator high bit set
const Z = 1 << 1; // Zero
}
}

impl Flags {
    /// Largest accumulator value still read as positive.
    pub const MAX_POSITIVE: u8 = 0x7F;

    pub fn from_acc(ac: u8) -> Self {
        let mut f = Flags::empty();
        f.set(Flags::N, ac > Self::MAX_POSITIVE);
        f.set(Flags::Z, ac == 0);
        f
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Running,
    Halted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub pc: u8,       // Program Counter
    pub ac: u8,       // Accumulator
    pub flags: Flags, // N, Z
    pub state: State,
    pub cfg: CpuConfig,
}

#[derive(thiserror::Error, Debug)]
pub enum Trap {
    #[error("no instruction matches opcode {opcode:#04x} at {pc}")]
    DecodeFault { pc: u8, opcode: u8 },
    #[error("Bus error at {addr:#06x}: {source}")]
    Bus { addr: u32, #[source] source: Error },
}

pub const REGISTER_NAMES: [&str; 2] = ["AC", "PC"];
pub const FLAG_NAMES: [&str; 2] = ["N", "Z"];

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        Self {
            pc: 0,
            ac: 0,
            flags: Flags::Z,
            state: State::Halted,
            cfg,
        }
    }

    /// Zero the accumulator, put PC at `reset_pc`, and reset flags to match AC = 0.
    pub fn reset(&mut self, reset_pc: u8) {
        self.pc = reset_pc;
        self.ac = 0;
        self.flags = Flags::Z;
        self.state = State::Halted;
    }

    pub fn set_acc(&mut self, value: u8) {
        self.ac = value;
        self.flags = Flags::from_acc(value);
    }

    pub fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    pub fn halt(&mut self) {
        self.state = State::Halted;
    }

    pub fn register(&self, index: usize) -> Option<u8> {
        match index {
            0 => Some(self.ac),
            1 => Some(self.pc),
            _ => None,
        }
    }

    pub fn flag(&self, index: usize) -> Option<bool> {
        match index {
            0 => Some(self.flags.contains(Flags::N)),
            1 => Some(self.flags.contains(Flags::Z)),
            _ => None,
        }
    }

    pub fn step<B: Bus, D: Decoder, X: Executor>(
        &mut self,
        bus: &mut B,
        dec: &D,
        exec: &X,
    ) -> Result<State, Trap> {
        self.state = State::Running;
        let pc = self.pc;
        let fetched = self.fetch(bus, dec, pc);
        let d = match fetched {
            Ok(d) => d,
            Err(trap) => {
                self.state = State::Halted;
                return Err(trap);
            }
        };
        let next = pc.wrapping_add(d.width());
        self.pc = next;
        trace!(pc, opcode = d.opcode, operand = ?d.operand, op = ?d.op, "exec");
        if let Err(trap) = exec.exec(self, bus, d) {
            self.state = State::Halted;
            return Err(trap);
        }
        if next == 0 && self.cfg.halt_on_pc_wrap && self.state == State::Running {
            warn!(pc, "program counter wrapped past the end of memory, halting");
            self.state = State::Halted;
        }
        Ok(self.state)
    }

    fn fetch<B: Bus, D: Decoder>(&self, bus: &mut B, dec: &D, pc: u8) -> Result<Decoded, Trap> {
        let addr = u32::from(pc);
        let opcode = bus
            .read_u8(addr)
            .map_err(|source| Trap::Bus { addr, source })?;
        let mut d = dec.decode(opcode).ok_or(Trap::DecodeFault { pc, opcode })?;
        if d.operands == 1 {
            // operand is read as a value; the executor resolves it against memory itself
            let addr = u32::from(pc.wrapping_add(1));
            let operand = bus
                .read_u8(addr)
                .map_err(|source| Trap::Bus { addr, source })?;
            d.operand = Some(operand);
        }
        Ok(d)
    }
}
