use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::asm::{Assembler, Diagnostic, SymbolTable};
use crate::cpu::{Cpu, CpuConfig, State, Trap, FLAG_NAMES, REGISTER_NAMES};
use crate::decoder::{Decoded, Decoder};
use crate::exec::NeanderExecutor;
use crate::image::{self, ImageError};
use crate::instructions::InstructionTable;
use crate::isa::neander::{self, NeanderDecoder};
use crate::memory::LinearMemory;

/// Result of `assemble` as seen by a front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub symbols: SymbolTable,
}

/// Called once per diagnostic, in source line order.
pub type BuildErrorSink = Box<dyn FnMut(&Diagnostic)>;

/// The baseline machine: AC, PC, N, Z and 256 bytes of memory.
pub struct Neander {
    pub cpu: Cpu,
    pub mem: LinearMemory,
    dec: NeanderDecoder,
    exec: NeanderExecutor,
    on_build_error: Option<BuildErrorSink>,
}

impl fmt::Debug for Neander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neander")
            .field("cpu", &self.cpu)
            .field("mem", &self.mem)
            .finish_non_exhaustive()
    }
}

impl Neander {
    pub fn new(cfg: CpuConfig) -> Self {
        let mut m = Self {
            cpu: Cpu::new(cfg),
            mem: LinearMemory::new(neander::MEM_SIZE),
            dec: NeanderDecoder::new(),
            exec: NeanderExecutor,
            on_build_error: None,
        };
        m.clear_memory();
        m
    }

    pub fn table(&self) -> &InstructionTable {
        self.dec.table()
    }

    fn presets(&self) -> &'static [(u8, u8)] {
        if self.cpu.cfg.preset_cells {
            neander::PRESETS
        } else {
            &[]
        }
    }

    pub fn step(&mut self) -> Result<State, Trap> {
        self.cpu.step(&mut self.mem, &self.dec, &self.exec)
    }

    /// Step until halted. There is no iteration limit.
    pub fn run(&mut self) -> Result<(), Trap> {
        while self.step()? == State::Running {}
        Ok(())
    }

    /// Assemble into a staging image and swap it in only if it built cleanly.
    pub fn assemble(&mut self, src: &str) -> BuildReport {
        let assembly = Assembler::new(self.dec.table(), neander::MEM_SIZE)
            .with_presets(self.presets())
            .assemble(src);
        for d in &assembly.diagnostics {
            warn!(line = d.line, "{}", d.error);
            if let Some(sink) = self.on_build_error.as_mut() {
                sink(d);
            }
        }
        let success = assembly.success();
        if success {
            self.mem = assembly.image;
            info!(labels = assembly.symbols.len(), "build successful");
        }
        BuildReport {
            success,
            diagnostics: assembly.diagnostics,
            symbols: assembly.symbols,
        }
    }

    pub fn set_build_error_sink(&mut self, sink: BuildErrorSink) {
        self.on_build_error = Some(sink);
    }

    pub fn clear_memory(&mut self) {
        self.mem.clear();
        let presets = self.presets();
        self.mem.apply_presets(presets);
    }

    pub fn clear_registers(&mut self) {
        self.cpu.reset(0);
    }

    pub fn load(&mut self, path: &Path) -> Result<usize, ImageError> {
        image::load(path, &neander::MAGIC, &mut self.mem)
    }

    pub fn save(&self, path: &Path) -> Result<(), ImageError> {
        image::save(path, &neander::MAGIC, &self.mem)
    }

    /// Decode the instruction stored at `addr`, operand included, for display.
    pub fn instruction_at(&self, addr: u8) -> Option<Decoded> {
        let mut d = self.dec.decode(self.mem.get(addr as usize)?)?;
        if d.operands == 1 {
            d.operand = self.mem.get(addr.wrapping_add(1) as usize);
        }
        Some(d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum MachineKind {
    Neander,
}

impl MachineKind {
    pub fn name(self) -> &'static str {
        match self {
            MachineKind::Neander => "Neander",
        }
    }

    pub fn magic(self) -> [u8; 4] {
        match self {
            MachineKind::Neander => neander::MAGIC,
        }
    }
}

/// A machine selected once per session. Every variant offers the same operations.
#[derive(Debug)]
pub enum Machine {
    Neander(Neander),
}

impl Machine {
    pub fn new(kind: MachineKind, cfg: CpuConfig) -> Self {
        match kind {
            MachineKind::Neander => Machine::Neander(Neander::new(cfg)),
        }
    }

    pub fn kind(&self) -> MachineKind {
        match self {
            Machine::Neander(_) => MachineKind::Neander,
        }
    }

    fn cpu(&self) -> &Cpu {
        match self {
            Machine::Neander(m) => &m.cpu,
        }
    }

    pub fn memory(&self) -> &LinearMemory {
        match self {
            Machine::Neander(m) => &m.mem,
        }
    }

    pub fn table(&self) -> &InstructionTable {
        match self {
            Machine::Neander(m) => m.table(),
        }
    }

    pub fn step(&mut self) -> Result<State, Trap> {
        match self {
            Machine::Neander(m) => m.step(),
        }
    }

    pub fn run(&mut self) -> Result<(), Trap> {
        match self {
            Machine::Neander(m) => m.run(),
        }
    }

    pub fn assemble(&mut self, src: &str) -> BuildReport {
        match self {
            Machine::Neander(m) => m.assemble(src),
        }
    }

    pub fn set_build_error_sink(&mut self, sink: BuildErrorSink) {
        match self {
            Machine::Neander(m) => m.set_build_error_sink(sink),
        }
    }

    pub fn clear_memory(&mut self) {
        match self {
            Machine::Neander(m) => m.clear_memory(),
        }
    }

    pub fn clear_registers(&mut self) {
        match self {
            Machine::Neander(m) => m.clear_registers(),
        }
    }

    pub fn load(&mut self, path: &Path) -> Result<usize, ImageError> {
        match self {
            Machine::Neander(m) => m.load(path),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ImageError> {
        match self {
            Machine::Neander(m) => m.save(path),
        }
    }

    pub fn instruction_at(&self, addr: u8) -> Option<Decoded> {
        match self {
            Machine::Neander(m) => m.instruction_at(addr),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.cpu().is_halted()
    }

    pub fn pc(&self) -> u8 {
        self.cpu().pc
    }

    pub fn set_pc(&mut self, pc: u8) {
        match self {
            Machine::Neander(m) => m.cpu.pc = pc,
        }
    }

    pub fn register_count(&self) -> usize {
        REGISTER_NAMES.len()
    }

    pub fn register_name(&self, index: usize) -> Option<&'static str> {
        REGISTER_NAMES.get(index).copied()
    }

    pub fn register_value(&self, index: usize) -> Option<u8> {
        self.cpu().register(index)
    }

    pub fn flag_count(&self) -> usize {
        FLAG_NAMES.len()
    }

    pub fn flag_name(&self, index: usize) -> Option<&'static str> {
        FLAG_NAMES.get(index).copied()
    }

    pub fn flag_value(&self, index: usize) -> Option<bool> {
        self.cpu().flag(index)
    }

    pub fn memory_size(&self) -> usize {
        self.memory().len()
    }

    pub fn memory_value(&self, addr: usize) -> Option<u8> {
        self.memory().get(addr)
    }

    /// Poke a cell directly, as a memory editor would. Returns false when out of range.
    pub fn set_memory_value(&mut self, addr: usize, value: u8) -> bool {
        let mem = match self {
            Machine::Neander(m) => &mut m.mem,
        };
        match mem.mem.get_mut(addr) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }
}
