pub mod asm;
pub mod cpu;
pub mod decoder;
pub mod disasm;
pub mod exec;
pub mod image;
pub mod instructions;
pub mod machine;
pub mod memory;

pub mod isa {
    pub mod neander; // baseline 8-bit accumulator machine
}

pub use asm::{Assembler, Assembly, AsmError, Diagnostic};
pub use cpu::{Cpu, CpuConfig, Flags, State, Trap};
pub use image::ImageError;
pub use machine::{BuildReport, Machine, MachineKind, Neander};
pub use memory::{Bus, LinearMemory};
