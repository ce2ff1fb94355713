use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Nop,
    Sta,
    Lda,
    Add,
    Or,
    And,
    Not,
    Jmp,
    Jn,
    Jz,
    Hlt,
}

impl Op {
    /// Ops that recompute N and Z from the accumulator.
    pub fn updates_flags(self) -> bool {
        matches!(self, Op::Lda | Op::Add | Op::Or | Op::And | Op::Not)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub op: Op,
    pub opcode: u8,   // raw byte as fetched, low nibble included
    pub operands: u8, // 0 or 1
    pub operand: Option<u8>,
}

impl Decoded {
    /// Bytes occupied in memory: opcode plus operands.
    pub fn width(&self) -> u8 {
        1 + self.operands
    }
}

pub trait Decoder {
    /// Resolve a fetched opcode byte. The operand, if any, is filled in by the caller.
    fn decode(&self, opcode: u8) -> Option<Decoded>;
}
