use crate::decoder::{Decoded, Decoder, Op};
use crate::instructions::{InstrDesc, InstructionTable};

pub const MEM_SIZE: usize = 256;

/// Image file header: format byte then "NDR".
pub const MAGIC: [u8; 4] = [0x03, b'N', b'D', b'R'];

/// Cells written on a fresh machine (address, value). Lets the stock
/// `lda 128 / add 129 / sta 130` example run without any `db` lines.
pub const PRESETS: &[(u8, u8)] = &[(128, 4), (129, 8), (130, 2)];

/// Only the high nibble selects the instruction.
pub const OPCODE_MASK: u8 = 0xF0;

const fn desc(op: Op, mnemonic: &'static str, opcode: u8, operands: u8) -> InstrDesc {
    InstrDesc { op, mnemonic, opcode, operands }
}

pub const TABLE: &[InstrDesc] = &[
    desc(Op::Nop, "nop", 0x00, 0),
    desc(Op::Sta, "sta", 0x10, 1),
    desc(Op::Lda, "lda", 0x20, 1),
    desc(Op::Add, "add", 0x30, 1),
    desc(Op::Or, "or", 0x40, 1),
    desc(Op::And, "and", 0x50, 1),
    desc(Op::Not, "not", 0x60, 0),
    desc(Op::Jmp, "jmp", 0x80, 1),
    desc(Op::Jn, "jn", 0x90, 1),
    desc(Op::Jz, "jz", 0xA0, 1),
    desc(Op::Hlt, "hlt", 0xF0, 0),
];

/// Neander instruction decoder over the fixed catalog above.
#[derive(Debug, Clone, Copy)]
pub struct NeanderDecoder {
    table: InstructionTable,
}

impl NeanderDecoder {
    pub const fn new() -> Self {
        Self {
            table: InstructionTable::new(TABLE, OPCODE_MASK),
        }
    }

    pub fn table(&self) -> &InstructionTable {
        &self.table
    }
}

impl Default for NeanderDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NeanderDecoder {
    fn decode(&self, opcode: u8) -> Option<Decoded> {
        self.table.lookup_by_opcode(opcode).map(|d| Decoded {
            op: d.op,
            opcode,
            operands: d.operands,
            operand: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ignores_low_nibble() {
        let dec = NeanderDecoder::new();
        let d = dec.decode(0x2F).unwrap();
        assert_eq!(d.op, Op::Lda);
        assert_eq!(d.opcode, 0x2F);
        assert_eq!(d.width(), 2);
        assert!(dec.decode(0x70).is_none());
        assert!(dec.decode(0xB3).is_none());
    }

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        let dec = NeanderDecoder::new();
        let t = dec.table();
        assert_eq!(t.entries().len(), 11);
        assert_eq!(t.lookup_by_mnemonic("HLT").map(|d| d.opcode), Some(0xF0));
        assert_eq!(t.lookup_by_mnemonic("Jz").map(|d| d.operands), Some(1));
        assert!(t.lookup_by_mnemonic("sub").is_none());
        assert!(t.lookup_by_mnemonic("jmpx").is_none());
    }
}
