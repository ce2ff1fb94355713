use crate::decoder::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrDesc {
    pub op: Op,
    pub mnemonic: &'static str,
    pub opcode: u8,
    pub operands: u8,
}

/// Fixed catalog of one machine variant. Read-only after construction.
#[derive(Debug, Clone, Copy)]
pub struct InstructionTable {
    entries: &'static [InstrDesc],
    opcode_mask: u8,
}

impl InstructionTable {
    pub const fn new(entries: &'static [InstrDesc], opcode_mask: u8) -> Self {
        Self { entries, opcode_mask }
    }

    pub fn entries(&self) -> &'static [InstrDesc] {
        self.entries
    }

    /// Match on the masked bits only, so unused low bits may hold anything.
    pub fn lookup_by_opcode(&self, opcode: u8) -> Option<&'static InstrDesc> {
        let key = opcode & self.opcode_mask;
        self.entries.iter().find(|d| d.opcode == key)
    }

    pub fn lookup_by_mnemonic(&self, mnemonic: &str) -> Option<&'static InstrDesc> {
        self.entries
            .iter()
            .find(|d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
    }

    pub fn is_mnemonic(&self, word: &str) -> bool {
        self.lookup_by_mnemonic(word).is_some()
    }
}
