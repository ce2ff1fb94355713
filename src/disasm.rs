use serde::Serialize;

use crate::decoder::{Decoded, Decoder, Op};

pub fn mnemonic(op: Op) -> &'static str {
    match op {
        Op::Nop => "nop",
        Op::Sta => "sta",
        Op::Lda => "lda",
        Op::Add => "add",
        Op::Or => "or",
        Op::And => "and",
        Op::Not => "not",
        Op::Jmp => "jmp",
        Op::Jn => "jn",
        Op::Jz => "jz",
        Op::Hlt => "hlt",
    }
}

pub fn fmt_decoded(d: &Decoded) -> String {
    match d.operand {
        Some(op) => format!("{} {}", mnemonic(d.op), op),
        None if d.operands > 0 => format!("{} ?", mnemonic(d.op)),
        None => mnemonic(d.op).to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingLine {
    pub addr: usize,
    pub bytes: Vec<u8>,
    pub text: String,
}

/// Linear sweep from address 0. Bytes that decode to an instruction swallow
/// their operand; anything else is listed as raw data.
pub fn listing<D: Decoder>(mem: &[u8], dec: &D) -> Vec<ListingLine> {
    let mut out = Vec::new();
    let mut addr = 0usize;
    while addr < mem.len() {
        let byte = mem[addr];
        match dec.decode(byte) {
            Some(mut d) if addr + d.width() as usize <= mem.len() => {
                let w = d.width() as usize;
                if d.operands == 1 {
                    d.operand = Some(mem[addr + 1]);
                }
                out.push(ListingLine {
                    addr,
                    bytes: mem[addr..addr + w].to_vec(),
                    text: fmt_decoded(&d),
                });
                addr += w;
            }
            _ => {
                out.push(ListingLine {
                    addr,
                    bytes: vec![byte],
                    text: format!("db {byte}"),
                });
                addr += 1;
            }
        }
    }
    out
}
