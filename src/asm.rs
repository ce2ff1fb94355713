//! Two-pass assembler for accumulator machines.
//!
//! Source is line oriented: `;` starts a comment, a leading `name:` defines a
//! label, and everything is case-insensitive. Pass 1 sizes every line and
//! records label addresses; pass 2 encodes into a fresh staging image. Label
//! references stay symbolic tokens until pass 2 looks them up, so a label can
//! never be confused with part of another word.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::instructions::{InstrDesc, InstructionTable};
use crate::memory::{Bus, LinearMemory};

pub const DIRECTIVES: &[&str] = &["org", "db", "dw", "dab", "daw"];

/// Label name (lowercase) to resolved address.
pub type SymbolTable = BTreeMap<String, u32>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),
    #[error("malformed `{directive}` argument `{arg}`")]
    MalformedDirective { directive: &'static str, arg: String },
    #[error("value {value} out of range {min}..={max}")]
    NumberOutOfRange { value: i64, min: i64, max: i64 },
    #[error("`{0}` is neither a number nor a label")]
    InvalidNumber(String),
    #[error("undefined label `{0}`")]
    UndefinedLabel(String),
    #[error("label `{name}` already defined on line {first_line}")]
    DuplicateLabel { name: String, first_line: usize },
    #[error("`{0}` cannot be used as a label name")]
    ReservedLabel(String),
    #[error("`{mnemonic}` takes {expected} operand(s), found {found}")]
    OperandCount { mnemonic: &'static str, expected: u8, found: usize },
    #[error("emitting at address {addr} runs past the end of memory")]
    MemoryOverflow { addr: u32 },
}

/// One assembly error tied to its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub error: AsmError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Number(i64),
    Symbol(String),
}

#[derive(Debug, Clone)]
enum Item {
    Org(Operand),
    Byte(Operand),
    Word(Operand),
    Bytes { count: u32, value: i64 },
    Words { count: u32, value: i64 },
    Instr { desc: &'static InstrDesc, operand: Option<Operand> },
}

/// Encoded payload of one line. Words go through the bus big-endian.
#[derive(Debug, Clone)]
enum Encoded {
    Bytes(Vec<u8>),
    Words(Vec<u16>),
}

#[derive(Debug, Clone)]
struct Line {
    no: usize,
    label: Option<String>,
    item: Option<Item>,
}

/// Output of one assembly run. The image is only meaningful when `success()`.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub image: LinearMemory,
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

impl Assembly {
    pub fn success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

pub struct Assembler<'t> {
    table: &'t InstructionTable,
    mem_size: usize,
    presets: &'t [(u8, u8)],
}

impl<'t> Assembler<'t> {
    pub fn new(table: &'t InstructionTable, mem_size: usize) -> Self {
        Self {
            table,
            mem_size,
            presets: &[],
        }
    }

    /// Cells written into every staging image before encoding starts.
    pub fn with_presets(mut self, presets: &'t [(u8, u8)]) -> Self {
        self.presets = presets;
        self
    }

    pub fn assemble(&self, src: &str) -> Assembly {
        let mut diags = Vec::new();
        let lines = self.parse(src, &mut diags);
        let symbols = self.first_pass(&lines, &mut diags);
        debug!(lines = lines.len(), labels = symbols.len(), "pass 1 done");
        let image = self.second_pass(&lines, &symbols, &mut diags);
        debug!(errors = diags.len(), "pass 2 done");
        diags.sort_by_key(|d| d.line);
        Assembly {
            image,
            symbols,
            diagnostics: diags,
        }
    }

    fn parse(&self, src: &str, diags: &mut Vec<Diagnostic>) -> Vec<Line> {
        let mut out = Vec::new();
        for (i, raw) in src.lines().enumerate() {
            let no = i + 1;
            let code = raw.split(';').next().unwrap_or("").to_lowercase();
            let mut tokens: Vec<&str> = code.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            let mut label = None;
            let first = tokens[0];
            if let Some((name, rest)) = first.split_once(':') {
                let name = name.to_string();
                if rest.is_empty() {
                    tokens.remove(0);
                } else {
                    tokens[0] = rest;
                }
                label = Some(name);
            }
            let item = if tokens.is_empty() {
                None
            } else {
                match self.parse_item(&tokens) {
                    Ok(item) => Some(item),
                    Err(error) => {
                        diags.push(Diagnostic { line: no, error });
                        None
                    }
                }
            };
            out.push(Line { no, label, item });
        }
        out
    }

    fn parse_item(&self, tokens: &[&str]) -> Result<Item, AsmError> {
        let head = tokens[0];
        let args = &tokens[1..];
        match head {
            "org" => Ok(Item::Org(single_arg("org", args)?)),
            "db" => Ok(Item::Byte(single_arg("db", args)?)),
            "dw" => Ok(Item::Word(single_arg("dw", args)?)),
            "dab" => {
                let (count, value) = repeat_arg("dab", args)?;
                Ok(Item::Bytes { count, value })
            }
            "daw" => {
                let (count, value) = repeat_arg("daw", args)?;
                Ok(Item::Words { count, value })
            }
            mnemonic => {
                let desc = self
                    .table
                    .lookup_by_mnemonic(mnemonic)
                    .ok_or_else(|| AsmError::UnknownMnemonic(mnemonic.to_string()))?;
                if args.len() != desc.operands as usize {
                    return Err(AsmError::OperandCount {
                        mnemonic: desc.mnemonic,
                        expected: desc.operands,
                        found: args.len(),
                    });
                }
                let operand = args.first().map(|t| parse_operand(t)).transpose()?;
                Ok(Item::Instr { desc, operand })
            }
        }
    }

    fn check_label(&self, name: &str) -> Result<(), AsmError> {
        let valid = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(is_ident_char);
        if !valid || self.table.is_mnemonic(name) || DIRECTIVES.contains(&name) {
            return Err(AsmError::ReservedLabel(name.to_string()));
        }
        Ok(())
    }

    fn first_pass(&self, lines: &[Line], diags: &mut Vec<Diagnostic>) -> SymbolTable {
        let mut symbols = SymbolTable::new();
        let mut defined_on: BTreeMap<String, usize> = BTreeMap::new();
        let mut cursor: u32 = 0;
        for line in lines {
            if let Some(name) = &line.label {
                if let Err(error) = self.check_label(name) {
                    diags.push(Diagnostic { line: line.no, error });
                } else if let Some(&first_line) = defined_on.get(name) {
                    diags.push(Diagnostic {
                        line: line.no,
                        error: AsmError::DuplicateLabel { name: name.clone(), first_line },
                    });
                } else {
                    defined_on.insert(name.clone(), line.no);
                    symbols.insert(name.clone(), cursor);
                }
            }
            let Some(item) = &line.item else { continue };
            match item {
                Item::Org(target) => match self.resolve_addr(target, &symbols) {
                    Ok(addr) => cursor = addr,
                    Err(error) => diags.push(Diagnostic { line: line.no, error }),
                },
                _ => cursor = cursor.saturating_add(item_width(item)),
            }
        }
        symbols
    }

    fn second_pass(
        &self,
        lines: &[Line],
        symbols: &SymbolTable,
        diags: &mut Vec<Diagnostic>,
    ) -> LinearMemory {
        let mut image = LinearMemory::with_presets(self.mem_size, self.presets);
        let mut cursor: u32 = 0;
        for line in lines {
            let Some(item) = &line.item else { continue };
            // a bad org was already reported in pass 1
            if let Item::Org(target) = item {
                if let Ok(addr) = self.resolve_addr(target, symbols) {
                    cursor = addr;
                }
                continue;
            }
            let width = item_width(item);
            let at = cursor;
            cursor = cursor.saturating_add(width);
            if u64::from(at) + u64::from(width) > image.len() as u64 {
                diags.push(Diagnostic {
                    line: line.no,
                    error: AsmError::MemoryOverflow { addr: at },
                });
                continue;
            }
            let encoded = match item {
                Item::Org(_) => continue,
                Item::Byte(v) => self
                    .resolve(v, symbols)
                    .and_then(to_byte)
                    .map(|b| Encoded::Bytes(vec![b])),
                Item::Word(v) => self
                    .resolve(v, symbols)
                    .and_then(to_word)
                    .map(|w| Encoded::Words(vec![w])),
                Item::Bytes { count, value } => {
                    to_byte(*value).map(|b| Encoded::Bytes(vec![b; *count as usize]))
                }
                Item::Words { count, value } => {
                    to_word(*value).map(|w| Encoded::Words(vec![w; *count as usize]))
                }
                Item::Instr { desc, operand } => match operand {
                    Some(op) => self
                        .resolve_addr(op, symbols)
                        .map(|a| Encoded::Bytes(vec![desc.opcode, a as u8])),
                    None => Ok(Encoded::Bytes(vec![desc.opcode])),
                },
            };
            if let Err(error) = encoded.and_then(|e| emit(&mut image, at, &e)) {
                diags.push(Diagnostic { line: line.no, error });
            }
        }
        image
    }

    fn resolve(&self, op: &Operand, symbols: &SymbolTable) -> Result<i64, AsmError> {
        match op {
            Operand::Number(n) => Ok(*n),
            Operand::Symbol(name) => symbols
                .get(name)
                .map(|&a| i64::from(a))
                .ok_or_else(|| AsmError::UndefinedLabel(name.clone())),
        }
    }

    /// Resolve an operand that must name a memory cell.
    fn resolve_addr(&self, op: &Operand, symbols: &SymbolTable) -> Result<u32, AsmError> {
        let value = self.resolve(op, symbols)?;
        let max = self.mem_size as i64 - 1;
        if !(0..=max).contains(&value) {
            return Err(AsmError::NumberOutOfRange { value, min: 0, max });
        }
        Ok(value as u32)
    }
}

fn item_width(item: &Item) -> u32 {
    match item {
        Item::Org(_) => 0,
        Item::Byte(_) => 1,
        Item::Word(_) => 2,
        Item::Bytes { count, .. } => *count,
        Item::Words { count, .. } => count * 2,
        Item::Instr { desc, .. } => 1 + u32::from(desc.operands),
    }
}

fn emit(image: &mut LinearMemory, at: u32, encoded: &Encoded) -> Result<(), AsmError> {
    match encoded {
        Encoded::Bytes(bytes) => {
            for (addr, &b) in (at..).zip(bytes) {
                image
                    .write_u8(addr, b)
                    .map_err(|_| AsmError::MemoryOverflow { addr })?;
            }
        }
        Encoded::Words(words) => {
            for (addr, &w) in (at..).step_by(2).zip(words) {
                image
                    .write_u16(addr, w)
                    .map_err(|_| AsmError::MemoryOverflow { addr })?;
            }
        }
    }
    Ok(())
}

fn parse_hex(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    i64::from_str_radix(digits, 16).ok()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Decimal, `0x1f`, or `1fh` (the latter must start with a digit).
pub fn parse_number(tok: &str) -> Option<i64> {
    let (neg, body) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, tok),
    };
    if !body.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let magnitude = if let Some(hex) = body.strip_prefix("0x") {
        parse_hex(hex)?
    } else if let Some(hex) = body.strip_suffix('h') {
        parse_hex(hex)?
    } else if body.bytes().all(|b| b.is_ascii_digit()) {
        body.parse::<i64>().ok()?
    } else {
        return None;
    };
    if neg {
        magnitude.checked_neg()
    } else {
        Some(magnitude)
    }
}

fn parse_operand(tok: &str) -> Result<Operand, AsmError> {
    if let Some(n) = parse_number(tok) {
        return Ok(Operand::Number(n));
    }
    let is_symbol = tok
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && tok.chars().all(is_ident_char);
    if is_symbol {
        Ok(Operand::Symbol(tok.to_string()))
    } else {
        Err(AsmError::InvalidNumber(tok.to_string()))
    }
}

fn single_arg(directive: &'static str, args: &[&str]) -> Result<Operand, AsmError> {
    match args {
        [one] => parse_operand(one),
        _ => Err(AsmError::MalformedDirective {
            directive,
            arg: args.join(" "),
        }),
    }
}

/// `N(V)`: N copies of V. Whitespace inside the pattern is tolerated.
fn repeat_arg(directive: &'static str, args: &[&str]) -> Result<(u32, i64), AsmError> {
    let arg = args.concat();
    let malformed = || AsmError::MalformedDirective {
        directive,
        arg: arg.clone(),
    };
    let (count, rest) = arg.split_once('(').ok_or_else(malformed)?;
    let value = rest.strip_suffix(')').ok_or_else(malformed)?;
    let count = parse_number(count).ok_or_else(malformed)?;
    let value = parse_number(value).ok_or_else(malformed)?;
    let count = u32::try_from(count).map_err(|_| AsmError::NumberOutOfRange {
        value: count,
        min: 0,
        max: i64::from(u16::MAX),
    })?;
    if count > u32::from(u16::MAX) {
        return Err(AsmError::NumberOutOfRange {
            value: i64::from(count),
            min: 0,
            max: i64::from(u16::MAX),
        });
    }
    Ok((count, value))
}

/// Bytes accept both unsigned and two's complement spellings.
fn to_byte(value: i64) -> Result<u8, AsmError> {
    if (-128..=255).contains(&value) {
        Ok(value as u8)
    } else {
        Err(AsmError::NumberOutOfRange { value, min: -128, max: 255 })
    }
}

fn to_word(value: i64) -> Result<u16, AsmError> {
    if (-32768..=65535).contains(&value) {
        Ok(value as u16)
    } else {
        Err(AsmError::NumberOutOfRange { value, min: -32768, max: 65535 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_in_all_spellings() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("0x2a"), Some(42));
        assert_eq!(parse_number("2ah"), Some(42));
        assert_eq!(parse_number("0ffh"), Some(255));
        assert_eq!(parse_number("-1"), Some(-1));
        assert_eq!(parse_number("each"), None);
        assert_eq!(parse_number("12z"), None);
    }

    #[test]
    fn signs_only_lead_the_literal() {
        assert_eq!(parse_number("0x-1"), None);
        assert_eq!(parse_number("0x+5"), None);
        assert_eq!(parse_number("0+5h"), None);
        assert_eq!(parse_number("-0x-8000000000000000"), None);
        assert_eq!(parse_number("-0x80"), Some(-128));
        assert_eq!(parse_number("0x"), None);
    }

    #[test]
    fn repeat_pattern() {
        assert_eq!(repeat_arg("dab", &["3(7)"]), Ok((3, 7)));
        assert_eq!(repeat_arg("dab", &["3", "(", "7", ")"]), Ok((3, 7)));
        assert!(matches!(
            repeat_arg("daw", &["3"]),
            Err(AsmError::MalformedDirective { directive: "daw", .. })
        ));
        assert!(matches!(
            repeat_arg("dab", &["x(1)"]),
            Err(AsmError::MalformedDirective { .. })
        ));
    }

    #[test]
    fn byte_range() {
        assert_eq!(to_byte(-1), Ok(0xFF));
        assert_eq!(to_byte(255), Ok(0xFF));
        assert!(to_byte(256).is_err());
        assert!(to_byte(-129).is_err());
    }
}
