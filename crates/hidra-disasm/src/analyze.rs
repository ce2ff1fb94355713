use std::collections::{BTreeMap, BTreeSet, VecDeque};
use serde::Serialize;

use hidra::decoder::{Decoded, Decoder, Op};
use hidra::disasm::fmt_decoded;

use crate::model::{read_u8, Image};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind { Fallthrough, Branch, CondBranch }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge { pub from: usize, pub to: usize, pub kind: EdgeKind }

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub visited: BTreeSet<usize>,
    pub widths: BTreeMap<usize, u8>,
    pub edges: Vec<Edge>,
    pub halts: BTreeSet<usize>,
    pub faults: BTreeSet<usize>, // bytes the program would fault on
}

/// Decode the instruction at `pc` with its operand filled in.
pub fn decode_at<D: Decoder>(img: &Image, dec: &D, pc: usize) -> Option<Decoded> {
    let mut d = dec.decode(read_u8(img, pc)?)?;
    if d.operands == 1 {
        d.operand = Some(read_u8(img, pc + 1)?);
    }
    Some(d)
}

/// Follow every path the machine could take from `entries`. Falling off the
/// end of memory halts the machine, so it produces no edge.
pub fn analyze_entries<D: Decoder>(img: &Image, dec: &D, entries: &[usize], max_instr: usize) -> Analysis {
    let mut a = Analysis::default();
    let mut queue: VecDeque<usize> = entries.iter().copied().filter(|&e| e < img.cells.len()).collect();
    let mut steps = 0usize;
    while let Some(pc) = queue.pop_front() {
        if steps >= max_instr { break; }
        if !a.visited.insert(pc) { continue; }
        let Some(d) = decode_at(img, dec, pc) else {
            a.faults.insert(pc);
            continue;
        };
        steps += 1;
        a.widths.insert(pc, d.width());
        let ft = pc + d.width() as usize;
        let target = d.operand.map(usize::from);
        let mut push = |a: &mut Analysis, to: usize, kind: EdgeKind| {
            if to < img.cells.len() {
                a.edges.push(Edge { from: pc, to, kind });
                if !a.visited.contains(&to) { queue.push_back(to); }
            }
        };
        match (d.op, target) {
            (Op::Hlt, _) => { a.halts.insert(pc); }
            (Op::Jmp, Some(t)) => push(&mut a, t, EdgeKind::Branch),
            (Op::Jn | Op::Jz, Some(t)) => {
                push(&mut a, t, EdgeKind::CondBranch);
                push(&mut a, ft, EdgeKind::Fallthrough);
            }
            _ => push(&mut a, ft, EdgeKind::Fallthrough),
        }
    }
    a
}

#[derive(Debug, Clone, Serialize)]
pub struct Block { pub start: usize, pub end: usize, pub insns: Vec<String> }

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub entries: Vec<usize>,
    pub blocks: Vec<Block>,
    pub edges: Vec<Edge>,
    pub halts: Vec<usize>,
    pub faults: Vec<usize>,
}

/// Split the visited instructions into basic blocks: a block starts at an
/// entry or branch target and ends after an unconditional jump, a halt, or
/// before another start.
pub fn build_report<D: Decoder>(img: &Image, dec: &D, a: &Analysis, entries: &[usize]) -> Report {
    let mut starts: BTreeSet<usize> = entries.iter().copied().collect();
    for e in &a.edges {
        if e.kind != EdgeKind::Fallthrough { starts.insert(e.to); }
    }
    let mut blocks = Vec::new();
    let mut covered: BTreeSet<usize> = BTreeSet::new();
    for &start in &starts {
        if !a.visited.contains(&start) || covered.contains(&start) { continue; }
        let mut insns = Vec::new();
        let mut cur = start;
        loop {
            let Some(&w) = a.widths.get(&cur) else { break };
            covered.insert(cur);
            if let Some(d) = decode_at(img, dec, cur) {
                insns.push(format!("{cur:3}: {}", fmt_decoded(&d)));
            }
            let next = cur + w as usize;
            let is_jump = a.edges.iter().any(|e| e.from == cur && e.kind == EdgeKind::Branch);
            if is_jump || a.halts.contains(&cur) || !a.visited.contains(&next) || starts.contains(&next) {
                cur = next;
                break;
            }
            cur = next;
        }
        blocks.push(Block { start, end: cur, insns });
    }
    Report {
        entries: entries.to_vec(),
        blocks,
        edges: a.edges.clone(),
        halts: a.halts.iter().copied().collect(),
        faults: a.faults.iter().copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hidra::isa::neander::NeanderDecoder;
    use hidra::MachineKind;

    fn image(cells: &[u8]) -> Image {
        Image { kind: MachineKind::Neander, cells: cells.to_vec() }
    }

    #[test]
    fn conditional_jump_has_two_successors() {
        // 0: lda 10 ; 2: jz 6 ; 4: jmp 0 ; 6: hlt
        let img = image(&[0x20, 10, 0xA0, 6, 0x80, 0, 0xF0, 0, 0, 0, 0]);
        let dec = NeanderDecoder::new();
        let a = analyze_entries(&img, &dec, &[0], 100);
        assert_eq!(a.visited.iter().copied().collect::<Vec<_>>(), vec![0, 2, 4, 6]);
        assert!(a.edges.contains(&Edge { from: 2, to: 6, kind: EdgeKind::CondBranch }));
        assert!(a.edges.contains(&Edge { from: 2, to: 4, kind: EdgeKind::Fallthrough }));
        assert!(a.edges.contains(&Edge { from: 4, to: 0, kind: EdgeKind::Branch }));
        assert!(a.halts.contains(&6));

        let r = build_report(&img, &dec, &a, &[0]);
        let spans: Vec<(usize, usize)> = r.blocks.iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(spans, vec![(0, 6), (6, 7)]);
        assert_eq!(r.blocks[0].insns[1], "  2: jz 6");
    }

    #[test]
    fn undecodable_byte_is_a_fault() {
        let img = image(&[0x00, 0x70, 0xF0]);
        let a = analyze_entries(&img, &NeanderDecoder::new(), &[0], 100);
        assert!(a.faults.contains(&1));
        assert!(!a.visited.contains(&2));
    }
}
