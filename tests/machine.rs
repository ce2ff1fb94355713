use std::cell::RefCell;
use std::rc::Rc;

use hidra::{CpuConfig, Machine, MachineKind, State, Trap};
use pretty_assertions::assert_eq;

fn neander() -> Machine {
    Machine::new(MachineKind::Neander, CpuConfig::default())
}

#[test]
fn register_and_flag_surface() {
    let m = neander();
    assert_eq!(m.kind(), MachineKind::Neander);
    assert_eq!(m.register_count(), 2);
    assert_eq!(m.register_name(0), Some("AC"));
    assert_eq!(m.register_name(1), Some("PC"));
    assert_eq!(m.register_name(2), None);
    assert_eq!(m.flag_count(), 2);
    assert_eq!(m.flag_name(0), Some("N"));
    assert_eq!(m.flag_value(0), Some(false));
    assert_eq!(m.flag_value(1), Some(true));
    assert_eq!(m.memory_size(), 256);
    assert_eq!(m.memory_value(128), Some(4));
    assert_eq!(m.memory_value(256), None);
    assert_eq!(m.table().lookup_by_mnemonic("jn").map(|d| d.opcode), Some(0x90));
}

#[test]
fn assemble_and_run_sum_program() {
    let mut m = neander();
    let report = m.assemble("lda 128\nadd 129\nsta 130\nhlt");
    assert!(report.success);
    m.run().unwrap();
    assert!(m.is_halted());
    assert_eq!(m.memory_value(130), Some(12));
    assert_eq!(m.register_value(0), Some(12));
    assert_eq!(m.pc(), 7);
}

#[test]
fn failed_build_keeps_live_memory() {
    let mut m = neander();
    assert!(m.set_memory_value(0, 0x55));
    let report = m.assemble("org 0\ndb 1\nbogus\n");
    assert!(!report.success);
    assert_eq!(m.memory_value(0), Some(0x55));

    let report = m.assemble("db 1");
    assert!(report.success);
    assert_eq!(m.memory_value(0), Some(1));
}

#[test]
fn build_errors_reach_the_sink_in_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut m = neander();
    m.set_build_error_sink(Box::new(move |d: &hidra::Diagnostic| sink.borrow_mut().push(d.to_string())));

    let report = m.assemble("foo\nlda\n");
    assert_eq!(report.diagnostics.len(), 2);
    assert_eq!(
        *seen.borrow(),
        vec![
            "line 1: unknown mnemonic `foo`".to_string(),
            "line 2: `lda` takes 1 operand(s), found 0".to_string(),
        ]
    );
}

#[test]
fn stepping_and_clearing() {
    let mut m = neander();
    assert!(m.assemble("lda 129\nnot\nhlt").success);

    assert_eq!(m.step().unwrap(), State::Running);
    assert_eq!(m.register_value(0), Some(8));
    assert_eq!(m.register_value(1), Some(2));
    let d = m.instruction_at(2).unwrap();
    assert_eq!(hidra::disasm::fmt_decoded(&d), "not");
    assert_eq!(m.step().unwrap(), State::Running);
    assert_eq!(m.flag_value(0), Some(true));
    assert_eq!(m.step().unwrap(), State::Halted);

    m.clear_registers();
    assert_eq!(m.register_value(0), Some(0));
    assert_eq!(m.pc(), 0);
    assert_eq!(m.flag_value(1), Some(true));

    m.set_memory_value(128, 0);
    m.clear_memory();
    assert_eq!(m.memory_value(0), Some(0));
    assert_eq!(m.memory_value(128), Some(4));
}

#[test]
fn presets_can_be_disabled() {
    let mut m = Machine::new(
        MachineKind::Neander,
        CpuConfig { preset_cells: false, ..CpuConfig::default() },
    );
    assert_eq!(m.memory_value(128), Some(0));
    assert!(m.assemble("hlt").success);
    assert_eq!(m.memory_value(129), Some(0));
}

#[test]
fn decode_fault_stops_run() {
    let mut m = neander();
    assert!(m.assemble("nop\ndb 0x70").success);
    let err = m.run().unwrap_err();
    assert!(matches!(err, Trap::DecodeFault { pc: 1, opcode: 0x70 }));
    assert!(m.is_halted());
    assert_eq!(m.pc(), 1);
}

#[test]
fn save_and_load_through_the_machine() {
    let path = std::env::temp_dir().join(format!("hidra_machine_{}.mem", std::process::id()));
    let mut a = neander();
    assert!(a.assemble("loop: jmp loop\norg 200\ndw 0xBEEF").success);
    a.save(&path).unwrap();

    let mut b = neander();
    b.set_memory_value(5, 5);
    b.load(&path).unwrap();
    assert_eq!(b.memory().as_slice(), a.memory().as_slice());
    assert_eq!(b.memory_value(200), Some(0xBE));
    let _ = std::fs::remove_file(&path);
}
