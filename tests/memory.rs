use hidra::exec::NeanderExecutor;
use hidra::isa::neander::{NeanderDecoder, MEM_SIZE, PRESETS};
use hidra::{Bus, Cpu, CpuConfig, LinearMemory, Trap};

#[test]
fn fresh_memory_is_zero_except_presets() {
    let mem = LinearMemory::with_presets(MEM_SIZE, PRESETS);
    assert_eq!(mem.len(), 256);
    for (addr, &v) in mem.as_slice().iter().enumerate() {
        let expected = match addr {
            128 => 4,
            129 => 8,
            130 => 2,
            _ => 0,
        };
        assert_eq!(v, expected, "cell {addr}");
    }
}

#[test]
fn words_are_big_endian() {
    let mut mem = LinearMemory::new(8);
    mem.write_u16(2, 0x1234).unwrap();
    assert_eq!(&mem.mem[2..4], &[0x12, 0x34]);
    assert_eq!(mem.read_u16(2).unwrap(), 0x1234);
    assert_eq!(mem.read_u8(3).unwrap(), 0x34);
}

#[test]
fn out_of_range_access_is_an_error() {
    let mut mem = LinearMemory::new(8);
    assert!(mem.read_u8(8).is_err());
    assert!(mem.write_u8(8, 1).is_err());
    assert!(mem.write_u16(7, 1).is_err());
    assert!(mem.read_u16(6).is_ok());
}

#[test]
fn clear_zeroes_everything() {
    let mut mem = LinearMemory::with_presets(MEM_SIZE, PRESETS);
    mem.write_u8(3, 9).unwrap();
    mem.clear();
    assert!(mem.as_slice().iter().all(|&b| b == 0));
}

#[test]
fn small_memory_reports_bus_trap() {
    // a 16-byte memory cannot satisfy lda 200
    let mut mem = LinearMemory::new(16);
    mem.write_u8(0, 0x20).unwrap();
    mem.write_u8(1, 200).unwrap();
    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.reset(0);

    let err = cpu
        .step(&mut mem, &NeanderDecoder::new(), &NeanderExecutor)
        .unwrap_err();
    assert!(matches!(err, Trap::Bus { addr: 200, .. }));
    assert!(cpu.is_halted());
}
