use crate::cpu::{Cpu, Flags, Trap};
use crate::decoder::{Decoded, Op};
use crate::memory::Bus;

pub trait Executor {
    fn exec<B: Bus>(&self, cpu: &mut Cpu, bus: &mut B, d: Decoded) -> Result<(), Trap>;
}

fn load<B: Bus>(bus: &mut B, addr: u8) -> Result<u8, Trap> {
    let addr = u32::from(addr);
    bus.read_u8(addr).map_err(|source| Trap::Bus { addr, source })
}

pub struct NeanderExecutor;
impl Executor for NeanderExecutor {
    fn exec<B: Bus>(&self, cpu: &mut Cpu, bus: &mut B, d: Decoded) -> Result<(), Trap> {
        // single-operand ops are all memory-direct; zero-operand ops never read it
        let operand = d.operand.unwrap_or(0);
        match d.op {
            Op::Nop => {}
            Op::Sta => {
                let addr = u32::from(operand);
                bus.write_u8(addr, cpu.ac)
                    .map_err(|source| Trap::Bus { addr, source })?;
            }
            Op::Lda => {
                let v = load(bus, operand)?;
                cpu.ac = v;
            }
            Op::Add => {
                let v = load(bus, operand)?;
                cpu.ac = cpu.ac.wrapping_add(v);
            }
            Op::Or => {
                let v = load(bus, operand)?;
                cpu.ac |= v;
            }
            Op::And => {
                let v = load(bus, operand)?;
                cpu.ac &= v;
            }
            Op::Not => {
                cpu.ac = !cpu.ac;
            }
            Op::Jmp => {
                cpu.pc = operand;
            }
            Op::Jn => {
                if cpu.flags.contains(Flags::N) {
                    cpu.pc = operand;
                }
            }
            Op::Jz => {
                if cpu.flags.contains(Flags::Z) {
                    cpu.pc = operand;
                }
            }
            Op::Hlt => cpu.halt(),
        }
        if d.op.updates_flags() {
            cpu.flags = Flags::from_acc(cpu.ac);
        }
        Ok(())
    }
}
