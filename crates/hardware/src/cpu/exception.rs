//! Exception entry (`exception(vector)`).

use crate::common::ExceptionVector;

use super::regs::{Cpsr, Mode};
use super::CpuCore;

impl ExceptionVector {
    fn target_mode(self) -> Mode {
        match self {
            ExceptionVector::Undefined => Mode::Und,
            ExceptionVector::SoftwareInterrupt => Mode::Svc,
            ExceptionVector::PrefetchAbort | ExceptionVector::DataAbort => Mode::Abt,
            ExceptionVector::Irq => Mode::Irq,
            ExceptionVector::Fiq => Mode::Fiq,
        }
    }

    /// Offset applied to the saved return address relative to the next
    /// instruction, per the ARM ARM's exception model (varies by vector:
    /// `SWI`/`UND` return to the faulting instruction's successor, data
    /// abort returns to the faulting instruction itself, etc.).
    fn link_offset(self) -> u32 {
        match self {
            ExceptionVector::SoftwareInterrupt | ExceptionVector::Undefined => 0,
            ExceptionVector::PrefetchAbort | ExceptionVector::Irq | ExceptionVector::Fiq => 4,
            ExceptionVector::DataAbort => 8,
        }
    }
}

/// Enters `vector`: banks into the target mode, saves CPSR to the new
/// mode's SPSR, computes and stores the return address in the new LR,
/// masks interrupts appropriately, switches to ARM state, and sets PC to
/// `except_addr + vector.offset()` (`except_addr` is CP15 `ctrl` bit 13's
/// vector base, 0 or `0xFFFF0000`). Returns the fixed 3-cycle cost of
/// exception entry.
pub fn enter(core: &mut CpuCore, vector: ExceptionVector, except_addr: u32) -> u64 {
    let return_pc = core.pc().wrapping_sub(core.fetch_size().wrapping_mul(2)).wrapping_add(vector.link_offset());
    let old_cpsr = core.cpsr;
    let target_mode = vector.target_mode();

    core.regs.set_mode(target_mode, Some(old_cpsr));
    core.regs.write(14, return_pc);

    let mut new_cpsr = Cpsr {
        mode: target_mode,
        thumb: false,
        irq_disable: true,
        fiq_disable: old_cpsr.fiq_disable || matches!(vector, ExceptionVector::Fiq),
        ..old_cpsr
    };
    new_cpsr.n = old_cpsr.n;
    new_cpsr.z = old_cpsr.z;
    new_cpsr.c = old_cpsr.c;
    new_cpsr.v = old_cpsr.v;
    new_cpsr.q = old_cpsr.q;
    core.cpsr = new_cpsr;

    core.regs.write(15, except_addr.wrapping_add(vector.offset()));
    vector.cycles()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::coproc::CoProc;
    use crate::cpu::condition::ConditionTable;
    use crate::cpu::decode::{build_arm_table, build_thumb_table};
    use crate::cpu::CpuId;

    fn new_core() -> CpuCore {
        CpuCore::new(
            CpuId::A11_0,
            0x1000,
            Box::leak(Box::new(ConditionTable::build())),
            Box::leak(Box::new(build_arm_table())),
            Box::leak(Box::new(build_thumb_table())),
        )
    }

    #[test]
    fn software_interrupt_enters_svc_mode_masks_irq_and_vectors() {
        let mut core = new_core();
        core.regs.write(15, 0x1000_0008);
        let cost = enter(&mut core, ExceptionVector::SoftwareInterrupt, 0);
        assert_eq!(core.regs.mode(), Mode::Svc);
        assert!(core.cpsr.irq_disable);
        assert!(!core.cpsr.thumb);
        assert_eq!(core.pc(), ExceptionVector::SoftwareInterrupt.offset());
        assert_eq!(cost, 3);
    }

    #[test]
    fn fiq_enters_fiq_mode_and_masks_fiq() {
        let mut core = new_core();
        core.regs.write(15, 0x1000_0008);
        let cost = enter(&mut core, ExceptionVector::Fiq, 0);
        assert_eq!(core.regs.mode(), Mode::Fiq);
        assert!(core.cpsr.fiq_disable);
        assert!(core.cpsr.irq_disable);
        assert_eq!(core.pc(), ExceptionVector::Fiq.offset());
        assert_eq!(cost, 3);
    }

    #[test]
    fn spsr_after_entry_matches_cpsr_before_entry_excluding_mode() {
        let mut core = new_core();
        core.cpsr.n = true;
        core.cpsr.c = true;
        let before = core.cpsr;
        enter(&mut core, ExceptionVector::Undefined, 0);
        let spsr = core.regs.spsr(Mode::Und).unwrap();
        assert_eq!(spsr.bits() & !0x1F, before.bits() & !0x1F);
    }

    #[test]
    fn data_abort_saves_return_address_eight_bytes_past_fault() {
        let mut core = new_core();
        core.regs.write(15, 0x2000 + 8); // PC is two-instructions-ahead of the faulting fetch
        enter(&mut core, ExceptionVector::DataAbort, 0);
        assert_eq!(core.regs.read(14), 0x2000 + 8);
    }

    // Round-trip law: entering any exception then
    // executing `movs pc, lr` with a matching SPSR returns the CPU to
    // exactly the state preceding the exception (mode, T, flags, PC).
    #[test]
    fn movs_pc_lr_restores_the_state_preceding_the_exception() {
        use crate::bus::Bus;
        use crate::coproc::CoProc;
        use crate::cpu::decode::execute;

        let mut core = new_core();
        core.regs.write(15, 0x1000_0008);
        core.cpsr.n = true;
        core.cpsr.z = true;
        core.cpsr.thumb = false;
        let before_mode = core.regs.mode();
        let before_cpsr = core.cpsr;
        // `enter` saves LR as the resume address accounting for the
        // pipeline's fetch-ahead; that's what `movs pc, lr` hands back.
        let resume_pc = core.pc().wrapping_sub(core.fetch_size() * 2);

        enter(&mut core, ExceptionVector::SoftwareInterrupt, 0);

        let mut bus = Bus::new();
        let mut coproc = CoProc::new_a11();
        // MOVS pc, lr (AL, S=1): Rd=15, Rn=0 (ignored), Rm=14, opcode=MOV.
        let opcode = 0xE1B0_F00E;
        execute(&mut core, opcode, &mut bus, &mut coproc);

        assert_eq!(core.regs.mode(), before_mode);
        assert_eq!(core.cpsr.bits(), before_cpsr.bits());
        assert_eq!(core.regs.read(15), resume_pc);
    }
}
