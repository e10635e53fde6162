//! Branch forms, status-register transfers, software interrupts, and the
//! "reserved" (`cond == 0b1111`) decoder: `BLX` (immediate), `PLD`, `CPS`,
//! `SRS`, `RFE`, and `CLREX`.

use crate::bus::Bus;
use crate::common::ExceptionVector;
use crate::coproc::CoProc;

use super::exception;
use super::regs::{Cpsr, Mode};
use super::transfer::{self, Width};
use super::CpuCore;

/// `B`/`BL`: sign-extends a 24-bit word offset, shifts left by two, and
/// adds it to PC (which already reads as address-of-instruction + 8 by
/// the time this is called, per the pipeline's fetch-ahead behavior).
pub fn branch(core: &mut CpuCore, bus: &mut Bus, coproc: &mut CoProc, offset24: u32, link: bool) {
    let offset = sign_extend_24(offset24) << 2;
    if link {
        core.regs.write(14, core.pc().wrapping_sub(4));
    }
    let target = core.pc().wrapping_add(offset as u32);
    core.flush_pipeline(target, bus, coproc);
}

/// `BLX` (immediate form, from the reserved condition-field space):
/// like `BL` but also switches to THUMB state and allows a half-word
/// aligned target via the `H` bit.
pub fn branch_link_exchange_immediate(core: &mut CpuCore, bus: &mut Bus, coproc: &mut CoProc, offset24: u32, h: bool) {
    let offset = (sign_extend_24(offset24) << 2) + if h { 2 } else { 0 };
    core.regs.write(14, core.pc().wrapping_sub(4));
    core.cpsr.thumb = true;
    let target = core.pc().wrapping_add(offset as u32);
    core.flush_pipeline(target, bus, coproc);
}

/// `BX`/`BLX` (register form): exchanges instruction set based on the
/// target address's bit 0 and branches to it (cleared).
pub fn branch_exchange(core: &mut CpuCore, bus: &mut Bus, coproc: &mut CoProc, target: u32, link: bool) {
    if link {
        core.regs.write(14, core.pc().wrapping_sub(4));
    }
    core.cpsr.thumb = target & 1 != 0;
    core.flush_pipeline(target & !1, bus, coproc);
}

fn sign_extend_24(value: u32) -> i32 {
    ((value << 8) as i32) >> 8
}

/// `SWI`/`SVC`: always enters the software interrupt vector regardless
/// of the comment field, which callers ignore.
pub fn software_interrupt(core: &mut CpuCore, coproc: &CoProc) -> u64 {
    exception::enter(core, ExceptionVector::SoftwareInterrupt, coproc.except_addr())
}

/// `MRS`: copies CPSR or the current mode's SPSR into `rd`.
pub fn move_from_status(core: &mut CpuCore, spsr: bool) -> u32 {
    if spsr {
        core.regs.spsr(core.regs.mode()).unwrap_or(core.cpsr).bits()
    } else {
        core.cpsr.bits()
    }
}

/// `MSR`: writes `value` into CPSR or SPSR, honoring the `field_mask`
/// (bit 0: control field, low 8 bits — privileged only in non-Usr modes;
/// bit 3: flags field, top 8 bits, always writable).
pub fn move_to_status(core: &mut CpuCore, spsr: bool, field_mask: u8, value: u32) {
    let mut mask = 0u32;
    if field_mask & 0b0001 != 0 {
        mask |= 0x0000_00FF;
    }
    if field_mask & 0b1000 != 0 {
        mask |= 0xFF00_0000;
    }
    if core.regs.mode() == Mode::Usr {
        mask &= 0xFF00_0000; // Usr mode may only update the flags field.
    }

    if spsr {
        let mode = core.regs.mode();
        let current = core.regs.spsr(mode).unwrap_or(core.cpsr).bits();
        let merged = (current & !mask) | (value & mask);
        core.regs.set_spsr(mode, Cpsr::from_bits(merged, mode));
    } else {
        let current = core.cpsr.bits();
        let merged = (current & !mask) | (value & mask);
        core.cpsr = Cpsr::from_bits(merged, core.regs.mode());
        if mask & 0x1F != 0 {
            core.regs.set_mode(core.cpsr.mode, None);
        }
    }
}

/// `CPS` (change processor state, reserved-condition space): updates the
/// interrupt masks and/or mode without touching the condition flags.
pub fn change_processor_state(core: &mut CpuCore, disable_irq: Option<bool>, disable_fiq: Option<bool>, mode: Option<Mode>) {
    if let Some(v) = disable_irq {
        core.cpsr.irq_disable = v;
    }
    if let Some(v) = disable_fiq {
        core.cpsr.fiq_disable = v;
    }
    if let Some(m) = mode {
        core.cpsr.mode = m;
        core.regs.set_mode(m, None);
    }
}

/// `SRS` (store return state): pushes `{LR, SPSR}` onto the stack of the
/// addressed mode's banked SP, per the given `IA/IB/DA/DB` direction.
pub fn store_return_state(core: &mut CpuCore, bus: &mut Bus, coproc: &mut CoProc, target_mode: Mode, increment: bool, before: bool, writeback: bool) {
    let sp = core.regs.read_banked(13, target_mode);
    let lr = core.regs.read_banked(14, target_mode);
    let spsr = core.regs.spsr(target_mode).unwrap_or(core.cpsr).bits();

    let low = if increment { sp } else { sp.wrapping_sub(8) };
    let addr = if before == increment { low.wrapping_add(4) } else { low };
    transfer::store(core.id, bus, coproc, addr, Width::Word, lr);
    transfer::store(core.id, bus, coproc, addr.wrapping_add(4), Width::Word, spsr);

    if writeback {
        let new_sp = if increment { sp.wrapping_add(8) } else { sp.wrapping_sub(8) };
        core.regs.write_banked(13, target_mode, new_sp);
    }
}

/// `RFE` (return from exception): pops `{PC, CPSR}` from `base` and
/// restores them, switching mode implicitly via the loaded CPSR.
pub fn return_from_exception(core: &mut CpuCore, bus: &mut Bus, coproc: &mut CoProc, base: u32, increment: bool, before: bool, writeback: bool, base_reg: usize) {
    let low = if increment { base } else { base.wrapping_sub(8) };
    let addr = if before == increment { low.wrapping_add(4) } else { low };
    let pc = transfer::load(core.id, bus, coproc, addr, Width::Word);
    let cpsr_bits = transfer::load(core.id, bus, coproc, addr.wrapping_add(4), Width::Word);

    if writeback {
        let new_base = if increment { base.wrapping_add(8) } else { base.wrapping_sub(8) };
        core.regs.write(base_reg, new_base);
    }

    core.cpsr = Cpsr::from_bits(cpsr_bits, core.regs.mode());
    core.regs.set_mode(core.cpsr.mode, None);
    core.flush_pipeline(pc, bus, coproc);
}

/// `CLREX`: clears the exclusive monitor with no data transfer.
pub fn clear_exclusive(core: &mut CpuCore) {
    transfer::clear_exclusive(core);
}

/// `PLD`: a cache-preload hint. This system models no cache timing, so
/// it is architecturally a no-op; kept as a named function so the
/// decoder has somewhere to route the encoding instead of treating it
/// as undefined.
pub fn preload_hint(_core: &CpuCore, _address: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::condition::ConditionTable;
    use crate::cpu::decode::{build_arm_table, build_thumb_table};
    use crate::cpu::CpuId;

    fn new_core() -> CpuCore {
        CpuCore::new(
            CpuId::A11_0,
            0,
            Box::leak(Box::new(ConditionTable::build())),
            Box::leak(Box::new(build_arm_table())),
            Box::leak(Box::new(build_thumb_table())),
        )
    }

    #[test]
    fn msr_in_usr_mode_cannot_touch_control_field() {
        let mut core = new_core();
        core.regs.set_mode(Mode::Usr, None);
        core.cpsr.mode = Mode::Usr;
        move_to_status(&mut core, false, 0b1001, 0xFFFF_FFFF);
        assert_eq!(core.regs.mode(), Mode::Usr);
        assert!(core.cpsr.n);
    }

    #[test]
    fn msr_flags_only_mask_leaves_control_bits_untouched() {
        let mut core = new_core();
        core.cpsr.irq_disable = true;
        move_to_status(&mut core, false, 0b1000, 0x8000_0000);
        assert!(core.cpsr.n);
        assert!(core.cpsr.irq_disable);
    }

    #[test]
    fn sign_extend_24_handles_negative_offsets() {
        assert_eq!(sign_extend_24(0x00_FFFF), -1);
        assert_eq!(sign_extend_24(0x00_0001), 1);
    }
}
