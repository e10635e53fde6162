//! CPU core: register banking, condition evaluation, ARM/THUMB decode and
//! execution, exception entry, and the exclusive monitor.

/// Shifter-operand computation and the sixteen ALU data-processing opcodes.
pub mod alu;
/// Branch forms, status-register transfers, software interrupts, and the
/// "reserved" condition-field decoder (BLX-label, PLD, CPS, SRS, RFE, CLREX).
pub mod branch;
/// 256-entry `(cond, NZCV) -> bool` condition lookup.
pub mod condition;
/// ARM and THUMB opcode dispatch tables, built once at construction from a
/// declarative `(mask, match, handler)` pattern list.
pub mod decode;
/// Exception entry (`exception(vector)`).
pub mod exception;
/// Register bank storage and the mode-indexed `view` indirection table.
pub mod regs;
/// Single load/store, block transfer, and the exclusive monitor.
pub mod transfer;

use crate::bus::Bus;
use crate::coproc::CoProc;
use condition::ConditionTable;
use decode::{ArmTable, ThumbTable};
use regs::{Cpsr, Mode, RegisterBank};

/// One of the five cores in the system: up to four ARMv6-class A11 cores
/// and one ARMv5-class A9 coprocessor core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CpuId {
    /// First A11 core; always enabled, boots at the A11 boot vector.
    A11_0,
    /// Second A11 core; always enabled.
    A11_1,
    /// Third A11 core; only scheduled when "extra mode" is enabled.
    A11_2,
    /// Fourth A11 core; only scheduled when "extra mode" is enabled.
    A11_3,
    /// The ARMv5 coprocessor core; boots at the A9 boot vector, always
    /// scheduled, runs at half the A11 clock.
    A9,
}

impl CpuId {
    /// All five cores, in a fixed order used to index per-core arrays.
    pub const ALL: [CpuId; 5] = [
        CpuId::A11_0,
        CpuId::A11_1,
        CpuId::A11_2,
        CpuId::A11_3,
        CpuId::A9,
    ];

    /// Index into per-core arrays (`0..=4`).
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            CpuId::A11_0 => 0,
            CpuId::A11_1 => 1,
            CpuId::A11_2 => 2,
            CpuId::A11_3 => 3,
            CpuId::A9 => 4,
        }
    }

    /// Whether this core is one of the ARMv6-class application cores.
    #[must_use]
    pub fn is_a11(self) -> bool {
        !matches!(self, CpuId::A9)
    }

    /// Clock divider relative to the A11 cores: ×1 for A11, ×2 for A9.
    #[must_use]
    pub fn clock_divider(self) -> u64 {
        if self.is_a11() { 1 } else { 2 }
    }
}

/// The pre-fetched opcode pipeline: two slots, 16- or 32-bit wide
/// depending on the current instruction set state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pipeline {
    /// The opcode about to be executed.
    pub slot: [u32; 2],
}

/// Architectural state for one core (`CpuCore`).
pub struct CpuCore {
    /// Which core this is; fixes boot vector and clock divider.
    pub id: CpuId,
    /// Register bank storage plus the mode-indexed view indirection.
    pub regs: RegisterBank,
    /// Current program status register.
    pub cpsr: Cpsr,
    /// Two-slot pre-fetch pipeline.
    pub pipeline: Pipeline,
    /// Absolute global cycle this core is next due to run an opcode;
    /// `-1` while halted.
    pub cycles: i64,
    /// Nonzero while halted; a zero transition un-parks the core.
    pub halt_mask: u32,
    /// Set by `LDREX`, consumed (and possibly invalidated) by `STREX`.
    pub exclusive: bool,
    /// Address recorded by the most recent `LDREX`.
    pub exc_address: u32,
    /// Shared 256-entry condition lookup (constructed once, read-only).
    pub conditions: &'static ConditionTable,
    /// Shared ARM dispatch table for this CPU class.
    pub arm_table: &'static ArmTable,
    /// Shared THUMB dispatch table for this CPU class.
    pub thumb_table: &'static ThumbTable,
    /// Cycle cost of the saturating/parallel media-instruction extension
    /// (`QADD`-family, `SADD8`/`UADD8`-family, `SSAT`/`USAT`); not
    /// authoritative in the source this core was distilled from, so it's
    /// configurable rather than a hardcoded constant. Defaults to
    /// [`crate::config::CpuConfig::default`]'s value; `sim::Core::new`
    /// overrides it from [`crate::config::CpuConfig::saturating_op_cycles`]
    /// after construction.
    pub saturating_op_cycles: u64,
}

impl CpuCore {
    /// Creates a core at its architectural reset state: SVC mode, IRQ/FIQ
    /// masked, ARM state, PC at `boot_vector`, pipeline not yet filled.
    #[must_use]
    pub fn new(
        id: CpuId,
        boot_vector: u32,
        conditions: &'static ConditionTable,
        arm_table: &'static ArmTable,
        thumb_table: &'static ThumbTable,
    ) -> Self {
        let mut regs = RegisterBank::new();
        let cpsr = Cpsr::reset();
        regs.set_mode(Mode::Svc, None);
        regs.write(15, boot_vector);
        Self {
            id,
            regs,
            cpsr,
            pipeline: Pipeline::default(),
            cycles: 0,
            halt_mask: 0,
            exclusive: false,
            exc_address: 0,
            conditions,
            arm_table,
            thumb_table,
            saturating_op_cycles: crate::config::CpuConfig::default().saturating_op_cycles,
        }
    }

    /// Reads the program counter as architecturally stored (not yet
    /// biased by the `+4`/`+8` pipeline offsets instructions observe).
    #[must_use]
    pub fn pc(&self) -> u32 {
        self.regs.read(15)
    }

    /// Fetch width for the current instruction set: 4 bytes in ARM state,
    /// 2 in THUMB.
    #[must_use]
    pub fn fetch_size(&self) -> u32 {
        if self.cpsr.thumb() { 2 } else { 4 }
    }

    /// Refills both pipeline slots from `new_pc`, clearing the low
    /// alignment bits per the current instruction set, and leaves PC
    /// pointing just past the two fetched opcodes.
    pub fn flush_pipeline(&mut self, new_pc: u32, bus: &mut Bus, coproc: &mut CoProc) {
        let size = self.fetch_size();
        let aligned = new_pc & !(size - 1);
        self.regs.write(15, aligned);
        let first = self.fetch_opcode(aligned, bus, coproc);
        let second = self.fetch_opcode(aligned + size, bus, coproc);
        self.pipeline.slot = [first, second];
        self.regs.write(15, aligned + 2 * size);
    }

    fn fetch_opcode(&mut self, addr: u32, bus: &mut Bus, coproc: &mut CoProc) -> u32 {
        if self.cpsr.thumb() {
            u32::from(coproc.read_u16(self.id, bus, addr))
        } else {
            coproc.read_u32(self.id, bus, addr)
        }
    }

    /// Executes exactly one opcode step and returns its cycle cost.
    ///
    /// The PC a handler observes while dispatching (`pc_before`) must stay
    /// at the architectural "+4/+8" bias (PC-visibility rule);
    /// the pipeline refill for the *next* instruction only happens
    /// afterward, and only if the handler didn't already call
    /// `flush_pipeline` itself (a taken branch or a load/ALU write to PC
    /// replaces pipeline and PC wholesale, so re-advancing here would
    /// clobber the branch target).
    pub fn step(&mut self, bus: &mut Bus, coproc: &mut CoProc) -> u64 {
        let op = self.pipeline.slot[0];
        self.pipeline.slot[0] = self.pipeline.slot[1];

        let size = self.fetch_size();
        let pc_before = self.pc();

        let cost = if self.cpsr.thumb() {
            decode::execute_thumb(self, op as u16, bus, coproc)
        } else {
            decode::execute(self, op, bus, coproc)
        };

        if self.pc() == pc_before {
            self.pipeline.slot[1] = self.fetch_opcode(pc_before, bus, coproc);
            self.regs.write(15, pc_before + size);
        }
        cost
    }

    /// ORs `mask` into `halt_mask`; if that makes it newly nonzero, the
    /// caller (the scheduler host) should schedule an `ArmStop(id)` task
    /// and this core stops being advanced until `unhalt` clears it.
    pub fn halt(&mut self, mask: u32) -> bool {
        let was_zero = self.halt_mask == 0;
        self.halt_mask |= mask;
        let newly_halted = was_zero && self.halt_mask != 0;
        if newly_halted {
            self.cycles = -1;
        }
        newly_halted
    }

    /// ANDs `mask` out of `halt_mask`; if that makes it newly zero, this
    /// core resumes promptly on the next scheduler pass.
    pub fn unhalt(&mut self, mask: u32) -> bool {
        self.halt_mask &= !mask;
        let newly_unhalted = self.halt_mask == 0;
        if newly_unhalted {
            self.cycles = 0;
        }
        newly_unhalted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::coproc::CoProc;
    use decode::{build_arm_table, build_thumb_table};
    use std::sync::OnceLock;

    fn tables() -> (&'static ConditionTable, &'static ArmTable, &'static ThumbTable) {
        static CONDITIONS: OnceLock<ConditionTable> = OnceLock::new();
        static ARM: OnceLock<ArmTable> = OnceLock::new();
        static THUMB: OnceLock<ThumbTable> = OnceLock::new();
        (
            CONDITIONS.get_or_init(ConditionTable::build),
            ARM.get_or_init(build_arm_table),
            THUMB.get_or_init(build_thumb_table),
        )
    }

    /// Scenario 1: pipeline refill with `MOV r0,#1; B .`.
    #[test]
    fn pipeline_refill_advances_pc_by_one_instruction() {
        let (conditions, arm, thumb) = tables();
        let mut bus = Bus::new();
        let mut coproc = CoProc::new_a11();
        let base = 0x1000_0000u32;
        // MOV r0, #1 (AL)
        bus.write_u32(base, 0xE3A0_0001);
        // B . (branch to self, AL)
        bus.write_u32(base + 4, 0xEAFF_FFFE);

        let mut core = CpuCore::new(CpuId::A11_0, base, conditions, arm, thumb);
        core.flush_pipeline(base, &mut bus, &mut coproc);
        assert_eq!(core.pc(), base + 8);
        assert_eq!(core.pipeline.slot[0], 0xE3A0_0001);

        core.step(&mut bus, &mut coproc);
        assert_eq!(core.pc(), base + 12);
        assert_eq!(core.pipeline.slot[0], 0xEAFF_FFFE);
        assert_eq!(core.regs.read(0), 1);
    }

    #[test]
    fn halt_sets_cycles_sentinel_and_unhalt_clears_it() {
        let (conditions, arm, thumb) = tables();
        let mut core = CpuCore::new(CpuId::A11_1, 0, conditions, arm, thumb);
        assert!(core.halt(1));
        assert_eq!(core.cycles, -1);
        assert!(!core.halt(2)); // already nonzero: not a new transition
        assert!(!core.unhalt(2)); // mask still has bit 0 set
        assert_eq!(core.halt_mask, 1);
        assert!(core.unhalt(1));
        assert_eq!(core.cycles, 0);
    }
}
