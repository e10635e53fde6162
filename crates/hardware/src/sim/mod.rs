//! Host-facing `Core`: owns every piece of architectural state and wires
//! them into the [`Scheduler`].
//!
//! This is the one type `crates/cli` and `crates/bindings` construct
//! directly; everything below it is reachable only through the methods
//! exposed here.

mod queue;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::bus::Bus;
use crate::common::constants::{A11_BOOT_VECTOR, A9_BOOT_VECTOR};
use crate::common::error::EmuError;
use crate::config::Config;
use crate::coproc::CoProc;
use crate::cpu::condition::ConditionTable;
use crate::cpu::decode::{build_arm_table, build_thumb_table, ArmTable, ThumbTable};
use crate::cpu::{CpuCore, CpuId};
use crate::gpu::GpuCmd;
use crate::scheduler::{Scheduler, SchedulerHost, TaskId};
use crate::stats::CoreStats;

pub use queue::{AudioQueue, Frame, FrameQueue};

/// Boot image paths the host resolves before constructing a [`Core`]
/// (settings-driven boot).
#[derive(Debug, Clone, Default)]
pub struct BootImages {
    /// Path to the ARM11 boot ROM.
    pub boot11: PathBuf,
    /// Path to the ARM9 boot ROM.
    pub boot9: PathBuf,
    /// Optional NAND image, loaded at a fixed physical base if present.
    pub nand: Option<PathBuf>,
    /// Optional SD card image.
    pub sd: Option<PathBuf>,
}

/// Physical base address the NAND image is mapped at, if supplied.
const NAND_BASE: u32 = 0x2000_0000;
/// Physical base address the SD card image is mapped at, if supplied.
const SD_BASE: u32 = 0x3000_0000;

fn shared_tables() -> (&'static ConditionTable, &'static ArmTable, &'static ThumbTable) {
    static CONDITIONS: OnceLock<ConditionTable> = OnceLock::new();
    static ARM: OnceLock<ArmTable> = OnceLock::new();
    static THUMB: OnceLock<ThumbTable> = OnceLock::new();
    (
        CONDITIONS.get_or_init(ConditionTable::build),
        ARM.get_or_init(build_arm_table),
        THUMB.get_or_init(build_thumb_table),
    )
}

fn read_required_image(cpu: &'static str, path: &Path) -> Result<Vec<u8>, EmuError> {
    if !path.exists() {
        return Err(EmuError::MissingBootRom { cpu, path: path.to_path_buf() });
    }
    fs::read(path).map_err(|source| EmuError::UnreadableImage { path: path.to_path_buf(), source })
}

fn read_optional_image(path: &Path) -> Result<Vec<u8>, EmuError> {
    fs::read(path).map_err(|source| EmuError::UnreadableImage { path: path.to_path_buf(), source })
}

/// Everything that exists once per running emulation session: the
/// scheduler, the five cores, their coprocessors, the bus, and the GPU
/// command processor.
pub struct Core {
    scheduler: Scheduler,
    cores: [CpuCore; 5],
    coprocs: [CoProc; 5],
    bus: Bus,
    gpu: GpuCmd,
    config: Config,
    active_cpus: Vec<CpuId>,
    frames: FrameQueue,
    audio: AudioQueue,
    /// Execution counters, updated as the scheduler drains a frame.
    pub stats: CoreStats,
}

impl Core {
    /// Loads the configured boot images and constructs a core at
    /// architectural reset: A11-0 at [`A11_BOOT_VECTOR`], A9 at
    /// [`A9_BOOT_VECTOR`], A11-1..3 halted.
    pub fn new(images: &BootImages, config: Config) -> Result<Core, EmuError> {
        let boot11 = read_required_image("A11", &images.boot11)?;
        let boot9 = read_required_image("A9", &images.boot9)?;

        let mut bus = Bus::new();
        bus.load_image(A11_BOOT_VECTOR, &boot11);
        bus.load_image(A9_BOOT_VECTOR, &boot9);
        if let Some(nand) = &images.nand {
            bus.load_image(NAND_BASE, &read_optional_image(nand)?);
        }
        if let Some(sd) = &images.sd {
            bus.load_image(SD_BASE, &read_optional_image(sd)?);
        }

        let (conditions, arm_table, thumb_table) = shared_tables();
        let boot_vector = |id: CpuId| if id.is_a11() { A11_BOOT_VECTOR } else { A9_BOOT_VECTOR };
        let mut cores = CpuId::ALL.map(|id| CpuCore::new(id, boot_vector(id), conditions, arm_table, thumb_table));
        for core in &mut cores {
            core.saturating_op_cycles = config.cpu.saturating_op_cycles;
        }

        let mmu_capacity = config.cpu.mmu_cache_entries;
        let coprocs = CpuId::ALL.map(|id| if id.is_a11() { CoProc::new_a11_with_capacity(mmu_capacity) } else { CoProc::new_a9() });

        let mut core = Core {
            scheduler: Scheduler::new(),
            cores,
            coprocs,
            bus,
            gpu: GpuCmd::new(),
            active_cpus: Vec::new(),
            frames: FrameQueue::new(config.queues.frame_depth),
            audio: AudioQueue::new(config.queues.audio_depth),
            stats: CoreStats::new(),
            config,
        };
        core.recompute_active_cpus();

        for id in [CpuId::A11_0, CpuId::A11_1, CpuId::A9] {
            let idx = id.index();
            core.cores[idx].flush_pipeline(boot_vector(id), &mut core.bus, &mut core.coprocs[idx]);
        }
        for id in [CpuId::A11_2, CpuId::A11_3] {
            core.cores[id.index()].halt(1);
        }

        core.scheduler.schedule(TaskId::GpuCommandStep, 1);
        core.scheduler.schedule(TaskId::ResetCycles, crate::config::cycle_rebase_interval());

        Ok(core)
    }

    fn recompute_active_cpus(&mut self) {
        self.active_cpus = if self.config.cpu.extra_mode {
            CpuId::ALL.to_vec()
        } else {
            vec![CpuId::A11_0, CpuId::A11_1, CpuId::A9]
        };
    }

    /// Runs exactly one display frame's worth of scheduler work.
    pub fn run_frame(&mut self) {
        self.scheduler.schedule(TaskId::FrameEnd, cycle_budget_per_frame());
        let mut scheduler = std::mem::take(&mut self.scheduler);
        scheduler.run_frame(self);
        self.scheduler = scheduler;

        let fb_addr = self.bus.mmio.display.active_framebuffer();
        self.bus.mmio.display.signal_vblank();
        let frame = read_framebuffer(&mut self.bus, fb_addr);
        self.frames.push(frame);
        self.stats.frames_completed += 1;
    }

    /// Pops the oldest unconsumed frame, if any.
    pub fn get_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Presses key `idx` (`press_key`); updates the input
    /// controller's register directly, with no scheduler involvement.
    pub fn press_key(&mut self, idx: u32) {
        self.bus.mmio.input.press_key(idx);
    }

    /// Releases key `idx`.
    pub fn release_key(&mut self, idx: u32) {
        self.bus.mmio.input.release_key(idx);
    }

    /// Presses the touch panel at normalized coordinates `(x, y)`.
    pub fn press_screen(&mut self, x: f32, y: f32) {
        self.bus.mmio.input.press_screen(x, y);
    }

    /// Releases the touch panel.
    pub fn release_screen(&mut self) {
        self.bus.mmio.input.release_screen();
    }
}

/// Fixed cycle budget advanced per `run_frame` call (the
/// scheduler itself is frame-rate agnostic; this is the host's display
/// refresh cadence, one ARM11 cycle count per 1/60s frame at the
/// console's nominal clock).
fn cycle_budget_per_frame() -> u64 {
    268_111_856 / 60
}

fn read_framebuffer(bus: &mut Bus, base: u32) -> Frame {
    use crate::common::constants::{FRAME_HEIGHT, FRAME_WIDTH};
    let mut pixels = vec![0u8; FRAME_WIDTH * FRAME_HEIGHT * 4];
    bus.read_bytes(base, &mut pixels);
    Frame { width: FRAME_WIDTH, height: FRAME_HEIGHT, pixels }
}

impl SchedulerHost for Core {
    fn active_cpus(&self) -> &[CpuId] {
        &self.active_cpus
    }

    fn cpu_cycles(&self, id: CpuId) -> i64 {
        self.cores[id.index()].cycles
    }

    fn clock_divider(&self, id: CpuId) -> u64 {
        id.clock_divider()
    }

    fn run_opcode(&mut self, id: CpuId) -> u64 {
        let idx = id.index();
        let cost = self.cores[idx].step(&mut self.bus, &mut self.coprocs[idx]);
        self.stats.opcodes_retired[idx] += 1;
        cost
    }

    fn set_cpu_cycles(&mut self, id: CpuId, cycles: i64) {
        self.cores[id.index()].cycles = cycles;
    }

    fn fire_task(&mut self, task: TaskId, scheduler: &mut Scheduler) {
        self.stats.events_fired += 1;
        match task {
            TaskId::FrameEnd => scheduler.running = false,
            TaskId::ResetCycles => {
                let delta = crate::config::cycle_rebase_interval();
                scheduler.rebase(delta);
                for core in &mut self.cores {
                    if core.cycles >= 0 {
                        core.cycles = core.cycles.saturating_sub(delta as i64);
                    }
                }
                self.stats.cycle_rebases += 1;
                scheduler.schedule(TaskId::ResetCycles, delta);
            }
            TaskId::ArmStop(_) => {}
            TaskId::GpuCommandStep => {
                if let Some((base, size)) = self.bus.mmio.gpu.take_start() {
                    self.gpu.start_list(base, size);
                    self.bus.mmio.gpu.signal_busy();
                }
                if self.gpu.is_busy() {
                    self.gpu.run_one_packet(&mut self.bus);
                    self.stats.gpu_commands_processed = self.gpu.commands_processed;
                    self.stats.vertices_shaded = self.gpu.vertices_shaded;
                    self.stats.triangles_rasterized = self.gpu.triangles_rasterized;
                    if !self.gpu.is_busy() {
                        self.bus.mmio.gpu.signal_idle();
                    }
                }
                scheduler.schedule(TaskId::GpuCommandStep, 1);
            }
            TaskId::Device(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_nop_loop(bytes: &mut Vec<u8>, count: usize) {
        for _ in 0..count {
            bytes.extend_from_slice(&0xE320_F000u32.to_le_bytes()); // NOP
        }
        bytes.extend_from_slice(&0xEAFF_FFFEu32.to_le_bytes()); // B .
    }

    fn write_boot_rom(dir: &std::path::Path, name: &str) -> PathBuf {
        let mut bytes = Vec::new();
        write_nop_loop(&mut bytes, 4);
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn missing_boot_rom_is_reported_not_panicked() {
        let images = BootImages {
            boot11: PathBuf::from("/nonexistent/boot11.bin"),
            boot9: PathBuf::from("/nonexistent/boot9.bin"),
            nand: None,
            sd: None,
        };
        let result = Core::new(&images, Config::default());
        assert!(matches!(result, Err(EmuError::MissingBootRom { cpu: "A11", .. })));
    }

    #[test]
    fn fresh_core_seeds_boot_vectors_and_halts_extra_cores() {
        let dir = tempfile::tempdir().unwrap();
        let images = BootImages {
            boot11: write_boot_rom(dir.path(), "boot11.bin"),
            boot9: write_boot_rom(dir.path(), "boot9.bin"),
            nand: None,
            sd: None,
        };
        let core = Core::new(&images, Config::default()).unwrap();
        assert_eq!(core.cores[CpuId::A11_0.index()].pc(), A11_BOOT_VECTOR + 8);
        assert_eq!(core.cores[CpuId::A9.index()].pc(), A9_BOOT_VECTOR + 8);
        assert_eq!(core.cores[CpuId::A11_2.index()].cycles, -1);
        assert_eq!(core.cores[CpuId::A11_3.index()].cycles, -1);
    }

    #[test]
    fn run_frame_advances_global_cycles_and_queues_a_frame() {
        let dir = tempfile::tempdir().unwrap();
        let images = BootImages {
            boot11: write_boot_rom(dir.path(), "boot11.bin"),
            boot9: write_boot_rom(dir.path(), "boot9.bin"),
            nand: None,
            sd: None,
        };
        let mut core = Core::new(&images, Config::default()).unwrap();
        core.run_frame();
        assert!(core.stats.total_opcodes() > 0);
        assert_eq!(core.stats.frames_completed, 1);
        assert!(core.get_frame().is_some());
    }

    #[test]
    fn press_and_release_key_do_not_touch_the_scheduler() {
        let dir = tempfile::tempdir().unwrap();
        let images = BootImages {
            boot11: write_boot_rom(dir.path(), "boot11.bin"),
            boot9: write_boot_rom(dir.path(), "boot9.bin"),
            nand: None,
            sd: None,
        };
        let mut core = Core::new(&images, Config::default()).unwrap();
        let before = core.scheduler.global_cycles;
        core.press_key(0);
        core.release_key(0);
        assert_eq!(core.scheduler.global_cycles, before);
    }
}
