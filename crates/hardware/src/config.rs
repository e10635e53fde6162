//! Configuration for the emulator core.
//!
//! Provides:
//! 1. **Defaults:** baseline hardware constants (boot vectors, TCM sizes,
//!    queue depths, placeholder cycle costs for the two open questions).
//! 2. **`Config`:** the hierarchical structure passed to [`crate::sim::Core::new`].
//! 3. **Settings file:** a tolerant `name=value` parser for the host's
//!    persisted settings, exposed as [`Settings`].

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Default configuration constants.
///
/// Collected here (rather than scattered as magic numbers) so the two
/// open questions — saturating-parallel-op cost and ETC1 fetch latency
/// — have exactly one place to be revisited once a test suite pins
/// them.
mod defaults {
    /// Whether "extra mode" (A11 cores 2 and 3) is enabled by default.
    pub const EXTRA_MODE: bool = false;

    /// Number of entries in each core's MMU translation cache.
    pub const MMU_CACHE_ENTRIES: usize = 1 << 20;

    /// Cycle cost of a saturating or parallel-add ALU extension opcode.
    ///
    /// Open question: not pinned by any reference timing trace seen so
    /// far. Treated as a placeholder pending a pinning test.
    pub const SATURATING_OP_CYCLES: u64 = 1;

    /// Extra cycles charged for sampling an ETC1/ETC1A4-compressed texel
    /// versus an uncompressed one.
    ///
    /// Open question: same caveat as `SATURATING_OP_CYCLES`.
    pub const ETC1_FETCH_LATENCY: u64 = 2;

    /// Bounded depth of the host-facing framebuffer queue.
    pub const FRAME_QUEUE_DEPTH: usize = 2;

    /// Bounded depth (in sample batches) of the host-facing audio queue.
    pub const AUDIO_QUEUE_DEPTH: usize = 8;

    /// Periodic rebase interval, in cycles, for `Scheduler::reset_cycles`.
    ///
    /// Chosen well below `u64::MAX / clock_divider` so no tracked counter
    /// (per-CPU cycles, event deadlines, DMA timers) can overflow between
    /// rebases even at the fastest configured clock.
    pub const CYCLE_REBASE_INTERVAL: u64 = 1 << 40;
}

/// Root configuration for a [`crate::sim::Core`].
///
/// # Examples
///
/// ```
/// use diarch_core::config::Config;
///
/// let config = Config::default();
/// assert!(!config.cpu.extra_mode);
/// assert_eq!(config.gpu.etc1_fetch_latency, 2);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// CPU island configuration (extra-mode gating, MMU cache size,
    /// media-instruction cycle cost).
    #[serde(default)]
    pub cpu: CpuConfig,
    /// GPU pipeline configuration (placeholder cycle costs).
    #[serde(default)]
    pub gpu: GpuConfig,
    /// Host-facing queue configuration.
    #[serde(default)]
    pub queues: QueueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cpu: CpuConfig::default(),
            gpu: GpuConfig::default(),
            queues: QueueConfig::default(),
        }
    }
}

/// CPU-island configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CpuConfig {
    /// When `false`, only A11 cores 0 and 1 are scheduled; cores 2 and 3
    /// stay halted regardless of their `halt_mask`.
    #[serde(default = "CpuConfig::default_extra_mode")]
    pub extra_mode: bool,
    /// Entries in each core's MMU translation cache.
    #[serde(default = "CpuConfig::default_mmu_cache_entries")]
    pub mmu_cache_entries: usize,
    /// Cycle cost of a saturating or parallel-add media-instruction opcode
    /// (`QADD`/`SADD8`/`SSAT`/... family).
    #[serde(default = "CpuConfig::default_saturating_op_cycles")]
    pub saturating_op_cycles: u64,
}

impl CpuConfig {
    fn default_extra_mode() -> bool {
        defaults::EXTRA_MODE
    }

    fn default_mmu_cache_entries() -> usize {
        defaults::MMU_CACHE_ENTRIES
    }

    fn default_saturating_op_cycles() -> u64 {
        defaults::SATURATING_OP_CYCLES
    }
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            extra_mode: defaults::EXTRA_MODE,
            mmu_cache_entries: defaults::MMU_CACHE_ENTRIES,
            saturating_op_cycles: defaults::SATURATING_OP_CYCLES,
        }
    }
}

/// GPU pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GpuConfig {
    /// Extra cycles charged for an ETC1/ETC1A4 texel fetch.
    #[serde(default = "GpuConfig::default_etc1_fetch_latency")]
    pub etc1_fetch_latency: u64,
}

impl GpuConfig {
    fn default_etc1_fetch_latency() -> u64 {
        defaults::ETC1_FETCH_LATENCY
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            etc1_fetch_latency: defaults::ETC1_FETCH_LATENCY,
        }
    }
}

/// Host-facing queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of unconsumed frames before the newest is dropped.
    #[serde(default = "QueueConfig::default_frame_depth")]
    pub frame_depth: usize,
    /// Maximum number of unconsumed audio sample batches.
    #[serde(default = "QueueConfig::default_audio_depth")]
    pub audio_depth: usize,
}

impl QueueConfig {
    fn default_frame_depth() -> usize {
        defaults::FRAME_QUEUE_DEPTH
    }

    fn default_audio_depth() -> usize {
        defaults::AUDIO_QUEUE_DEPTH
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            frame_depth: defaults::FRAME_QUEUE_DEPTH,
            audio_depth: defaults::AUDIO_QUEUE_DEPTH,
        }
    }
}

/// Periodic cycle-rebase interval used by `Scheduler::reset_cycles`.
#[must_use]
pub fn cycle_rebase_interval() -> u64 {
    defaults::CYCLE_REBASE_INTERVAL
}

/// Paths and key binds read from the host's persisted settings file
/// : `name=value` lines, one per setting.
///
/// Unrecognized keys (platform-specific key binds) are preserved in
/// `extra` rather than rejected, matching the "never abort on anomaly"
/// policy applied to everything but the boot-ROM paths `Core::new` needs.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Frame-rate limiter toggle.
    pub fps_limiter: bool,
    /// Path to the ARM11 boot ROM image.
    pub boot11_path: Option<PathBuf>,
    /// Path to the ARM9 boot ROM image.
    pub boot9_path: Option<PathBuf>,
    /// Path to the NAND image.
    pub nand_path: Option<PathBuf>,
    /// Path to the optional SD card image.
    pub sd_path: Option<PathBuf>,
    /// Any `name=value` pair not recognized above (platform key binds, etc.).
    pub extra: HashMap<String, String>,
}

impl Settings {
    /// Parses a settings file's contents.
    ///
    /// Blank lines and lines without an `=` are skipped silently; this is
    /// a best-effort parse, not a validating one.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let mut settings = Settings::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "fpsLimiter" => settings.fps_limiter = value == "1" || value.eq_ignore_ascii_case("true"),
                "boot11Path" => settings.boot11_path = Some(PathBuf::from(value)),
                "boot9Path" => settings.boot9_path = Some(PathBuf::from(value)),
                "nandPath" => settings.nand_path = Some(PathBuf::from(value)),
                "sdPath" => settings.sd_path = Some(PathBuf::from(value)),
                _ => {
                    settings.extra.insert(key.to_string(), value.to_string());
                }
            }
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_placeholders() {
        let config = Config::default();
        assert!(!config.cpu.extra_mode);
        assert_eq!(config.cpu.mmu_cache_entries, 1 << 20);
        assert_eq!(config.cpu.saturating_op_cycles, 1);
        assert_eq!(config.queues.frame_depth, 2);
    }

    #[test]
    fn settings_parses_known_keys() {
        let text = "fpsLimiter=1\nboot11Path=/roms/boot11.bin\nboot9Path=/roms/boot9.bin\nnandPath=/roms/nand.bin\nkeyA=Z\n";
        let settings = Settings::parse(text);
        assert!(settings.fps_limiter);
        assert_eq!(settings.boot11_path, Some(PathBuf::from("/roms/boot11.bin")));
        assert_eq!(settings.extra.get("keyA"), Some(&"Z".to_string()));
    }

    #[test]
    fn settings_ignores_malformed_lines() {
        let text = "not-a-setting\n\nfpsLimiter=0\n";
        let settings = Settings::parse(text);
        assert!(!settings.fps_limiter);
        assert!(settings.extra.is_empty());
    }
}
