//! Configuration errors and translation/exception result types.
//!
//! Per the core's error-handling policy, only construction-time failures
//! (missing or unreadable boot images) are ever propagated as a `Result`.
//! Everything a running core encounters — an unsupported page-table
//! descriptor, an unknown opcode, an unmapped MMIO address — is logged via
//! `tracing` and handled with a best-effort fallback so `run_frame` never
//! returns an error.

use std::path::PathBuf;

/// Errors that can occur while constructing a [`crate::sim::Core`].
///
/// These are the only errors this crate ever returns from a public API;
/// anomalies encountered while a core is already running are logged, not
/// raised (see the module documentation).
#[derive(thiserror::Error, Debug)]
pub enum EmuError {
    /// A required boot ROM image could not be found at the configured path.
    #[error("missing boot ROM for {cpu}: {path}")]
    MissingBootRom {
        /// Which boot ROM was missing (`"A11"`, `"A9"`, or `"NAND"`).
        cpu: &'static str,
        /// The configured path that was not found.
        path: PathBuf,
    },

    /// A boot image existed but could not be read (permissions, I/O error,
    /// or it was shorter than the region it is meant to back).
    #[error("could not read image {path}: {source}")]
    UnreadableImage {
        /// The path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Exception vectors recognized by [`crate::cpu::CpuCore::exception`].
///
/// Each variant carries the vector's byte offset from `except_addr` and
/// determines the CPU mode entered and the LR adjustment applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionVector {
    /// Undefined instruction, offset `0x04`.
    Undefined,
    /// Software interrupt (`SVC`), offset `0x08`.
    SoftwareInterrupt,
    /// Prefetch abort, offset `0x0C`.
    PrefetchAbort,
    /// Data abort, offset `0x10`.
    DataAbort,
    /// IRQ, offset `0x18`.
    Irq,
    /// FIQ, offset `0x1C`.
    Fiq,
}

impl ExceptionVector {
    /// Byte offset of this vector from `except_addr`.
    #[must_use]
    pub fn offset(self) -> u32 {
        match self {
            ExceptionVector::Undefined => 0x04,
            ExceptionVector::SoftwareInterrupt => 0x08,
            ExceptionVector::PrefetchAbort => 0x0C,
            ExceptionVector::DataAbort => 0x10,
            ExceptionVector::Irq => 0x18,
            ExceptionVector::Fiq => 0x1C,
        }
    }

    /// Fixed cycle cost of taking this exception (3 cycles).
    #[must_use]
    pub fn cycles(self) -> u64 {
        3
    }
}

/// Outcome of a single-level address translation attempt.
///
/// Mirrors the shape of a hardware page-table-walk result: either a
/// physical address was produced, or a fault occurred and the walker
/// fell back to a best-effort pass-through.
#[derive(Clone, Copy, Debug)]
pub struct TranslationOutcome {
    /// The translated (or pass-through) physical address.
    pub paddr: crate::common::addr::PAddr,
    /// Set when the descriptor encoding was not one of the four supported
    /// forms (coarse / section / supersection / large-page).
    pub faulted: bool,
}

impl TranslationOutcome {
    /// A translation that resolved cleanly.
    #[must_use]
    pub fn ok(paddr: crate::common::addr::PAddr) -> Self {
        Self {
            paddr,
            faulted: false,
        }
    }

    /// A translation that could not be resolved; `paddr` is the
    /// best-effort pass-through address used so execution can continue.
    #[must_use]
    pub fn fault(paddr: crate::common::addr::PAddr) -> Self {
        Self {
            paddr,
            faulted: true,
        }
    }
}
