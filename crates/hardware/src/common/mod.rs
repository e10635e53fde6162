//! Common types shared by every component of the core.
//!
//! 1. **Address types:** strong wrappers for virtual and physical addresses.
//! 2. **Constants:** page sizes, boot vectors, table and queue depths.
//! 3. **Errors:** construction-time `EmuError`, exception vectors, and
//!    translation outcomes.

/// Virtual and physical address types.
pub mod addr;

/// System-wide constants.
pub mod constants;

/// Construction errors, exception vectors, and translation outcomes.
pub mod error;

pub use addr::{PAddr, VAddr};
pub use error::{EmuError, ExceptionVector, TranslationOutcome};

/// The kind of memory access being performed, used both by the MMU
/// (permission checks) and the GPU texture sampler (read-only).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    /// Instruction fetch.
    Fetch,
    /// Data load.
    Read,
    /// Data store.
    Write,
}
