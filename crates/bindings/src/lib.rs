//! Python bindings for the diarch emulator core.
//!
//! This crate exposes [`diarch_core::sim::Core`] to Python via PyO3, so
//! regression and compatibility suites can drive `run_frame` and input
//! frame-by-frame the same way the CLI and a real host frontend do. It
//! provides:
//! 1. **Core:** `PyCore` for construction, frame stepping, and input.
//! 2. **Statistics:** `PyStats` for execution counters.
//! 3. **Frames:** `PyFrame` for popped RGBA8 framebuffers.
//! 4. **Utilities:** a version string.

use pyo3::prelude::*;

/// Python dict to Rust `Config` conversion.
pub mod conversion;
/// Core binding (`PyCore`).
pub mod core;
/// Framebuffer binding (`PyFrame`).
pub mod frame;
/// Statistics binding (`PyStats`).
pub mod stats;
/// Utility functions (e.g., version).
pub mod utils;

/// Registers all emulator classes and functions onto the given Python
/// module.
///
/// Called from the `#[pymodule]` entry point to expose `PyCore`,
/// `PyStats`, `PyFrame`, and `version`.
///
/// # Errors
///
/// Returns a `PyErr` if class or function registration fails.
pub fn register_emulator_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<core::PyCore>()?;
    m.add_class::<stats::PyStats>()?;
    m.add_class::<frame::PyFrame>()?;

    m.add_function(wrap_pyfunction!(utils::version, m)?)?;

    Ok(())
}

#[pymodule]
fn diarch_emulator(m: &Bound<'_, PyModule>) -> PyResult<()> {
    register_emulator_module(m)?;
    Ok(())
}
