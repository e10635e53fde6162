//! Utility functions exposed to Python.
//!
//! Provides version and other helpers for the `diarch_emulator` module.

use pyo3::prelude::*;

/// Returns the emulator core's version string (e.g., for scripting or
/// diagnostics).
#[pyfunction]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
