//! Core (`Core`) Python binding.
//!
//! Exposes the host-facing entry point to Python: construct from boot
//! image paths and a config dict, step frame-by-frame, drive key/touch
//! input, and poll the framebuffer queue — the same surface `crates/cli`
//! drives directly from Rust.

use std::path::PathBuf;

use diarch_core::config::Config;
use diarch_core::sim::{BootImages, Core};
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;

use crate::conversion::py_dict_to_config;
use crate::frame::PyFrame;
use crate::stats::PyStats;

/// Python-exposed emulator session: wraps the core [`Core`] for stepping
/// and input from Python.
#[pyclass]
pub struct PyCore {
    inner: Core,
}

#[pymethods]
impl PyCore {
    /// Constructs a core from boot image paths and an optional config
    /// dict override (same schema [`Config`] deserializes).
    ///
    /// # Errors
    ///
    /// Raises `RuntimeError` if a required boot ROM is missing or
    /// unreadable.
    #[new]
    #[pyo3(signature = (boot11, boot9, nand=None, sd=None, config_dict=None))]
    fn new(
        py: Python<'_>,
        boot11: String,
        boot9: String,
        nand: Option<String>,
        sd: Option<String>,
        config_dict: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<Self> {
        let config = match config_dict {
            Some(dict) => py_dict_to_config(py, dict)?,
            None => Config::default(),
        };
        let images = BootImages {
            boot11: PathBuf::from(boot11),
            boot9: PathBuf::from(boot9),
            nand: nand.map(PathBuf::from),
            sd: sd.map(PathBuf::from),
        };
        let inner = Core::new(&images, config).map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(PyCore { inner })
    }

    /// Advances exactly one display frame's worth of scheduler work.
    fn run_frame(&mut self) {
        self.inner.run_frame();
    }

    /// Runs `count` frames, checking for Python signals (e.g. Ctrl-C)
    /// every frame so a long scripted run stays interruptible.
    fn run_frames(&mut self, py: Python<'_>, count: u64) -> PyResult<()> {
        for _ in 0..count {
            py.check_signals()?;
            self.inner.run_frame();
        }
        Ok(())
    }

    /// Pops the oldest unconsumed frame, if any.
    fn get_frame(&mut self) -> Option<PyFrame> {
        self.inner.get_frame().map(PyFrame::from)
    }

    fn press_key(&mut self, idx: u32) {
        self.inner.press_key(idx);
    }

    fn release_key(&mut self, idx: u32) {
        self.inner.release_key(idx);
    }

    fn press_screen(&mut self, x: f32, y: f32) {
        self.inner.press_screen(x, y);
    }

    fn release_screen(&mut self) {
        self.inner.release_screen();
    }

    /// Returns a snapshot of the current execution statistics.
    fn get_stats(&self) -> PyStats {
        PyStats::from(self.inner.stats.clone())
    }
}
