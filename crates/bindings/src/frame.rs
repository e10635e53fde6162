//! Framebuffer Python binding.
//!
//! Exposes a completed [`Frame`] as raw RGBA8 bytes plus its dimensions,
//! for a scripted harness to hash, diff, or write out as an image.

use diarch_core::sim::Frame;
use pyo3::prelude::*;
use pyo3::types::PyBytes;

/// One popped framebuffer, ready for Python-side inspection.
#[pyclass]
pub struct PyFrame {
    inner: Frame,
}

#[pymethods]
impl PyFrame {
    #[getter]
    fn width(&self) -> usize {
        self.inner.width
    }
    #[getter]
    fn height(&self) -> usize {
        self.inner.height
    }

    /// Raw RGBA8 pixel bytes, `width * height * 4` long.
    fn pixels<'py>(&self, py: Python<'py>) -> Bound<'py, PyBytes> {
        PyBytes::new(py, &self.inner.pixels)
    }
}

impl From<Frame> for PyFrame {
    fn from(inner: Frame) -> Self {
        PyFrame { inner }
    }
}
