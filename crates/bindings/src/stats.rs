//! Statistics Python binding.
//!
//! Exposes [`CoreStats`] to Python: getters for opcode, GPU, and
//! scheduler counters, plus `to_dict` for JSON-serializable export to a
//! scripted regression harness.

use diarch_core::stats::CoreStats;
use pyo3::prelude::*;

/// Python-exposed statistics: wraps [`CoreStats`] for read-only access.
#[pyclass]
#[derive(Clone)]
pub struct PyStats {
    pub inner: CoreStats,
}

#[pymethods]
impl PyStats {
    #[getter]
    fn total_opcodes(&self) -> u64 {
        self.inner.total_opcodes()
    }
    #[getter]
    fn opcodes_per_sec(&self) -> f64 {
        self.inner.opcodes_per_sec()
    }
    #[getter]
    fn opcodes_retired(&self) -> [u64; 5] {
        self.inner.opcodes_retired
    }
    #[getter]
    fn gpu_commands_processed(&self) -> u64 {
        self.inner.gpu_commands_processed
    }
    #[getter]
    fn vertices_shaded(&self) -> u64 {
        self.inner.vertices_shaded
    }
    #[getter]
    fn triangles_rasterized(&self) -> u64 {
        self.inner.triangles_rasterized
    }
    #[getter]
    fn events_fired(&self) -> u64 {
        self.inner.events_fired
    }
    #[getter]
    fn cycle_rebases(&self) -> u64 {
        self.inner.cycle_rebases
    }
    #[getter]
    fn frames_completed(&self) -> u64 {
        self.inner.frames_completed
    }

    /// Export all stats as a Python dict (JSON-serializable) for
    /// reproducible, scriptable regression runs.
    fn to_dict(&self, py: Python<'_>) -> PyResult<Py<pyo3::types::PyDict>> {
        let d = pyo3::types::PyDict::new(py);
        let s = &self.inner;
        d.set_item("total_opcodes", s.total_opcodes())?;
        d.set_item("opcodes_per_sec", s.opcodes_per_sec())?;
        d.set_item("opcodes_retired", s.opcodes_retired)?;
        d.set_item("gpu_commands_processed", s.gpu_commands_processed)?;
        d.set_item("vertices_shaded", s.vertices_shaded)?;
        d.set_item("triangles_rasterized", s.triangles_rasterized)?;
        d.set_item("events_fired", s.events_fired)?;
        d.set_item("cycle_rebases", s.cycle_rebases)?;
        d.set_item("frames_completed", s.frames_completed)?;
        Ok(d.into())
    }
}

impl From<CoreStats> for PyStats {
    fn from(inner: CoreStats) -> Self {
        PyStats { inner }
    }
}
