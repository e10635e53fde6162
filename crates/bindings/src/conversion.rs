//! Python dict <-> Rust configuration conversion.
//!
//! Converts a Python dict into the core `Config` type via JSON
//! serialization, so the CLI, Python scripting, and direct Rust callers
//! all parse the same schema.

use diarch_core::config::Config;
use pyo3::prelude::*;

/// Converts a Python dict to a [`Config`].
///
/// The dict is serialized to JSON and then deserialized. Keys must match
/// the Rust config structure (`cpu`, `gpu`, `queues`); missing keys fall
/// back to [`Config::default`]'s values via `serde(default)`.
///
/// # Arguments
///
/// * `py` - Python interpreter handle.
/// * `dict` - A Python dict of config overrides.
///
/// # Returns
///
/// The deserialized `Config`, or a `PyErr` if the dict is invalid.
pub fn py_dict_to_config(py: Python, dict: &Bound<'_, PyAny>) -> PyResult<Config> {
    let json = py.import("json")?;
    let dumps = json.getattr("dumps")?;
    let json_str_obj = dumps.call1((dict,))?;
    let json_str: String = json_str_obj.extract()?;

    let config: Config = serde_json::from_str(&json_str)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Invalid config: {e}")))?;

    Ok(config)
}
