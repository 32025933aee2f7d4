//! Python bindings, built with the `python` feature.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyTuple;
use std::collections::BTreeMap;

use crate::error::RegionError;
use crate::grammar::{parse_line, Statement};
use crate::shape::Shape;

impl From<RegionError> for PyErr {
    fn from(err: RegionError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[pyclass(name = "Shape")]
#[derive(Debug, Clone)]
pub struct PyShape {
    inner: Shape,
}

#[pymethods]
impl PyShape {
    #[getter]
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    #[getter]
    fn coord_list(&self) -> Vec<f64> {
        self.inner.coord_list().to_vec()
    }

    #[getter]
    fn coord_format(&self) -> &'static str {
        self.inner.coord_format().name()
    }

    #[getter]
    fn exclude(&self) -> bool {
        self.inner.exclude()
    }

    #[getter]
    fn comment(&self) -> Option<String> {
        self.inner.comment().map(str::to_string)
    }

    #[getter]
    fn continued(&self) -> bool {
        self.inner.continued()
    }

    #[getter]
    fn flags(&self) -> Vec<String> {
        self.inner.attr().flags().to_vec()
    }

    /// Values as they would be written back, e.g. `dashlist` as `(8)(3)`.
    #[getter]
    fn attributes(&self) -> BTreeMap<String, String> {
        self.inner
            .attr()
            .values()
            .iter()
            .map(|(key, value)| (key.clone(), value.as_str().map_or_else(|| value.to_string(), str::to_string)))
            .collect()
    }

    #[getter]
    fn tags(&self) -> Vec<String> {
        self.inner.attr().tags().iter().cloned().collect()
    }

    fn __repr__(&self) -> String {
        format!("Shape : {}", self.inner)
    }
}

/// Parses region text into shapes with resolved attributes and frames.
#[pyfunction]
fn parse_region(text: &str) -> Vec<PyShape> {
    crate::parse(text)
        .iter()
        .map(|shape| PyShape { inner: shape.clone() })
        .collect()
}

/// Statements of one line as `(frame, shape, global, comment)` tuples.
#[pyfunction]
fn parse_region_line(py: Python<'_>, line: &str) -> PyResult<Vec<PyObject>> {
    let parsed = parse_line(line)?;
    parsed
        .into_statements()
        .into_iter()
        .map(|statement| -> PyResult<PyObject> {
            let elements: [PyObject; 4] = match statement {
                Statement::Frame(frame) => [frame.name().into_py(py), py.None(), py.None(), py.None()],
                Statement::Shape(shape) => {
                    let py_shape = Py::new(py, PyShape { inner: shape })?;
                    [py.None(), py_shape.into_py(py), py.None(), py.None()]
                }
                Statement::Global(text) => [py.None(), py.None(), text.into_py(py), py.None()],
                Statement::Comment(text) => [py.None(), py.None(), py.None(), text.into_py(py)],
            };
            Ok(PyTuple::new_bound(py, &elements).into_py(py))
        })
        .collect()
}

/// Rasterizes image-coordinate region text onto an `(ny, nx)` grid.
#[pyfunction]
#[pyo3(signature = (text, ny, nx, origin = 1.0))]
fn region_mask(text: &str, ny: usize, nx: usize, origin: f64) -> PyResult<Vec<Vec<bool>>> {
    let mask = crate::get_mask(&crate::parse(text), (ny, nx), origin)?;
    Ok(mask.rows().map(<[bool]>::to_vec).collect())
}

#[pymodule]
fn rusty_region_filter(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(parse_region, m)?)?;
    m.add_function(wrap_pyfunction!(parse_region_line, m)?)?;
    m.add_function(wrap_pyfunction!(region_mask, m)?)?;
    m.add_class::<PyShape>()?;
    Ok(())
}
