//! Python bindings for the event simulator with numpy support.
//!
//! Exposes an `EventSimulator` class whose generation methods return the
//! event table as an `(N, 4)` float64 array with columns `x, y, t, p`.

use esim_core::{
    ConfigError, ErrorKind, EventSimulator, EventTable, Frame, SimulateError, SourceError,
};
use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

fn config_err(err: ConfigError) -> PyErr {
    PyValueError::new_err(format!("Invalid parameters: {}", err))
}

fn simulate_err(err: SimulateError) -> PyErr {
    match err.kind() {
        ErrorKind::Io => PyIOError::new_err(format!("Failed to read input: {}", err)),
        ErrorKind::Config | ErrorKind::Input => {
            PyValueError::new_err(format!("Invalid input: {}", err))
        }
    }
}

/// A 2-D image passed from Python: 8-bit samples or raw float intensities.
#[derive(FromPyObject)]
enum ImageArray<'py> {
    Gray8(PyReadonlyArray2<'py, u8>),
    Float(PyReadonlyArray2<'py, f64>),
}

impl ImageArray<'_> {
    /// 8-bit images are normalized by 255; float images are used as is and
    /// must be finite and non-negative.
    fn to_frame(&self) -> Result<Frame, SourceError> {
        match self {
            Self::Gray8(img) => {
                let view = img.as_array();
                let (height, width) = view.dim();
                let pixels: Vec<u8> = view.iter().copied().collect();
                Frame::from_luma8(width as u32, height as u32, &pixels)
            }
            Self::Float(img) => {
                let view = img.as_array();
                let (height, width) = view.dim();
                Frame::new(width as u32, height as u32, view.iter().copied().collect())
            }
        }
    }
}

/// Converts the event table to a dense `(N, 4)` array.
fn table_to_pyarray<'py>(py: Python<'py>, table: &EventTable) -> PyResult<&'py PyArray2<f64>> {
    let flat: Vec<f64> = table.to_rows().into_iter().flatten().collect();
    let array = Array2::from_shape_vec((table.len(), 4), flat)
        .map_err(|e| PyValueError::new_err(format!("Failed to build event array: {}", e)))?;
    Ok(array.into_pyarray(py))
}

/// Event-camera simulator.
///
/// Args:
///     contrast_threshold_pos: positive contrast threshold (Cp > 0)
///     contrast_threshold_neg: negative contrast threshold (Cn > 0)
///     refractory_period: minimum spacing of events per pixel, in seconds
///     log_eps: offset added before taking the logarithm
///     use_log: work on log intensity instead of raw intensity
///
/// Example:
///     >>> import esim_py
///     >>> esim = esim_py.EventSimulator(0.1, 0.1, 1e-4, 1e-3, True)
///     >>> events = esim.generateFromFolder("images/", "timestamps.txt")
///     >>> x, y, t, p = events.T
#[pyclass(name = "EventSimulator")]
pub struct PyEventSimulator {
    inner: EventSimulator,
}

#[pymethods]
impl PyEventSimulator {
    #[new]
    fn new(
        contrast_threshold_pos: f64,
        contrast_threshold_neg: f64,
        refractory_period: f64,
        log_eps: f64,
        use_log: bool,
    ) -> PyResult<Self> {
        let inner = EventSimulator::new(
            contrast_threshold_pos,
            contrast_threshold_neg,
            refractory_period,
            log_eps,
            use_log,
        )
        .map_err(config_err)?;
        Ok(Self { inner })
    }

    /// Replaces all simulation parameters at once.
    #[pyo3(name = "setParameters")]
    fn set_parameters(
        &mut self,
        contrast_threshold_pos: f64,
        contrast_threshold_neg: f64,
        refractory_period: f64,
        log_eps: f64,
        use_log: bool,
    ) -> PyResult<()> {
        self.inner
            .set_parameters(
                contrast_threshold_pos,
                contrast_threshold_neg,
                refractory_period,
                log_eps,
                use_log,
            )
            .map_err(config_err)
    }

    /// Simulates events from a list of 2-D images and their timestamps.
    ///
    /// Images are uint8 (normalized by 255) or float64 intensities.
    ///
    /// Returns:
    ///     numpy.ndarray: (N, 4) float64 array of x, y, t, p rows
    #[pyo3(name = "generateFromArray")]
    fn generate_from_array<'py>(
        &self,
        py: Python<'py>,
        images: Vec<ImageArray<'py>>,
        timestamps: PyReadonlyArray1<'py, f64>,
    ) -> PyResult<&'py PyArray2<f64>> {
        let frames = images
            .iter()
            .map(ImageArray::to_frame)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| simulate_err(e.into()))?;
        let timestamps = timestamps.as_array().to_vec();

        let simulator = &self.inner;
        let table = py
            .allow_threads(|| simulator.generate_from_array(frames, timestamps))
            .map_err(simulate_err)?;
        table_to_pyarray(py, &table)
    }

    /// Simulates events from an image directory and a timestamp file.
    ///
    /// Returns:
    ///     numpy.ndarray: (N, 4) float64 array of x, y, t, p rows
    #[pyo3(name = "generateFromFolder")]
    fn generate_from_folder<'py>(
        &self,
        py: Python<'py>,
        image_folder: &str,
        timestamps_file: &str,
    ) -> PyResult<&'py PyArray2<f64>> {
        let simulator = &self.inner;
        let table = py
            .allow_threads(|| simulator.generate_from_folder(image_folder, timestamps_file))
            .map_err(simulate_err)?;
        table_to_pyarray(py, &table)
    }

    fn __repr__(&self) -> String {
        let c = self.inner.config();
        format!(
            "EventSimulator(Cp={}, Cn={}, refractory_period={}, log_eps={}, use_log={})",
            c.contrast_threshold_pos,
            c.contrast_threshold_neg,
            c.refractory_period,
            c.log_eps,
            c.use_log
        )
    }
}

/// Event simulator module for Python.
#[pymodule]
fn esim_py(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyEventSimulator>()?;
    Ok(())
}
