//! Event simulator engine.
//!
//! [`EventSimulator`] owns the parameter set. Every `generate*` call copies
//! the parameters, builds a fresh pixel grid and runs the generator, so
//! repeated runs on one engine never share detector state.

use crate::config::{ConfigError, SimulatorConfig};
use crate::generator;
use crate::source::{ArraySource, FolderSource, Frame, FrameSequence, FrameSource, SourceError};
use crate::table::EventTable;
use crate::types::ErrorKind;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

/// Errors that abort a simulation run.
#[derive(Error, Debug)]
pub enum SimulateError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("zero intensity at ({x}, {y}) in frame {frame} with log_eps = 0")]
    LogOfZero { frame: usize, x: u32, y: u32 },
}

impl SimulateError {
    /// Classifies the error as a configuration, input or I/O failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Source(err) => err.kind(),
            Self::LogOfZero { .. } => ErrorKind::Input,
        }
    }
}

/// Frame-to-event simulator.
#[derive(Debug, Clone, Default)]
pub struct EventSimulator {
    config: SimulatorConfig,
}

impl EventSimulator {
    /// Creates a simulator with validated parameters.
    pub fn new(
        contrast_threshold_pos: f64,
        contrast_threshold_neg: f64,
        refractory_period: f64,
        log_eps: f64,
        use_log: bool,
    ) -> Result<Self, ConfigError> {
        let config = SimulatorConfig::new(
            contrast_threshold_pos,
            contrast_threshold_neg,
            refractory_period,
            log_eps,
            use_log,
        )?;
        Ok(Self { config })
    }

    /// Creates a simulator from a prebuilt configuration.
    pub fn with_config(config: SimulatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Current parameters.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Replaces all parameters at once.
    ///
    /// On error the previous parameters stay in effect.
    pub fn set_parameters(
        &mut self,
        contrast_threshold_pos: f64,
        contrast_threshold_neg: f64,
        refractory_period: f64,
        log_eps: f64,
        use_log: bool,
    ) -> Result<(), ConfigError> {
        self.config = SimulatorConfig::new(
            contrast_threshold_pos,
            contrast_threshold_neg,
            refractory_period,
            log_eps,
            use_log,
        )?;
        Ok(())
    }

    /// Replaces all parameters with a prebuilt configuration.
    pub fn set_config(&mut self, config: SimulatorConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Simulates events for in-memory frames.
    pub fn generate_from_array(
        &self,
        frames: Vec<Frame>,
        timestamps: Vec<f64>,
    ) -> Result<EventTable, SimulateError> {
        self.generate(ArraySource::new(frames, timestamps))
    }

    /// Simulates events for an image directory and its timestamp file.
    pub fn generate_from_folder<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        image_dir: P,
        timestamps_file: Q,
    ) -> Result<EventTable, SimulateError> {
        self.generate(FolderSource::new(image_dir, timestamps_file))
    }

    /// Simulates events for any frame source.
    pub fn generate<S: FrameSource>(&self, source: S) -> Result<EventTable, SimulateError> {
        let config = self.config;
        let sequence = source.into_sequence()?;
        self.run(&sequence, &config)
    }

    fn run(
        &self,
        sequence: &FrameSequence,
        config: &SimulatorConfig,
    ) -> Result<EventTable, SimulateError> {
        config.validate()?;
        if config.use_log && config.log_eps == 0.0 {
            check_no_zero_intensity(sequence)?;
        }

        let start = Instant::now();
        let (events, stats) = generator::simulate(sequence, config);
        let table = EventTable::assemble(events, sequence.resolution(), stats);

        log::info!(
            "simulated {} events ({} on, {} off) from {} frames at {} in {:.3}s",
            table.len(),
            stats.positive,
            stats.negative,
            stats.frames,
            sequence.resolution(),
            start.elapsed().as_secs_f64()
        );

        Ok(table)
    }
}

fn check_no_zero_intensity(sequence: &FrameSequence) -> Result<(), SimulateError> {
    for (frame_index, frame) in sequence.frames().iter().enumerate() {
        if let Some(idx) = frame.as_slice().iter().position(|&v| v == 0.0) {
            let width = frame.width() as usize;
            return Err(SimulateError::LogOfZero {
                frame: frame_index,
                x: (idx % width) as u32,
                y: (idx / width) as u32,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Polarity;

    fn constant(width: u32, height: u32, value: f64) -> Frame {
        Frame::new(width, height, vec![value; (width * height) as usize]).unwrap()
    }

    #[test]
    fn test_new_validates() {
        assert!(EventSimulator::new(0.1, 0.1, 1e-4, 1e-3, true).is_ok());
        assert!(EventSimulator::new(0.0, 0.1, 1e-4, 1e-3, true).is_err());
        assert!(EventSimulator::new(0.1, 0.0, 1e-4, 1e-3, true).is_err());
        assert!(EventSimulator::new(0.1, 0.1, -1e-4, 1e-3, true).is_err());
    }

    #[test]
    fn test_set_parameters_keeps_old_config_on_error() {
        let mut sim = EventSimulator::new(0.1, 0.2, 0.0, 1e-3, true).unwrap();
        assert!(sim.set_parameters(-1.0, 0.2, 0.0, 1e-3, true).is_err());
        assert_eq!(sim.config().contrast_threshold_pos, 0.1);

        sim.set_parameters(0.3, 0.4, 1e-3, 1e-2, false).unwrap();
        assert_eq!(
            *sim.config(),
            SimulatorConfig::new(0.3, 0.4, 1e-3, 1e-2, false).unwrap()
        );
    }

    #[test]
    fn test_length_mismatch_is_input_error() {
        let sim = EventSimulator::default();
        let err = sim
            .generate_from_array(vec![constant(2, 2, 0.5); 3], vec![0.0, 1.0])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_log_of_zero_rejected() {
        let sim = EventSimulator::new(0.1, 0.1, 0.0, 0.0, true).unwrap();
        let frames = vec![
            constant(2, 2, 0.5),
            Frame::new(2, 2, vec![0.5, 0.5, 0.0, 0.5]).unwrap(),
        ];
        let err = sim.generate_from_array(frames, vec![0.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            SimulateError::LogOfZero {
                frame: 1,
                x: 0,
                y: 1
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_zero_intensity_with_eps_is_fine() {
        let sim = EventSimulator::new(0.5, 0.5, 0.0, 1e-3, true).unwrap();
        let frames = vec![constant(1, 1, 0.0), constant(1, 1, 1.0)];
        let table = sim.generate_from_array(frames, vec![0.0, 1.0]).unwrap();
        // ln(1.001) - ln(0.001) ~ 6.9 -> 13 crossings of 0.5
        assert_eq!(table.len(), 13);
        assert!(table.iter().all(|e| e.polarity == Polarity::On));
    }

    #[test]
    fn test_float_frames_match_luma8() {
        let sim = EventSimulator::default();
        let pixels: [[u8; 4]; 3] = [[0, 40, 90, 255], [30, 60, 90, 200], [90, 10, 250, 5]];
        let bytes: Vec<Frame> = pixels
            .iter()
            .map(|p| Frame::from_luma8(2, 2, p).unwrap())
            .collect();
        let floats: Vec<Frame> = pixels
            .iter()
            .map(|p| {
                let samples = p.iter().map(|&v| f64::from(v) / 255.0).collect();
                Frame::new(2, 2, samples).unwrap()
            })
            .collect();
        let timestamps = vec![0.0, 0.01, 0.02];

        let a = sim.generate_from_array(bytes, timestamps.clone()).unwrap();
        let b = sim.generate_from_array(floats, timestamps).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_float_frame_is_input_error() {
        let err = Frame::new(2, 1, vec![0.5, f64::NAN]).unwrap_err();
        assert_eq!(SimulateError::from(err).kind(), ErrorKind::Input);
    }

    #[test]
    fn test_runs_do_not_share_state() {
        let sim = EventSimulator::new(0.1, 0.1, 0.0, 0.0, false).unwrap();
        let frames = vec![constant(2, 1, 0.0), constant(2, 1, 0.35)];
        let first = sim
            .generate_from_array(frames.clone(), vec![0.0, 1.0])
            .unwrap();
        let second = sim.generate_from_array(frames, vec![0.0, 1.0]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
    }

    #[test]
    fn test_reconfigure_between_runs() {
        let mut sim = EventSimulator::new(0.1, 0.1, 0.0, 0.0, false).unwrap();
        let frames = vec![constant(1, 1, 0.0), constant(1, 1, 0.55)];
        let fine = sim
            .generate_from_array(frames.clone(), vec![0.0, 1.0])
            .unwrap();

        sim.set_parameters(0.25, 0.25, 0.0, 0.0, false).unwrap();
        let coarse = sim.generate_from_array(frames, vec![0.0, 1.0]).unwrap();

        assert_eq!(fine.len(), 5);
        assert_eq!(coarse.len(), 2);
    }
}
