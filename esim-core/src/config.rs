//! Simulation parameters.
//!
//! A [`SimulatorConfig`] is validated as a whole before it is installed on an
//! engine, so a run never sees a half-updated parameter set.

use thiserror::Error;

/// Errors raised by an invalid parameter set.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositiveThreshold { name: &'static str, value: f64 },

    #[error("refractory period must be non-negative, got {0}")]
    NegativeRefractoryPeriod(f64),

    #[error("log epsilon must be non-negative, got {0}")]
    NegativeLogEps(f64),

    #[error("{0} must be finite")]
    NonFinite(&'static str),
}

/// Parameters of the per-pixel change detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    /// Positive contrast threshold (Cp)
    pub contrast_threshold_pos: f64,
    /// Negative contrast threshold (Cn)
    pub contrast_threshold_neg: f64,
    /// Minimum spacing between two events of one pixel, in seconds
    pub refractory_period: f64,
    /// Offset added before taking the logarithm
    pub log_eps: f64,
    /// Work on `ln(I + log_eps)` instead of raw intensity
    pub use_log: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            contrast_threshold_pos: 0.1,
            contrast_threshold_neg: 0.1,
            refractory_period: 1e-4,
            log_eps: 1e-3,
            use_log: true,
        }
    }
}

impl SimulatorConfig {
    /// Creates and validates a configuration.
    pub fn new(
        contrast_threshold_pos: f64,
        contrast_threshold_neg: f64,
        refractory_period: f64,
        log_eps: f64,
        use_log: bool,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            contrast_threshold_pos,
            contrast_threshold_neg,
            refractory_period,
            log_eps,
            use_log,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every parameter against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("contrast_threshold_pos", self.contrast_threshold_pos),
            ("contrast_threshold_neg", self.contrast_threshold_neg),
            ("refractory_period", self.refractory_period),
            ("log_eps", self.log_eps),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite(name));
            }
        }

        if self.contrast_threshold_pos <= 0.0 {
            return Err(ConfigError::NonPositiveThreshold {
                name: "contrast_threshold_pos",
                value: self.contrast_threshold_pos,
            });
        }
        if self.contrast_threshold_neg <= 0.0 {
            return Err(ConfigError::NonPositiveThreshold {
                name: "contrast_threshold_neg",
                value: self.contrast_threshold_neg,
            });
        }
        if self.refractory_period < 0.0 {
            return Err(ConfigError::NegativeRefractoryPeriod(
                self.refractory_period,
            ));
        }
        if self.log_eps < 0.0 {
            return Err(ConfigError::NegativeLogEps(self.log_eps));
        }
        Ok(())
    }

    /// Maps an intensity sample to the level the detector compares against.
    #[inline]
    pub fn level(&self, intensity: f64) -> f64 {
        if self.use_log {
            (intensity + self.log_eps).ln()
        } else {
            intensity
        }
    }
}
