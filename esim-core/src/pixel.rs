//! Per-pixel detector state.
//!
//! A [`PixelGrid`] lives for exactly one simulation run. It is seeded from the
//! first frame and then advanced frame pair by frame pair.

use crate::config::SimulatorConfig;
use crate::source::Frame;
use crate::types::{Polarity, Resolution};
use rayon::prelude::*;
use std::collections::VecDeque;

/// State of a single pixel's change detector.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelState {
    /// Level at which the last crossing was registered
    pub reference_level: f64,
    /// Time of the last emitted event (or the run start)
    pub last_event_time: f64,
    /// Crossings that could not be emitted inside their own frame pair
    pub deferred: VecDeque<Polarity>,
}

impl PixelState {
    /// Creates a state with no pending crossings.
    pub fn new(reference_level: f64, last_event_time: f64) -> Self {
        Self {
            reference_level,
            last_event_time,
            deferred: VecDeque::new(),
        }
    }

    /// Earliest time the pixel may fire again.
    ///
    /// The result is at least `refractory_period` after the last event when
    /// measured as `slot - last_event_time`, even where the plain sum rounds
    /// down.
    #[inline]
    pub fn next_slot(&self, refractory_period: f64) -> f64 {
        let mut slot = self.last_event_time + refractory_period;
        while slot - self.last_event_time < refractory_period {
            slot = next_up(slot);
        }
        slot
    }
}

/// Smallest `f64` greater than `x`, for finite `x`.
fn next_up(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Row-major grid of pixel states for one run.
#[derive(Debug, Clone)]
pub struct PixelGrid {
    resolution: Resolution,
    states: Vec<PixelState>,
}

impl PixelGrid {
    /// Seeds every pixel from the first frame. No events are produced here.
    pub fn from_first_frame(frame: &Frame, timestamp: f64, config: &SimulatorConfig) -> Self {
        let states = frame
            .as_slice()
            .par_iter()
            .map(|&intensity| PixelState::new(config.level(intensity), timestamp))
            .collect();
        Self {
            resolution: frame.resolution(),
            states,
        }
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the state of pixel `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> Option<&PixelState> {
        if x >= self.resolution.width || y >= self.resolution.height {
            return None;
        }
        self.states
            .get(y as usize * self.resolution.width as usize + x as usize)
    }

    /// Mutable row views, one per image row, for parallel updates.
    pub fn rows_mut(&mut self) -> rayon::slice::ChunksMut<'_, PixelState> {
        let width = self.resolution.width as usize;
        self.states.par_chunks_mut(width)
    }

    /// Number of crossings still waiting for an emission slot.
    pub fn deferred_count(&self) -> usize {
        self.states.iter().map(|s| s.deferred.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_seeded_from_first_frame() {
        let config = SimulatorConfig::new(0.1, 0.1, 0.0, 0.0, false).unwrap();
        let frame = Frame::new(2, 2, vec![0.0, 0.25, 0.5, 1.0]).unwrap();
        let grid = PixelGrid::from_first_frame(&frame, 1.5, &config);

        assert_eq!(grid.resolution(), Resolution::new(2, 2));
        let state = grid.get(1, 1).unwrap();
        assert_eq!(state.reference_level, 1.0);
        assert_eq!(state.last_event_time, 1.5);
        assert!(state.deferred.is_empty());
        assert_eq!(grid.get(1, 0).unwrap().reference_level, 0.25);
        assert!(grid.get(2, 0).is_none());
        assert_eq!(grid.deferred_count(), 0);
    }

    #[test]
    fn test_grid_uses_log_levels() {
        let config = SimulatorConfig::new(0.1, 0.1, 0.0, 1e-3, true).unwrap();
        let frame = Frame::new(1, 1, vec![0.0]).unwrap();
        let grid = PixelGrid::from_first_frame(&frame, 0.0, &config);
        let level = grid.get(0, 0).unwrap().reference_level;
        assert!((level - (1e-3f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_next_slot() {
        let state = PixelState::new(0.0, 2.0);
        assert_eq!(state.next_slot(0.5), 2.5);
        assert_eq!(state.next_slot(0.0), 2.0);
    }

    #[test]
    fn test_next_slot_never_short_of_refractory() {
        // 0.7 - 0.6 rounds to just below 0.1.
        let state = PixelState::new(0.0, 0.6);
        let slot = state.next_slot(0.1);
        assert!(slot - 0.6 >= 0.1);
        assert!(slot > 0.7);

        let mut last = 0.6;
        for _ in 0..50 {
            let slot = PixelState::new(0.0, last).next_slot(0.1);
            assert!(slot - last >= 0.1, "gap {} after {}", slot - last, last);
            last = slot;
        }
    }

    #[test]
    fn test_next_up() {
        assert!(next_up(1.0) > 1.0);
        assert_eq!(next_up(1.0), 1.0 + f64::EPSILON);
        assert!(next_up(-1.0) > -1.0);
        assert!(next_up(0.0) > 0.0);
        assert!(next_up(-0.0) > 0.0);
    }
}
