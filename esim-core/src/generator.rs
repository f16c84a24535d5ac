//! Threshold-crossing event generation.
//!
//! Between two sampled frames the level of every pixel is assumed to move
//! linearly in time. Each time it moves one contrast threshold past the
//! pixel's reference level an event is emitted at the interpolated crossing
//! time, subject to the refractory period:
//!
//! - a crossing closer than `refractory_period` to the previous event is
//!   delayed to the first free slot,
//! - a slot past the end of the frame pair defers the crossing to the next
//!   pair; the reference level still advances, so no change is lost,
//! - deferred crossings keep their order and are emitted before any new one.
//!
//! With a non-zero refractory period a pixel may therefore fire during a
//! frame pair whose two frames are identical: the events are crossings
//! deferred from an earlier pair, not new changes. Identical frames never
//! create crossings of their own, and with a zero refractory period nothing
//! is deferred, so identical frames are then fully silent.

use crate::config::SimulatorConfig;
use crate::pixel::{PixelGrid, PixelState};
use crate::source::{Frame, FrameSequence};
use crate::types::{Event, Polarity};
use rayon::prelude::*;
use std::ops::AddAssign;

/// Counters collected while generating events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Frames consumed, including the seeding frame
    pub frames: usize,
    /// Positive events emitted
    pub positive: usize,
    /// Negative events emitted
    pub negative: usize,
    /// Events emitted later than their interpolated crossing time
    pub delayed: usize,
    /// Crossings pushed out of their own frame pair
    pub deferred: usize,
    /// Crossings still deferred when the sequence ended
    pub unresolved: usize,
}

impl RunStats {
    /// Total number of emitted events.
    pub fn events(&self) -> usize {
        self.positive + self.negative
    }
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, other: Self) {
        self.frames += other.frames;
        self.positive += other.positive;
        self.negative += other.negative;
        self.delayed += other.delayed;
        self.deferred += other.deferred;
        self.unresolved += other.unresolved;
    }
}

/// Events and counters produced for one frame pair.
#[derive(Debug, Default)]
pub struct PairOutput {
    pub events: Vec<Event>,
    pub stats: RunStats,
}

impl PairOutput {
    #[inline]
    fn emit(&mut self, state: &mut PixelState, event: Event) {
        state.last_event_time = event.t;
        match event.polarity {
            Polarity::On => self.stats.positive += 1,
            Polarity::Off => self.stats.negative += 1,
        }
        self.events.push(event);
    }

    #[inline]
    fn defer(&mut self, state: &mut PixelState, polarity: Polarity) {
        state.deferred.push_back(polarity);
        self.stats.deferred += 1;
    }
}

/// One interval `[t_start, t_end]` between consecutive frames.
#[derive(Debug, Clone, Copy)]
pub struct FramePair<'a> {
    config: &'a SimulatorConfig,
    t_start: f64,
    t_end: f64,
}

impl<'a> FramePair<'a> {
    pub fn new(config: &'a SimulatorConfig, t_start: f64, t_end: f64) -> Self {
        Self {
            config,
            t_start,
            t_end,
        }
    }

    /// Advances every pixel of the grid across this interval.
    ///
    /// Rows are processed in parallel; the returned events are in row order
    /// but not time-sorted.
    pub fn process(
        &self,
        grid: &mut PixelGrid,
        start_levels: &[f64],
        end_levels: &[f64],
    ) -> PairOutput {
        let width = grid.resolution().width as usize;

        let rows: Vec<PairOutput> = grid
            .rows_mut()
            .zip(start_levels.par_chunks(width))
            .zip(end_levels.par_chunks(width))
            .enumerate()
            .map(|(y, ((states, start), end))| {
                let mut out = PairOutput::default();
                for (x, ((state, &l0), &l1)) in states.iter_mut().zip(start).zip(end).enumerate()
                {
                    self.advance(state, (x as u32, y as u32), l0, l1, &mut out);
                }
                out
            })
            .collect();

        let mut merged = PairOutput {
            events: Vec::with_capacity(rows.iter().map(|r| r.events.len()).sum()),
            stats: RunStats::default(),
        };
        for row in rows {
            merged.events.extend(row.events);
            merged.stats += row.stats;
        }
        merged
    }

    /// Advances a single pixel from `start_level` to `end_level`.
    pub fn advance(
        &self,
        state: &mut PixelState,
        (x, y): (u32, u32),
        start_level: f64,
        end_level: f64,
        out: &mut PairOutput,
    ) {
        let refractory = self.config.refractory_period;
        let cp = self.config.contrast_threshold_pos;
        let cn = self.config.contrast_threshold_neg;

        while let Some(&polarity) = state.deferred.front() {
            let slot = state.next_slot(refractory).max(self.t_start);
            if slot > self.t_end {
                break;
            }
            state.deferred.pop_front();
            out.stats.delayed += 1;
            out.emit(state, Event::new(x, y, slot, polarity));
        }

        let span = end_level - start_level;
        loop {
            let delta = end_level - state.reference_level;
            let (polarity, step) = if delta >= cp {
                (Polarity::On, cp)
            } else if delta <= -cn {
                (Polarity::Off, -cn)
            } else {
                break;
            };
            let crossing = state.reference_level + step;
            state.reference_level = crossing;

            if !state.deferred.is_empty() {
                out.defer(state, polarity);
                continue;
            }

            let candidate = self.crossing_time(start_level, span, crossing);
            let t = if candidate - state.last_event_time < refractory {
                state.next_slot(refractory)
            } else {
                candidate
            };

            if t > self.t_end {
                out.defer(state, polarity);
            } else {
                if t > candidate {
                    out.stats.delayed += 1;
                }
                out.emit(state, Event::new(x, y, t, polarity));
            }
        }
    }

    /// Time at which the linear level path reaches `crossing`.
    #[inline]
    fn crossing_time(&self, start_level: f64, span: f64, crossing: f64) -> f64 {
        let fraction = if span == 0.0 {
            1.0
        } else {
            ((crossing - start_level) / span).clamp(0.0, 1.0)
        };
        (self.t_start + fraction * (self.t_end - self.t_start)).min(self.t_end)
    }
}

/// Maps a frame to detector levels.
pub fn levels(frame: &Frame, config: &SimulatorConfig) -> Vec<f64> {
    frame
        .as_slice()
        .par_iter()
        .map(|&intensity| config.level(intensity))
        .collect()
}

/// Runs the detector over a whole sequence with a fresh pixel grid.
///
/// The first frame only seeds the grid. Frame pairs are processed strictly in
/// order since deferred crossings and residuals carry over.
pub fn simulate(sequence: &FrameSequence, config: &SimulatorConfig) -> (Vec<Event>, RunStats) {
    let mut frames = sequence.iter();
    let Some((first, t_first)) = frames.next() else {
        return (Vec::new(), RunStats::default());
    };

    let mut grid = PixelGrid::from_first_frame(first, t_first, config);
    let mut start_levels = levels(first, config);
    let mut t_start = t_first;

    let mut events = Vec::new();
    let mut stats = RunStats {
        frames: 1,
        ..RunStats::default()
    };

    for (pair_index, (frame, t_end)) in frames.enumerate() {
        let end_levels = levels(frame, config);
        let out = FramePair::new(config, t_start, t_end).process(
            &mut grid,
            &start_levels,
            &end_levels,
        );

        log::debug!(
            "frame pair {} [{:.6}s, {:.6}s]: {} events",
            pair_index,
            t_start,
            t_end,
            out.events.len()
        );

        events.extend(out.events);
        stats += out.stats;
        stats.frames += 1;
        start_levels = end_levels;
        t_start = t_end;
    }

    stats.unresolved = grid.deferred_count();
    if stats.unresolved > 0 {
        log::warn!(
            "{} crossings were still deferred at the end of the sequence",
            stats.unresolved
        );
    }

    (events, stats)
}
