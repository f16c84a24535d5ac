//! Core types for simulated event data.
//!
//! This module defines the event structure emitted by the simulator along
//! with the polarity and sensor geometry types shared by every stage.

use std::fmt;

/// Direction of a brightness change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Polarity {
    /// Brightness decrease (-1)
    Off = -1,
    /// Brightness increase (+1)
    On = 1,
}

impl Polarity {
    /// Returns the signed value of the polarity (`-1` or `+1`).
    #[inline]
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    /// Returns the polarity as a float, for dense numeric tables.
    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from(self.as_i8())
    }

    /// Parses a signed polarity value.
    #[inline]
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(Self::On),
            -1 => Some(Self::Off),
            _ => None,
        }
    }
}

/// A simulated change-detection event.
///
/// Each event records that the brightness at pixel `(x, y)` crossed one
/// contrast threshold at time `t` (seconds) in the direction given by
/// `polarity`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Column of the pixel
    pub x: u32,
    /// Row of the pixel
    pub y: u32,
    /// Timestamp in seconds
    pub t: f64,
    /// Direction of the crossing
    pub polarity: Polarity,
}

impl Event {
    /// Creates a new event.
    #[inline]
    pub fn new(x: u32, y: u32, t: f64, polarity: Polarity) -> Self {
        Self { x, y, t, polarity }
    }

    /// Returns the event as an `[x, y, t, p]` row.
    #[inline]
    pub fn to_row(&self) -> [f64; 4] {
        [
            f64::from(self.x),
            f64::from(self.y),
            self.t,
            self.polarity.as_f64(),
        ]
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.x,
            self.y,
            self.t,
            self.polarity.as_i8()
        )
    }
}

/// Sensor geometry in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Creates a new resolution.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered by this geometry.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Broad category of a failure, independent of the concrete error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid simulator parameters
    Config,
    /// Malformed frames or timestamps
    Input,
    /// Missing, unreadable or undecodable files
    Io,
}
