//! Frame-to-event simulator for event cameras.
//!
//! This crate turns a sequence of timestamped grayscale frames into the stream
//! of per-pixel brightness-change events an event camera would have produced.
//! Crossing times are interpolated between frames and every pixel honours a
//! refractory period.
//!
//! # Example
//!
//! ```no_run
//! use esim_core::EventSimulator;
//!
//! let simulator = EventSimulator::new(0.1, 0.1, 1e-4, 1e-3, true).unwrap();
//! let table = simulator
//!     .generate_from_folder("images/", "timestamps.txt")
//!     .unwrap();
//!
//! println!("Simulated {} events", table.len());
//! println!("Sensor: {}", table.resolution());
//! ```
//!
//! # Features
//!
//! - In-memory and image-directory ingestion through one normalization path
//! - Log or linear intensity response with configurable contrast thresholds
//! - Sub-frame crossing interpolation with residuals carried across frames
//! - Refractory period that delays or defers events instead of dropping them
//! - Per-row parallel updates with a deterministic output order
//! - CSV and binary output writers

pub mod config;
pub mod generator;
pub mod output;
pub mod pixel;
pub mod simulator;
pub mod source;
pub mod table;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigError, SimulatorConfig};
pub use generator::RunStats;
pub use output::{FieldOrder, OutputError};
pub use simulator::{EventSimulator, SimulateError};
pub use source::{ArraySource, FolderSource, Frame, FrameSequence, FrameSource, SourceError};
pub use table::EventTable;
pub use types::{ErrorKind, Event, Polarity, Resolution};
