//! Frame ingestion.
//!
//! Both ingestion forms (in-memory frames and an image directory with a
//! timestamp file) are normalized into a single [`FrameSequence`] before the
//! generator runs. Every source goes through [`FrameSequence::new`], so two
//! sources with the same logical content produce identical sequences.

use crate::types::{ErrorKind, Resolution};
use image::DynamicImage;
use rayon::prelude::*;
use std::fs;
use std::num::ParseFloatError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions accepted when scanning an image directory.
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm", "ppm", "pnm",
];

/// Errors that can occur while building a frame sequence.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("frame count ({frames}) does not match timestamp count ({timestamps})")]
    LengthMismatch { frames: usize, timestamps: usize },

    #[error("at least two frames are required, got {0}")]
    TooFewFrames(usize),

    #[error("timestamp {index} is not finite ({value})")]
    NonFiniteTimestamp { index: usize, value: f64 },

    #[error("timestamps must be strictly increasing: t[{index}] = {current} follows {previous}")]
    NonIncreasingTimestamp {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("frame must have non-zero dimensions, got {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },

    #[error("frame buffer holds {len} samples, expected {width}x{height}")]
    BufferSize { width: u32, height: u32, len: usize },

    #[error("invalid intensity {value} at ({x}, {y})")]
    InvalidIntensity { x: u32, y: u32, value: f64 },

    #[error("frame {index} is {found}, expected {expected}")]
    FrameDimensions {
        index: usize,
        expected: Resolution,
        found: Resolution,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("image {path} is {found}, expected {expected}")]
    ImageDimensions {
        path: PathBuf,
        expected: Resolution,
        found: Resolution,
    },

    #[error("invalid timestamp on line {line}: {value:?}")]
    Timestamp {
        line: usize,
        value: String,
        source: ParseFloatError,
    },
}

impl SourceError {
    /// Classifies the error as an input-shape or I/O failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. }
            | Self::Decode { .. }
            | Self::ImageDimensions { .. }
            | Self::Timestamp { .. } => ErrorKind::Io,
            _ => ErrorKind::Input,
        }
    }
}

/// A grayscale intensity frame.
///
/// Samples are stored row-major as non-negative `f64` values. Integer
/// sources are normalized to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<f64>,
}

impl Frame {
    /// Creates a frame from row-major intensity samples.
    ///
    /// Every sample must be finite and non-negative.
    pub fn new(width: u32, height: u32, data: Vec<f64>) -> Result<Self, SourceError> {
        check_buffer(width, height, data.len())?;
        if let Some(idx) = data.iter().position(|v| !v.is_finite() || *v < 0.0) {
            return Err(SourceError::InvalidIntensity {
                x: (idx % width as usize) as u32,
                y: (idx / width as usize) as u32,
                value: data[idx],
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Creates a frame from 8-bit grayscale samples, normalized by 255.
    pub fn from_luma8(width: u32, height: u32, pixels: &[u8]) -> Result<Self, SourceError> {
        check_buffer(width, height, pixels.len())?;
        let scale = f64::from(u8::MAX);
        Ok(Self {
            width,
            height,
            data: pixels.iter().map(|&p| f64::from(p) / scale).collect(),
        })
    }

    /// Creates a frame from 16-bit grayscale samples, normalized by 65535.
    pub fn from_luma16(width: u32, height: u32, pixels: &[u16]) -> Result<Self, SourceError> {
        check_buffer(width, height, pixels.len())?;
        let scale = f64::from(u16::MAX);
        Ok(Self {
            width,
            height,
            data: pixels.iter().map(|&p| f64::from(p) / scale).collect(),
        })
    }

    /// Converts a decoded image to a frame.
    ///
    /// Grayscale images are taken as is. Color images are reduced with the
    /// BT.601 fixed-point weights ([`bt601_luma8`]), ignoring alpha. 16-bit
    /// images keep their depth.
    pub fn from_image(img: &DynamicImage) -> Result<Self, SourceError> {
        match img {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => {
                let gray = img.to_luma8();
                Self::from_luma8(gray.width(), gray.height(), gray.as_raw())
            }
            DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
                let gray = img.to_luma16();
                Self::from_luma16(gray.width(), gray.height(), gray.as_raw())
            }
            DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => {
                let rgb = img.to_rgb16();
                let gray: Vec<u16> = rgb
                    .pixels()
                    .map(|p| bt601_luma16(p.0[0], p.0[1], p.0[2]))
                    .collect();
                Self::from_luma16(rgb.width(), rgb.height(), &gray)
            }
            _ => {
                let rgb = img.to_rgb8();
                let gray: Vec<u8> = rgb
                    .pixels()
                    .map(|p| bt601_luma8(p.0[0], p.0[1], p.0[2]))
                    .collect();
                Self::from_luma8(rgb.width(), rgb.height(), &gray)
            }
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Row-major intensity samples.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Returns the intensity at `(x, y)`, if inside the frame.
    pub fn get(&self, x: u32, y: u32) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

// BT.601 weights scaled by 2^14, rounded: 0.299, 0.587, 0.114.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// BT.601 luma of an 8-bit RGB sample, rounded to nearest.
#[inline]
pub fn bt601_luma8(r: u8, g: u8, b: u8) -> u8 {
    let y = u32::from(r) * LUMA_R + u32::from(g) * LUMA_G + u32::from(b) * LUMA_B;
    ((y + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// BT.601 luma of a 16-bit RGB sample, rounded to nearest.
#[inline]
pub fn bt601_luma16(r: u16, g: u16, b: u16) -> u16 {
    let y = u64::from(r) * u64::from(LUMA_R)
        + u64::from(g) * u64::from(LUMA_G)
        + u64::from(b) * u64::from(LUMA_B);
    ((y + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u16
}

fn check_buffer(width: u32, height: u32, len: usize) -> Result<(), SourceError> {
    if width == 0 || height == 0 {
        return Err(SourceError::EmptyFrame { width, height });
    }
    if len != width as usize * height as usize {
        return Err(SourceError::BufferSize { width, height, len });
    }
    Ok(())
}

/// A validated, time-ordered sequence of equally sized frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
    timestamps: Vec<f64>,
    resolution: Resolution,
}

impl FrameSequence {
    /// Validates and pairs frames with their timestamps.
    pub fn new(frames: Vec<Frame>, timestamps: Vec<f64>) -> Result<Self, SourceError> {
        check_lengths(frames.len(), timestamps.len())?;
        validate_timestamps(&timestamps)?;

        let resolution = match frames.first() {
            Some(first) => first.resolution(),
            None => return Err(SourceError::TooFewFrames(0)),
        };
        for (index, frame) in frames.iter().enumerate().skip(1) {
            if frame.resolution() != resolution {
                return Err(SourceError::FrameDimensions {
                    index,
                    expected: resolution,
                    found: frame.resolution(),
                });
            }
        }

        Ok(Self {
            frames,
            timestamps,
            resolution,
        })
    }

    /// Number of frames (always at least two).
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always `false`; a valid sequence holds at least two frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Iterates over `(frame, timestamp)` in time order.
    pub fn iter(&self) -> impl Iterator<Item = (&Frame, f64)> {
        self.frames.iter().zip(self.timestamps.iter().copied())
    }
}

fn check_lengths(frames: usize, timestamps: usize) -> Result<(), SourceError> {
    if frames != timestamps {
        return Err(SourceError::LengthMismatch { frames, timestamps });
    }
    if frames < 2 {
        return Err(SourceError::TooFewFrames(frames));
    }
    Ok(())
}

/// Checks that timestamps are finite and strictly increasing.
pub fn validate_timestamps(timestamps: &[f64]) -> Result<(), SourceError> {
    for (index, &value) in timestamps.iter().enumerate() {
        if !value.is_finite() {
            return Err(SourceError::NonFiniteTimestamp { index, value });
        }
    }
    for (index, pair) in timestamps.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(SourceError::NonIncreasingTimestamp {
                index: index + 1,
                previous: pair[0],
                current: pair[1],
            });
        }
    }
    Ok(())
}

/// Anything that can be normalized into a [`FrameSequence`].
pub trait FrameSource {
    /// Consumes the source and produces the validated sequence.
    fn into_sequence(self) -> Result<FrameSequence, SourceError>;
}

impl FrameSource for FrameSequence {
    fn into_sequence(self) -> Result<FrameSequence, SourceError> {
        Ok(self)
    }
}

/// Frames and timestamps already held in memory.
#[derive(Debug, Clone)]
pub struct ArraySource {
    pub frames: Vec<Frame>,
    pub timestamps: Vec<f64>,
}

impl ArraySource {
    pub fn new(frames: Vec<Frame>, timestamps: Vec<f64>) -> Self {
        Self { frames, timestamps }
    }
}

impl FrameSource for ArraySource {
    fn into_sequence(self) -> Result<FrameSequence, SourceError> {
        FrameSequence::new(self.frames, self.timestamps)
    }
}

/// A directory of sequentially numbered images plus a timestamp file.
#[derive(Debug, Clone)]
pub struct FolderSource {
    pub image_dir: PathBuf,
    pub timestamps_file: PathBuf,
}

impl FolderSource {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(image_dir: P, timestamps_file: Q) -> Self {
        Self {
            image_dir: image_dir.as_ref().to_path_buf(),
            timestamps_file: timestamps_file.as_ref().to_path_buf(),
        }
    }
}

impl FrameSource for FolderSource {
    fn into_sequence(self) -> Result<FrameSequence, SourceError> {
        let timestamps = read_timestamps(&self.timestamps_file)?;
        let paths = list_image_files(&self.image_dir)?;

        // Shape checks first, so a bad folder fails before decoding anything.
        check_lengths(paths.len(), timestamps.len())?;
        validate_timestamps(&timestamps)?;

        let frames = paths
            .par_iter()
            .map(load_frame)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(first) = frames.first() {
            let expected = first.resolution();
            for (path, frame) in paths.iter().zip(&frames).skip(1) {
                if frame.resolution() != expected {
                    return Err(SourceError::ImageDimensions {
                        path: path.clone(),
                        expected,
                        found: frame.resolution(),
                    });
                }
            }
        }

        log::debug!(
            "loaded {} frames from {}",
            frames.len(),
            self.image_dir.display()
        );

        FrameSequence::new(frames, timestamps)
    }
}

/// Reads a newline-separated timestamp file (seconds, blank lines ignored).
pub fn read_timestamps<P: AsRef<Path>>(path: P) -> Result<Vec<f64>, SourceError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_timestamps(&contents)
}

/// Parses timestamp text, one value per line.
pub fn parse_timestamps(contents: &str) -> Result<Vec<f64>, SourceError> {
    contents
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, value)| {
            value.parse::<f64>().map_err(|source| SourceError::Timestamp {
                line,
                value: value.to_string(),
                source,
            })
        })
        .collect()
}

/// Lists the image files of a directory in frame order.
///
/// Files are ordered by the last run of digits in their stem
/// (`image_00012.png` is frame 12), then by file name. Files without a
/// frame number sort after every numbered frame.
pub fn list_image_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, SourceError> {
    let dir = dir.as_ref();
    let io_err = |source: std::io::Error| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }

    paths.sort_by_cached_key(|path| {
        let index = frame_index(path);
        (index.is_none(), index, path.file_name().map(|n| n.to_os_string()))
    });
    Ok(paths)
}

/// Decodes one image file into a frame.
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<Frame, SourceError> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|err| match err {
        image::ImageError::IoError(source) => SourceError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => SourceError::Decode {
            path: path.to_path_buf(),
            source,
        },
    })?;
    Frame::from_image(&img)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn frame_index(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits_end = stem.rfind(|c: char| c.is_ascii_digit())? + 1;
    let head = &stem[..digits_end];
    let digits_start = head.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    head[digits_start..].parse().ok()
}
