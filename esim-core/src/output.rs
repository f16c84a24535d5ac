//! Output format writers for simulated events.
//!
//! Supports CSV and a compact little-endian binary format.

use crate::types::{Event, Polarity, Resolution};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Magic bytes at the start of a binary event file.
pub const BINARY_MAGIC: &[u8; 8] = b"ESIMBIN\0";

/// Current binary format version.
pub const BINARY_VERSION: u32 = 1;

/// Errors that can occur during output writing.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Field ordering for CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    /// x, y, t, p (default, same column order as the event table)
    #[default]
    XYTP,
    /// t, x, y, p
    TXYP,
    /// x, y, p, t
    XYPT,
    /// Custom order specified by indices
    Custom([usize; 4]),
}

impl std::str::FromStr for FieldOrder {
    type Err = OutputError;

    /// Parses a field order from a format string like "x,y,t,p" or "t,x,y,p".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<String> = s.split(',').map(|p| p.trim().to_lowercase()).collect();

        if parts.len() != 4 {
            return Err(OutputError::InvalidFormat(
                "Format must have exactly 4 fields: x, y, t, p".to_string(),
            ));
        }

        // Map field names to indices: x=0, y=1, t=2, p=3
        let mut indices = [0usize; 4];
        let mut used = [false; 4];

        for (i, part) in parts.iter().enumerate() {
            let field_idx = match part.as_str() {
                "x" => 0,
                "y" => 1,
                "t" | "time" | "timestamp" => 2,
                "p" | "pol" | "polarity" => 3,
                _ => {
                    return Err(OutputError::InvalidFormat(format!(
                        "Unknown field: {}. Use x, y, t, p",
                        part
                    )))
                }
            };

            if used[field_idx] {
                return Err(OutputError::InvalidFormat(format!(
                    "Duplicate field: {}",
                    part
                )));
            }

            indices[i] = field_idx;
            used[field_idx] = true;
        }

        Ok(match indices {
            [0, 1, 2, 3] => Self::XYTP,
            [2, 0, 1, 3] => Self::TXYP,
            [0, 1, 3, 2] => Self::XYPT,
            _ => Self::Custom(indices),
        })
    }
}

impl FieldOrder {
    /// Field indices (x=0, y=1, t=2, p=3) in output order.
    pub fn indices(&self) -> [usize; 4] {
        match self {
            Self::XYTP => [0, 1, 2, 3],
            Self::TXYP => [2, 0, 1, 3],
            Self::XYPT => [0, 1, 3, 2],
            Self::Custom(indices) => *indices,
        }
    }

    /// Returns the column header for this field order.
    pub fn header(&self) -> String {
        const NAMES: [&str; 4] = ["x", "y", "t", "polarity"];
        self.indices()
            .iter()
            .map(|&i| NAMES[i])
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// CSV output writer for events.
pub struct CsvWriter<W: Write> {
    writer: BufWriter<W>,
    field_order: FieldOrder,
}

impl<W: Write> CsvWriter<W> {
    /// Creates a new CSV writer.
    pub fn new(writer: W, field_order: FieldOrder) -> Self {
        Self {
            writer: BufWriter::new(writer),
            field_order,
        }
    }

    /// Writes the optional geometry line followed by the column header.
    pub fn write_header(&mut self, resolution: Option<&Resolution>) -> Result<(), OutputError> {
        if let Some(res) = resolution {
            writeln!(self.writer, "%geometry:{},{}", res.width, res.height)?;
        }
        writeln!(self.writer, "{}", self.field_order.header())?;
        Ok(())
    }

    /// Writes a batch of events.
    pub fn write_events<'a, I>(&mut self, events: I) -> Result<(), OutputError>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        for event in events {
            self.write_event(event)?;
        }
        Ok(())
    }

    #[inline]
    fn write_event(&mut self, event: &Event) -> Result<(), OutputError> {
        let fields = [
            event.x.to_string(),
            event.y.to_string(),
            event.t.to_string(),
            event.polarity.as_i8().to_string(),
        ];
        let [a, b, c, d] = self.field_order.indices();
        writeln!(
            self.writer,
            "{},{},{},{}",
            fields[a], fields[b], fields[c], fields[d]
        )?;
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Binary output format for events.
///
/// Header: magic `ESIMBIN\0`, version u32, width u32, height u32, event
/// count u64. Each event follows as x u32, y u32, t f64, polarity i8
/// (17 bytes). Everything is little-endian.
pub struct BinaryWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> BinaryWriter<W> {
    /// Creates a new binary writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Writes a header with the sensor geometry and event count.
    pub fn write_header(
        &mut self,
        resolution: &Resolution,
        event_count: u64,
    ) -> Result<(), OutputError> {
        self.writer.write_all(BINARY_MAGIC)?;
        self.writer.write_u32::<LittleEndian>(BINARY_VERSION)?;
        self.writer.write_u32::<LittleEndian>(resolution.width)?;
        self.writer.write_u32::<LittleEndian>(resolution.height)?;
        self.writer.write_u64::<LittleEndian>(event_count)?;
        Ok(())
    }

    /// Writes a batch of events.
    pub fn write_events<'a, I>(&mut self, events: I) -> Result<(), OutputError>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        for event in events {
            self.writer.write_u32::<LittleEndian>(event.x)?;
            self.writer.write_u32::<LittleEndian>(event.y)?;
            self.writer.write_f64::<LittleEndian>(event.t)?;
            self.writer.write_i8(event.polarity.as_i8())?;
        }
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads events written by [`BinaryWriter`].
pub fn read_binary_from<R: Read>(mut reader: R) -> Result<(Resolution, Vec<Event>), OutputError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != BINARY_MAGIC {
        return Err(OutputError::InvalidFormat(
            "missing ESIMBIN header".to_string(),
        ));
    }

    let version = reader.read_u32::<LittleEndian>()?;
    if version != BINARY_VERSION {
        return Err(OutputError::InvalidFormat(format!(
            "unsupported version {}",
            version
        )));
    }

    let width = reader.read_u32::<LittleEndian>()?;
    let height = reader.read_u32::<LittleEndian>()?;
    let count = reader.read_u64::<LittleEndian>()?;

    let mut events = Vec::new();
    for _ in 0..count {
        let x = reader.read_u32::<LittleEndian>()?;
        let y = reader.read_u32::<LittleEndian>()?;
        let t = reader.read_f64::<LittleEndian>()?;
        let raw = reader.read_i8()?;
        let polarity = Polarity::from_i8(raw)
            .ok_or_else(|| OutputError::InvalidFormat(format!("invalid polarity {}", raw)))?;
        events.push(Event::new(x, y, t, polarity));
    }

    Ok((Resolution::new(width, height), events))
}

/// Writes events to a CSV file.
pub fn write_csv<'a, P, I>(
    path: P,
    events: I,
    resolution: Option<&Resolution>,
    field_order: FieldOrder,
) -> Result<(), OutputError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a Event>,
{
    let file = File::create(path)?;
    let mut writer = CsvWriter::new(file, field_order);
    writer.write_header(resolution)?;
    writer.write_events(events)?;
    writer.flush()?;
    Ok(())
}

/// Writes events to a binary file.
pub fn write_binary<P: AsRef<Path>>(
    path: P,
    events: &[Event],
    resolution: &Resolution,
) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = BinaryWriter::new(file);
    writer.write_header(resolution, events.len() as u64)?;
    writer.write_events(events)?;
    writer.flush()?;
    Ok(())
}

/// Reads events from a binary file.
pub fn read_binary<P: AsRef<Path>>(path: P) -> Result<(Resolution, Vec<Event>), OutputError> {
    let file = File::open(path)?;
    read_binary_from(BufReader::new(file))
}
