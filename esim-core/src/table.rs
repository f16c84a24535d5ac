//! Assembly of generated events into the final ordered table.

use crate::generator::RunStats;
use crate::types::{Event, Resolution};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Time-ordered table of simulated events.
///
/// Rows are sorted by timestamp; events sharing a timestamp follow pixel
/// row-major order, so the table does not depend on thread scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    events: Vec<Event>,
    resolution: Resolution,
    stats: RunStats,
}

impl EventTable {
    /// Sorts the events and wraps them. Nothing is filtered or merged.
    pub fn assemble(mut events: Vec<Event>, resolution: Resolution, stats: RunStats) -> Self {
        events.par_sort_by(compare_events);
        Self {
            events,
            resolution,
            stats,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Sensor geometry the events were generated for.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Counters of the run that produced this table.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Dense `[x, y, t, p]` rows.
    pub fn to_rows(&self) -> Vec<[f64; 4]> {
        self.events.iter().map(Event::to_row).collect()
    }

    /// Column vectors `(x, y, t, p)`.
    pub fn to_columns(&self) -> (Vec<u32>, Vec<u32>, Vec<f64>, Vec<i8>) {
        let len = self.events.len();
        let mut x = Vec::with_capacity(len);
        let mut y = Vec::with_capacity(len);
        let mut t = Vec::with_capacity(len);
        let mut p = Vec::with_capacity(len);

        for event in &self.events {
            x.push(event.x);
            y.push(event.y);
            t.push(event.t);
            p.push(event.polarity.as_i8());
        }

        (x, y, t, p)
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl<'a> IntoIterator for &'a EventTable {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Orders by `t`, then row, then column.
fn compare_events(a: &Event, b: &Event) -> Ordering {
    a.t.total_cmp(&b.t)
        .then(a.y.cmp(&b.y))
        .then(a.x.cmp(&b.x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Polarity;

    #[test]
    fn test_assemble_sorts_by_time_then_pixel() {
        let events = vec![
            Event::new(1, 1, 0.5, Polarity::On),
            Event::new(0, 1, 0.2, Polarity::Off),
            Event::new(3, 0, 0.2, Polarity::On),
            Event::new(0, 0, 0.7, Polarity::On),
            Event::new(2, 1, 0.2, Polarity::On),
        ];
        let table = EventTable::assemble(events, Resolution::new(4, 2), RunStats::default());

        let order: Vec<(u32, u32, f64)> = table.iter().map(|e| (e.x, e.y, e.t)).collect();
        assert_eq!(
            order,
            vec![
                (3, 0, 0.2),
                (0, 1, 0.2),
                (2, 1, 0.2),
                (1, 1, 0.5),
                (0, 0, 0.7)
            ]
        );
    }

    #[test]
    fn test_assemble_keeps_duplicates() {
        let event = Event::new(0, 0, 1.0, Polarity::On);
        let table = EventTable::assemble(vec![event; 3], Resolution::new(1, 1), RunStats::default());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_rows_and_columns() {
        let table = EventTable::assemble(
            vec![
                Event::new(2, 3, 0.5, Polarity::Off),
                Event::new(1, 0, 0.25, Polarity::On),
            ],
            Resolution::new(4, 4),
            RunStats::default(),
        );

        assert_eq!(
            table.to_rows(),
            vec![[1.0, 0.0, 0.25, 1.0], [2.0, 3.0, 0.5, -1.0]]
        );
        let (x, y, t, p) = table.to_columns();
        assert_eq!(x, vec![1, 2]);
        assert_eq!(y, vec![0, 3]);
        assert_eq!(t, vec![0.25, 0.5]);
        assert_eq!(p, vec![1, -1]);
    }
}
