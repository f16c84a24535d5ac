//! Property-based tests using proptest
//!
//! These tests check the invariants of the simulator over random frame
//! sequences and parameters.

use esim_core::{EventSimulator, Frame, Polarity};
use proptest::prelude::*;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

// Random 8-bit sequences: (width, height, frames, timestamps)
fn sequence_strategy() -> impl Strategy<Value = (u32, u32, Vec<Vec<u8>>, Vec<f64>)> {
    (1u32..6, 1u32..5, 2usize..6).prop_flat_map(|(w, h, n)| {
        (
            Just(w),
            Just(h),
            prop::collection::vec(prop::collection::vec(any::<u8>(), (w * h) as usize), n),
            prop::collection::vec(1e-4f64..0.05, n).prop_map(|steps| {
                steps
                    .iter()
                    .scan(0.0, |t, dt| {
                        *t += dt;
                        Some(*t)
                    })
                    .collect::<Vec<f64>>()
            }),
        )
    })
}

fn to_frames(w: u32, h: u32, frames: &[Vec<u8>]) -> Vec<Frame> {
    frames
        .iter()
        .map(|p| Frame::from_luma8(w, h, p).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // Property: folder ingestion reproduces array ingestion exactly
    #[test]
    fn test_ingestion_equivalence(
        (w, h, frames, timestamps) in sequence_strategy(),
        cp in 0.05f64..0.5,
        cn in 0.05f64..0.5,
        refractory in 0.0f64..0.01,
    ) {
        let tmp = TempDir::new().unwrap();
        for (i, pixels) in frames.iter().enumerate() {
            image::GrayImage::from_raw(w, h, pixels.clone())
                .unwrap()
                .save(tmp.path().join(format!("image_{:05}.png", i)))
                .unwrap();
        }
        let ts_path = tmp.path().join("timestamps.txt");
        let text: String = timestamps.iter().map(|t| format!("{}\n", t)).collect();
        fs::write(&ts_path, text).unwrap();

        let sim = EventSimulator::new(cp, cn, refractory, 1e-3, true).unwrap();
        let from_array = sim.generate_from_array(to_frames(w, h, &frames), timestamps.clone()).unwrap();
        let from_folder = sim.generate_from_folder(tmp.path(), &ts_path).unwrap();
        prop_assert_eq!(from_array, from_folder);
    }
}

proptest! {
    // Property: the table is time-sorted and every pixel respects the
    // refractory period, starting from the first frame's timestamp
    #[test]
    fn test_ordering_and_refractory(
        (w, h, frames, timestamps) in sequence_strategy(),
        cp in 0.05f64..0.5,
        cn in 0.05f64..0.5,
        refractory in 0.0f64..0.01,
    ) {
        let sim = EventSimulator::new(cp, cn, refractory, 1e-3, true).unwrap();
        let table = sim.generate_from_array(to_frames(w, h, &frames), timestamps.clone()).unwrap();

        for pair in table.events().windows(2) {
            prop_assert!(pair[0].t <= pair[1].t);
        }

        let t_first = timestamps[0];
        let t_last = timestamps[timestamps.len() - 1];
        let mut last: HashMap<(u32, u32), f64> = HashMap::new();
        for event in &table {
            prop_assert!(event.t <= t_last);
            let prev = last.insert((event.x, event.y), event.t).unwrap_or(t_first);
            prop_assert!(
                event.t - prev >= refractory,
                "gap {} below refractory {}", event.t - prev, refractory
            );
        }
    }

    // Property: identical frames produce no events
    #[test]
    fn test_identical_frames_silent(
        (w, h, frames, timestamps) in sequence_strategy(),
        cp in 0.01f64..0.5,
    ) {
        let still = vec![frames[0].clone(); frames.len()];
        let sim = EventSimulator::new(cp, cp, 0.0, 1e-3, true).unwrap();
        let table = sim.generate_from_array(to_frames(w, h, &still), timestamps).unwrap();
        prop_assert!(table.is_empty());
    }

    // Property: a change of (k + frac) thresholds yields exactly k events
    #[test]
    fn test_threshold_counting(
        start in 0.0f64..1.0,
        threshold in 0.01f64..0.2,
        k in 0usize..20,
        frac in 0.05f64..0.95,
        rising in any::<bool>(),
    ) {
        let delta = (k as f64 + frac) * threshold;
        let (from, to) = if rising { (start, start + delta) } else { (start + delta, start) };
        let sim = EventSimulator::new(threshold, threshold, 0.0, 0.0, false).unwrap();
        let frames = vec![
            Frame::new(1, 1, vec![from]).unwrap(),
            Frame::new(1, 1, vec![to]).unwrap(),
        ];
        let table = sim.generate_from_array(frames, vec![0.0, 1.0]).unwrap();

        prop_assert_eq!(table.len(), k);
        let expected = if rising { Polarity::On } else { Polarity::Off };
        prop_assert!(table.iter().all(|e| e.polarity == expected));
    }
}
