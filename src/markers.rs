//! Marker storage
//!
//! Time-stamped events per track, kept in ascending time order. Manual
//! placement and accepted detector output both land here, so the event
//! table a front end shows is always one ordered sequence per file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A time-stamped event of interest within a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub time: f64,
    pub amplitude: f32,
}

/// Per-track marker collections.
///
/// Each track's markers stay ascending by time with no duplicate times.
#[derive(Debug, Default)]
pub struct MarkerStore {
    markers: HashMap<PathBuf, Vec<Marker>>,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a marker, keeping ascending time order.
    ///
    /// A marker at exactly `time` already present for the path makes the
    /// call a no-op, reported by the `false` return.
    pub fn add(&mut self, path: &Path, time: f64, amplitude: f32) -> bool {
        let markers = self.markers.entry(path.to_path_buf()).or_default();
        match markers.binary_search_by(|m| m.time.total_cmp(&time)) {
            Ok(_) => false,
            Err(pos) => {
                markers.insert(pos, Marker { time, amplitude });
                true
            }
        }
    }

    /// Markers for a path, ascending by time. Unknown paths read as empty.
    pub fn markers(&self, path: &Path) -> &[Marker] {
        self.markers.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove markers by their positions in the current ascending ordering.
    ///
    /// Every index refers to the ordering before any removal, whatever order
    /// the batch arrives in. Duplicate and out-of-range indices are skipped.
    /// Returns how many markers were removed.
    pub fn remove(&mut self, path: &Path, indices: &[usize]) -> usize {
        let Some(markers) = self.markers.get_mut(path) else {
            return 0;
        };

        // Remove from the back so earlier indices stay valid
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();

        let mut removed = 0;
        for index in sorted {
            if index < markers.len() {
                markers.remove(index);
                removed += 1;
            }
        }
        removed
    }

    /// Drop one path's markers, or every path's when `path` is `None`.
    pub fn clear(&mut self, path: Option<&Path>) {
        match path {
            Some(p) => {
                self.markers.remove(p);
            }
            None => self.markers.clear(),
        }
    }

    pub fn count(&self, path: &Path) -> usize {
        self.markers.get(path).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("/tmp/a.wav")
    }

    #[test]
    fn test_add_keeps_ascending_order() {
        let mut store = MarkerStore::new();
        let p = path();
        store.add(&p, 3.0, 0.3);
        store.add(&p, 1.0, 0.1);
        store.add(&p, 2.0, 0.2);

        let times: Vec<f64> = store.markers(&p).iter().map(|m| m.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_duplicate_time_is_noop() {
        let mut store = MarkerStore::new();
        let p = path();
        assert!(store.add(&p, 3.0, 0.5));
        assert!(!store.add(&p, 3.0, 0.5));
        // Same time with a different amplitude is still the same marker
        assert!(!store.add(&p, 3.0, 0.9));

        assert_eq!(store.count(&p), 1);
        assert_eq!(store.markers(&p)[0].amplitude, 0.5);
    }

    #[test]
    fn test_remove_first_of_three() {
        let mut store = MarkerStore::new();
        let p = path();
        store.add(&p, 1.0, 0.0);
        store.add(&p, 2.0, 0.0);
        store.add(&p, 3.0, 0.0);

        assert_eq!(store.remove(&p, &[0]), 1);
        let times: Vec<f64> = store.markers(&p).iter().map(|m| m.time).collect();
        assert_eq!(times, vec![2.0, 3.0]);
    }

    #[test]
    fn test_batch_remove_uses_pre_removal_indices() {
        for indices in [[0, 2], [2, 0]] {
            let mut store = MarkerStore::new();
            let p = path();
            store.add(&p, 1.0, 0.0);
            store.add(&p, 2.0, 0.0);
            store.add(&p, 3.0, 0.0);

            assert_eq!(store.remove(&p, &indices), 2);
            let times: Vec<f64> = store.markers(&p).iter().map(|m| m.time).collect();
            assert_eq!(times, vec![2.0]);
        }
    }

    #[test]
    fn test_remove_skips_duplicates_and_out_of_range() {
        let mut store = MarkerStore::new();
        let p = path();
        store.add(&p, 1.0, 0.0);
        store.add(&p, 2.0, 0.0);

        assert_eq!(store.remove(&p, &[1, 1, 7]), 1);
        let times: Vec<f64> = store.markers(&p).iter().map(|m| m.time).collect();
        assert_eq!(times, vec![1.0]);

        assert_eq!(store.remove(&p, &[]), 0);
        assert_eq!(store.remove(&PathBuf::from("/tmp/unknown.wav"), &[0]), 0);
    }

    #[test]
    fn test_clear_per_path_and_global() {
        let mut store = MarkerStore::new();
        let a = PathBuf::from("/tmp/a.wav");
        let b = PathBuf::from("/tmp/b.wav");
        store.add(&a, 1.0, 0.0);
        store.add(&b, 2.0, 0.0);

        store.clear(Some(&a));
        assert!(store.markers(&a).is_empty());
        assert_eq!(store.count(&b), 1);

        store.add(&a, 1.0, 0.0);
        store.clear(None);
        assert!(store.markers(&a).is_empty());
        assert!(store.markers(&b).is_empty());
    }

    #[test]
    fn test_unknown_path_reads_empty() {
        let store = MarkerStore::new();
        assert!(store.markers(&path()).is_empty());
        assert_eq!(store.count(&path()), 0);
    }
}
