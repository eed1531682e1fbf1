//! Per-class detection tally.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::detect::Detection;
use crate::ClassMap;

/// Counts per class of interest for one frame, zero-filled: classes with no
/// detections are still present with count 0. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountSnapshot {
    pub timestamp: DateTime<Utc>,
    counts: BTreeMap<u32, u64>,
}

impl CountSnapshot {
    pub fn count(&self, class_id: u32) -> u64 {
        self.counts.get(&class_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Counts keyed by class id, in ascending id order.
    pub fn counts(&self) -> &BTreeMap<u32, u64> {
        &self.counts
    }
}

/// Tally detections against the classes of interest. Pure; never fails.
///
/// The sum of the returned counts equals the number of detections whose
/// class is in `classes` (for a filtered detection set, all of them).
pub fn tally(
    detections: &[Detection],
    classes: &ClassMap,
    timestamp: DateTime<Utc>,
) -> CountSnapshot {
    let mut counts: BTreeMap<u32, u64> =
        classes.ids().map(|id| (id, 0)).collect();
    for detection in detections {
        if let Some(count) = counts.get_mut(&detection.class_id) {
            *count += 1;
        }
    }
    CountSnapshot { timestamp, counts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn detection(class_id: u32) -> Detection {
        Detection {
            class_id,
            confidence: 0.9,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    fn classes() -> ClassMap {
        ClassMap::new(vec![(0, "intermolt".into()), (1, "premolt_now".into())]).unwrap()
    }

    #[test]
    fn zero_detections_reports_zeroes() {
        let snapshot = tally(&[], &classes(), Utc::now());
        assert_eq!(snapshot.count(0), 0);
        assert_eq!(snapshot.count(1), 0);
        assert_eq!(snapshot.total(), 0);
        assert_eq!(snapshot.counts().len(), 2);
    }

    #[test]
    fn sum_matches_detections_of_interest() {
        let detections = vec![detection(1), detection(1), detection(0)];
        let snapshot = tally(&detections, &classes(), Utc::now());
        assert_eq!(snapshot.count(1), 2);
        assert_eq!(snapshot.count(0), 1);
        assert_eq!(snapshot.total(), detections.len() as u64);
    }

    #[test]
    fn unknown_classes_are_ignored() {
        let detections = vec![detection(1), detection(42)];
        let snapshot = tally(&detections, &classes(), Utc::now());
        assert_eq!(snapshot.total(), 1);
        assert_eq!(snapshot.count(42), 0);
    }
}
