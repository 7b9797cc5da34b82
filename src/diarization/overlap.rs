// diarization/overlap.rs
//
// Sweep-line detection of simultaneous-speech regions over one chunk's
// speaker turns, plus the clean/overlap partition the separation pass
// walks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::provider::DiarizationSegment;

/// A span where two or more distinct speakers are concurrently active.
/// Produced per chunk, consumed within the same chunk, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapRegion {
    pub start: f64,
    pub end: f64,
    /// Sorted, de-duplicated ids of every speaker active in the span.
    /// Always at least two by construction.
    pub speakers: Vec<String>,
}

impl OverlapRegion {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Length of the intersection between this region and `[start, end]`.
    pub fn intersection(&self, start: f64, end: f64) -> f64 {
        (self.end.min(end) - self.start.max(start)).max(0.0)
    }
}

/// Find every region where more than one speaker is active.
///
/// Event sweep: each turn emits a start (+1) and end (-1) event. Events are
/// sorted by time with ends ordered before starts at equal times, so a turn
/// ending exactly when another begins is not counted as overlapping.
/// Adjacent regions with identical speaker sets are merged.
pub fn detect_overlaps(segments: &[DiarizationSegment]) -> Vec<OverlapRegion> {
    if segments.is_empty() {
        return Vec::new();
    }

    let mut events: Vec<(f64, i8, &str)> = Vec::with_capacity(segments.len() * 2);
    for segment in segments {
        events.push((segment.start, 1, segment.speaker_id()));
        events.push((segment.end, -1, segment.speaker_id()));
    }
    events.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    // BTreeSet keeps the active-speaker snapshot sorted and de-duplicated.
    let mut active: BTreeSet<&str> = BTreeSet::new();
    let mut last_time = events[0].0;
    let mut regions: Vec<OverlapRegion> = Vec::new();

    for (time, delta, speaker) in events {
        if active.len() > 1 && time > last_time {
            regions.push(OverlapRegion {
                start: last_time,
                end: time,
                speakers: active.iter().map(|s| s.to_string()).collect(),
            });
        }

        if delta > 0 {
            active.insert(speaker);
        } else {
            active.remove(speaker);
        }
        last_time = time;
    }

    merge_adjacent(regions)
}

/// Merge consecutive regions where one ends exactly where the next starts
/// and the speaker sets are identical.
fn merge_adjacent(regions: Vec<OverlapRegion>) -> Vec<OverlapRegion> {
    let mut merged: Vec<OverlapRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        match merged.last_mut() {
            Some(prev) if prev.end == region.start && prev.speakers == region.speakers => {
                prev.end = region.end;
            }
            _ => merged.push(region),
        }
    }
    merged
}

/// One span of the clean/overlap partition of a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingRegion {
    Clean { start: f64, end: f64 },
    Overlap(OverlapRegion),
}

/// Partition `[0, duration]` into alternating clean and overlap spans.
/// `overlaps` must be time-sorted and non-overlapping, which
/// `detect_overlaps` guarantees.
pub fn processing_regions(duration: f64, overlaps: &[OverlapRegion]) -> Vec<ProcessingRegion> {
    if overlaps.is_empty() {
        return vec![ProcessingRegion::Clean {
            start: 0.0,
            end: duration,
        }];
    }

    let mut regions = Vec::new();
    let mut last_end = 0.0;

    for overlap in overlaps {
        if overlap.start > last_end {
            regions.push(ProcessingRegion::Clean {
                start: last_end,
                end: overlap.start,
            });
        }
        regions.push(ProcessingRegion::Overlap(overlap.clone()));
        last_end = overlap.end;
    }

    if last_end < duration {
        regions.push(ProcessingRegion::Clean {
            start: last_end,
            end: duration,
        });
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(start: f64, end: f64, speaker: &str) -> DiarizationSegment {
        DiarizationSegment {
            start,
            end,
            local_speaker: speaker.to_string(),
            embedding: Vec::new(),
            global_speaker: Some(speaker.to_string()),
        }
    }

    #[test]
    fn test_three_speaker_scenario() {
        // A: 0-10, B: 5-15, C: 12-18
        let segments = vec![turn(0.0, 10.0, "A"), turn(5.0, 15.0, "B"), turn(12.0, 18.0, "C")];

        let regions = detect_overlaps(&segments);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].start, 5.0);
        assert_eq!(regions[0].end, 10.0);
        assert_eq!(regions[0].speakers, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(regions[1].start, 12.0);
        assert_eq!(regions[1].end, 15.0);
        assert_eq!(regions[1].speakers, vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn test_empty_input_yields_no_regions() {
        assert!(detect_overlaps(&[]).is_empty());
    }

    #[test]
    fn test_touching_turns_do_not_overlap() {
        // B starts exactly when A ends: the end event applies first
        let segments = vec![turn(0.0, 5.0, "A"), turn(5.0, 10.0, "B")];
        assert!(detect_overlaps(&segments).is_empty());
    }

    #[test]
    fn test_single_speaker_never_overlaps() {
        let segments = vec![turn(0.0, 5.0, "A"), turn(3.0, 8.0, "A")];
        assert!(detect_overlaps(&segments).is_empty());
    }

    #[test]
    fn test_adjacent_regions_with_same_speakers_merge() {
        // A and B both active 2-8; B's back-to-back turns put a boundary
        // event at 5 without changing the active pair
        let segments = vec![
            turn(0.0, 8.0, "A"),
            turn(2.0, 5.0, "B"),
            turn(5.0, 8.0, "B"),
        ];

        let regions = detect_overlaps(&segments);

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start, 2.0);
        assert_eq!(regions[0].end, 8.0);
        assert_eq!(regions[0].speakers, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_regions_reference_at_least_two_speakers() {
        let segments = vec![
            turn(0.0, 6.0, "A"),
            turn(2.0, 9.0, "B"),
            turn(4.0, 5.0, "C"),
        ];

        for region in detect_overlaps(&segments) {
            assert!(region.speakers.len() >= 2);
        }
    }

    #[test]
    fn test_intersection_helper() {
        let region = OverlapRegion {
            start: 5.0,
            end: 10.0,
            speakers: vec!["A".to_string(), "B".to_string()],
        };

        assert_eq!(region.intersection(0.0, 7.0), 2.0);
        assert_eq!(region.intersection(6.0, 8.0), 2.0);
        assert_eq!(region.intersection(10.0, 12.0), 0.0);
    }

    #[test]
    fn test_processing_regions_partition() {
        let overlaps = vec![
            OverlapRegion {
                start: 5.0,
                end: 10.0,
                speakers: vec!["A".into(), "B".into()],
            },
            OverlapRegion {
                start: 12.0,
                end: 15.0,
                speakers: vec!["B".into(), "C".into()],
            },
        ];

        let regions = processing_regions(30.0, &overlaps);

        assert_eq!(regions.len(), 5);
        assert_eq!(regions[0], ProcessingRegion::Clean { start: 0.0, end: 5.0 });
        assert_eq!(regions[1], ProcessingRegion::Overlap(overlaps[0].clone()));
        assert_eq!(regions[2], ProcessingRegion::Clean { start: 10.0, end: 12.0 });
        assert_eq!(regions[3], ProcessingRegion::Overlap(overlaps[1].clone()));
        assert_eq!(regions[4], ProcessingRegion::Clean { start: 15.0, end: 30.0 });
    }

    #[test]
    fn test_processing_regions_no_overlaps() {
        let regions = processing_regions(20.0, &[]);
        assert_eq!(regions, vec![ProcessingRegion::Clean { start: 0.0, end: 20.0 }]);
    }
}
