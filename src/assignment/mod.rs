// Speaker assignment module
//
// Attributes each transcript span to a resolved speaker identity using
// interval-overlap accumulation, with a separate first-match policy for
// simultaneous speech. Pure: a function of its inputs, no hidden state,
// inputs never mutated.

use serde::{Deserialize, Serialize};

use crate::diarization::{DiarizationSegment, OverlapRegion};
use crate::transcription::TranscriptSegment;

/// Label used when no speaker claims enough of a span.
pub const UNKNOWN_SPEAKER: &str = "UNKNOWN";

const OVERLAP_LABEL_SEPARATOR: &str = " & ";
const OVERLAP_LABEL_SUFFIX: &str = " (overlapping)";

/// Attribution thresholds; defaults mirror `PipelineConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignerConfig {
    /// Fraction of a span a single speaker must cover to claim it.
    pub min_overlap_ratio: f64,
    /// Absolute intersection (seconds) at which an overlap region claims a
    /// span as simultaneous speech.
    pub overlap_claim_secs: f64,
    /// Fractional intersection at which an overlap region claims a span.
    pub overlap_claim_ratio: f64,
}

impl Default for AssignerConfig {
    fn default() -> Self {
        Self {
            min_overlap_ratio: 0.5,
            overlap_claim_secs: 2.0,
            overlap_claim_ratio: 0.5,
        }
    }
}

/// A transcript span with its final speaker label, chunk-local times
/// rounded to two decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributedSegment {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
    pub text: String,
}

/// Attribute every transcript span against the resolved speaker turns and
/// the chunk's overlap regions.
pub fn assign_speakers(
    transcript: &[TranscriptSegment],
    diarization: &[DiarizationSegment],
    overlaps: &[OverlapRegion],
    config: &AssignerConfig,
) -> Vec<AttributedSegment> {
    transcript
        .iter()
        .map(|span| AttributedSegment {
            start: round2(span.start),
            end: round2(span.end),
            speaker: attribute_span(span, diarization, overlaps, config),
            text: span.text.clone(),
        })
        .collect()
}

fn attribute_span(
    span: &TranscriptSegment,
    diarization: &[DiarizationSegment],
    overlaps: &[OverlapRegion],
    config: &AssignerConfig,
) -> String {
    let span_len = span.end - span.start;

    // Simultaneous speech first: the first region with a qualifying
    // intersection claims the span outright, in supplied order.
    for region in overlaps {
        let shared = region.intersection(span.start, span.end);
        let qualifies = shared >= config.overlap_claim_secs
            || (span_len > 0.0 && shared / span_len >= config.overlap_claim_ratio);
        if qualifies {
            return overlap_label(&region.speakers);
        }
    }

    // Accumulate per-speaker intersection. Insertion order is kept so the
    // first-encountered maximum wins ties, matching the documented
    // tie-break.
    let mut totals: Vec<(&str, f64)> = Vec::new();
    for turn in diarization {
        let shared = intersection(span.start, span.end, turn.start, turn.end);
        if shared <= 0.0 {
            continue;
        }
        let id = turn.speaker_id();
        match totals.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, total)) => *total += shared,
            None => totals.push((id, shared)),
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for &(id, total) in &totals {
        match best {
            Some((_, best_total)) if total <= best_total => {}
            _ => best = Some((id, total)),
        }
    }

    match best {
        Some((id, total)) if span_len > 0.0 && total / span_len >= config.min_overlap_ratio => {
            id.to_string()
        }
        _ => UNKNOWN_SPEAKER.to_string(),
    }
}

fn intersection(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> f64 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Deterministic label for a simultaneous-speech span: sorted, de-duplicated
/// ids joined with the separator plus the overlap marker.
fn overlap_label(speakers: &[String]) -> String {
    let mut ids: Vec<&str> = speakers.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();
    format!("{}{}", ids.join(OVERLAP_LABEL_SEPARATOR), OVERLAP_LABEL_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(start: f64, end: f64, speaker: &str) -> DiarizationSegment {
        DiarizationSegment {
            start,
            end,
            local_speaker: format!("local_{}", speaker),
            embedding: Vec::new(),
            global_speaker: Some(speaker.to_string()),
        }
    }

    fn span(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text)
    }

    fn region(start: f64, end: f64, speakers: &[&str]) -> OverlapRegion {
        OverlapRegion {
            start,
            end,
            speakers: speakers.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_span_inside_single_turn() {
        let result = assign_speakers(
            &[span(2.0, 4.0, "hello")],
            &[turn(0.0, 10.0, "SPK_0")],
            &[],
            &AssignerConfig::default(),
        );
        assert_eq!(result[0].speaker, "SPK_0");
        assert_eq!(result[0].text, "hello");
    }

    #[test]
    fn test_even_split_goes_to_first_turn_in_order() {
        // Both speakers cover exactly half: ratio 0.5 meets the threshold,
        // and the first-encountered maximum wins.
        let transcript = [span(0.0, 10.0, "split")];
        let diarization = [turn(0.0, 5.0, "SPK_0"), turn(5.0, 10.0, "SPK_1")];

        let result = assign_speakers(&transcript, &diarization, &[], &AssignerConfig::default());
        assert_eq!(result[0].speaker, "SPK_0");

        // reversing the supplied order flips the winner
        let reversed = [turn(5.0, 10.0, "SPK_1"), turn(0.0, 5.0, "SPK_0")];
        let result = assign_speakers(&transcript, &reversed, &[], &AssignerConfig::default());
        assert_eq!(result[0].speaker, "SPK_1");
    }

    #[test]
    fn test_no_intersection_is_unknown() {
        let result = assign_speakers(
            &[span(20.0, 22.0, "late")],
            &[turn(0.0, 10.0, "SPK_0")],
            &[],
            &AssignerConfig::default(),
        );
        assert_eq!(result[0].speaker, UNKNOWN_SPEAKER);
    }

    #[test]
    fn test_below_ratio_is_unknown() {
        // 1s of a 4s span covered: 0.25 < 0.5
        let result = assign_speakers(
            &[span(0.0, 4.0, "thin")],
            &[turn(3.0, 10.0, "SPK_0")],
            &[],
            &AssignerConfig::default(),
        );
        assert_eq!(result[0].speaker, UNKNOWN_SPEAKER);
    }

    #[test]
    fn test_split_turns_accumulate_per_speaker() {
        // SPK_0 covers 0-2 and 3-5 of a 0-6 span: 4s total beats SPK_1's 1s
        let result = assign_speakers(
            &[span(0.0, 6.0, "sum")],
            &[
                turn(0.0, 2.0, "SPK_0"),
                turn(2.0, 3.0, "SPK_1"),
                turn(3.0, 5.0, "SPK_0"),
            ],
            &[],
            &AssignerConfig::default(),
        );
        assert_eq!(result[0].speaker, "SPK_0");
    }

    #[test]
    fn test_overlap_region_claims_by_absolute_seconds() {
        // 2s intersection with a 10s span: only 20% but >= 2.0s absolute
        let result = assign_speakers(
            &[span(0.0, 10.0, "both talking")],
            &[turn(0.0, 10.0, "SPK_0")],
            &[region(8.0, 12.0, &["SPK_1", "SPK_0"])],
            &AssignerConfig::default(),
        );
        assert_eq!(result[0].speaker, "SPK_0 & SPK_1 (overlapping)");
    }

    #[test]
    fn test_overlap_region_claims_by_ratio() {
        // 1s intersection with a 1.6s span: 62% >= 50%
        let result = assign_speakers(
            &[span(2.0, 3.6, "quick cross-talk")],
            &[turn(0.0, 10.0, "SPK_0")],
            &[region(2.6, 3.6, &["SPK_0", "SPK_1"])],
            &AssignerConfig::default(),
        );
        assert_eq!(result[0].speaker, "SPK_0 & SPK_1 (overlapping)");
    }

    #[test]
    fn test_weak_overlap_region_falls_through() {
        // 0.5s of a 10s span: fails both the absolute and ratio gates
        let result = assign_speakers(
            &[span(0.0, 10.0, "mostly solo")],
            &[turn(0.0, 10.0, "SPK_0")],
            &[region(9.5, 12.0, &["SPK_0", "SPK_1"])],
            &AssignerConfig::default(),
        );
        assert_eq!(result[0].speaker, "SPK_0");
    }

    #[test]
    fn test_first_qualifying_region_wins() {
        let result = assign_speakers(
            &[span(0.0, 10.0, "crowded")],
            &[],
            &[
                region(0.0, 4.0, &["SPK_0", "SPK_1"]),
                region(4.0, 10.0, &["SPK_2", "SPK_3"]),
            ],
            &AssignerConfig::default(),
        );
        // both qualify; the first supplied region is taken, not the larger
        assert_eq!(result[0].speaker, "SPK_0 & SPK_1 (overlapping)");
    }

    #[test]
    fn test_overlap_label_is_sorted_and_deduplicated() {
        let result = assign_speakers(
            &[span(0.0, 4.0, "echo")],
            &[],
            &[region(0.0, 4.0, &["SPK_2", "SPK_0", "SPK_2"])],
            &AssignerConfig::default(),
        );
        assert_eq!(result[0].speaker, "SPK_0 & SPK_2 (overlapping)");
    }

    #[test]
    fn test_times_rounded_to_two_decimals() {
        let result = assign_speakers(
            &[span(1.23456, 4.98765, "precise")],
            &[turn(0.0, 10.0, "SPK_0")],
            &[],
            &AssignerConfig::default(),
        );
        assert_eq!(result[0].start, 1.23);
        assert_eq!(result[0].end, 4.99);
    }

    #[test]
    fn test_inputs_not_consumed_or_reordered() {
        let transcript = [span(0.0, 2.0, "a"), span(5.0, 7.0, "b")];
        let diarization = [turn(0.0, 10.0, "SPK_0")];

        let result = assign_speakers(&transcript, &diarization, &[], &AssignerConfig::default());

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "a");
        assert_eq!(result[1].text, "b");
        // originals untouched
        assert_eq!(transcript[0].text, "a");
    }
}
