use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{RawFragment, SegmentLog, SegmentSpan, TranscriptSegment};

/// Configuration for fragment ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// How far behind the latest seen `end_ms` a fragment may start
    pub retention_horizon_ms: u64,
    /// Pause that splits Deepgram words into separate fragments
    pub max_gap_ms: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            retention_horizon_ms: 600_000,
            max_gap_ms: 1_500,
        }
    }
}

/// A span of an older segment replaced by a later submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapWarning {
    pub superseded: SegmentSpan,
    pub previous_text: String,
    pub replacement_text: String,
}

/// Outcome of ingesting one fragment; `segment` is `None` for an exact duplicate
#[derive(Debug, Clone, Default)]
pub struct FragmentOutcome {
    pub segment: Option<TranscriptSegment>,
    pub warnings: Vec<OverlapWarning>,
}

#[derive(Debug)]
pub struct RejectedFragment {
    pub index: usize,
    pub error: EngineError,
}

/// Outcome of ingesting a batch
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub accepted: Vec<TranscriptSegment>,
    pub duplicates: usize,
    pub warnings: Vec<OverlapWarning>,
    pub rejected: Vec<RejectedFragment>,
}

/// Collapse whitespace runs and trim
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Merge one fragment into the log.
///
/// Exact duplicates (same span, same normalized text) inside the retention
/// window are dropped. A fragment overlapping older segments wins the
/// overlapping span: the older segments keep only their non-overlapped
/// remainders. Fragments starting before the retention floor are rejected,
/// redeliveries included.
pub fn ingest_fragment(
    log: &mut SegmentLog,
    fragment: RawFragment,
    config: &SegmenterConfig,
) -> EngineResult<FragmentOutcome> {
    if fragment.end_ms <= fragment.start_ms {
        return Err(EngineError::InvalidFragment(format!(
            "end {}ms is not after start {}ms",
            fragment.end_ms, fragment.start_ms
        )));
    }
    let text = normalize_text(&fragment.text);
    if text.is_empty() {
        return Err(EngineError::InvalidFragment(format!(
            "fragment at {}ms has no text",
            fragment.start_ms
        )));
    }

    let span = fragment.span();
    let key = (span, text.clone());
    if log.delivered.contains(&key) {
        debug!("Dropping duplicate fragment {}-{}ms", span.start_ms, span.end_ms);
        return Ok(FragmentOutcome::default());
    }

    let floor_ms = log.retention_floor(config.retention_horizon_ms);
    if span.start_ms < floor_ms {
        return Err(EngineError::OutOfOrderFragment {
            start_ms: span.start_ms,
            floor_ms,
        });
    }

    let segment = TranscriptSegment {
        start_ms: span.start_ms,
        end_ms: span.end_ms,
        origin: span,
        speaker: fragment.speaker.map(|s| normalize_text(&s)).filter(|s| !s.is_empty()),
        text,
        item_id: fragment.item_id,
    };

    let mut warnings = Vec::new();
    let mut kept = Vec::with_capacity(log.segments.len() + 2);

    for existing in log.segments.drain(..) {
        let Some(overlap) = existing.span().intersection(&span) else {
            kept.push(existing);
            continue;
        };

        if existing.start_ms < span.start_ms {
            kept.push(existing.trimmed(SegmentSpan::new(existing.start_ms, span.start_ms)));
        }
        if existing.end_ms > span.end_ms {
            kept.push(existing.trimmed(SegmentSpan::new(span.end_ms, existing.end_ms)));
        }

        if existing.text != segment.text {
            warn!(
                "Fragment {}-{}ms supersedes \"{}\" over {}-{}ms",
                span.start_ms, span.end_ms, existing.text, overlap.start_ms, overlap.end_ms
            );
            warnings.push(OverlapWarning {
                superseded: overlap,
                previous_text: existing.text.clone(),
                replacement_text: segment.text.clone(),
            });
        }
    }

    kept.push(segment.clone());
    kept.sort_by_key(|s| s.start_ms);
    log.segments = kept;
    log.high_water_ms = log.high_water_ms.max(span.end_ms);
    log.delivered.insert(key);

    let new_floor_ms = log.retention_floor(config.retention_horizon_ms);
    if new_floor_ms > floor_ms {
        log.delivered.retain(|(s, _)| s.start_ms >= new_floor_ms);
    }

    Ok(FragmentOutcome {
        segment: Some(segment),
        warnings,
    })
}

/// Ingest every fragment of a batch, collecting rejections instead of
/// stopping at the first one
pub fn ingest_batch(
    log: &mut SegmentLog,
    fragments: Vec<RawFragment>,
    config: &SegmenterConfig,
) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();

    for (index, fragment) in fragments.into_iter().enumerate() {
        match ingest_fragment(log, fragment, config) {
            Ok(FragmentOutcome {
                segment: Some(segment),
                warnings,
            }) => {
                outcome.accepted.push(segment);
                outcome.warnings.extend(warnings);
            }
            Ok(FragmentOutcome { segment: None, .. }) => outcome.duplicates += 1,
            Err(error) => {
                warn!("Rejected fragment #{}: {}", index, error);
                outcome.rejected.push(RejectedFragment { index, error });
            }
        }
    }

    outcome
}
