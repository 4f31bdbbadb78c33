use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ItemId;

/// Half-open time range `[start_ms, end_ms)` of a transcript segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentSpan {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SegmentSpan {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    pub fn overlaps(&self, other: &SegmentSpan) -> bool {
        self.start_ms < other.end_ms && other.start_ms < self.end_ms
    }

    /// The shared part of two spans, if any
    pub fn intersection(&self, other: &SegmentSpan) -> Option<SegmentSpan> {
        let start_ms = self.start_ms.max(other.start_ms);
        let end_ms = self.end_ms.min(other.end_ms);
        (start_ms < end_ms).then_some(SegmentSpan { start_ms, end_ms })
    }
}

/// A transcript fragment as delivered by the speech-to-text collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFragment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Explicit agenda item binding; overrides title matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
}

impl RawFragment {
    pub fn new(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            speaker: None,
            item_id: None,
        }
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn bound_to(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(ItemId::new(item_id));
        self
    }

    pub fn span(&self) -> SegmentSpan {
        SegmentSpan::new(self.start_ms, self.end_ms)
    }
}

/// A normalized, time-bounded unit of transcribed speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    /// Span as originally submitted; stays fixed when a later
    /// overlapping submission trims the live span
    pub origin: SegmentSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
}

impl TranscriptSegment {
    pub fn span(&self) -> SegmentSpan {
        SegmentSpan::new(self.start_ms, self.end_ms)
    }

    pub fn duration_ms(&self) -> u64 {
        self.span().duration_ms()
    }

    /// Copy of this segment narrowed to `span`, keeping its origin
    pub fn trimmed(&self, span: SegmentSpan) -> Self {
        Self {
            start_ms: span.start_ms,
            end_ms: span.end_ms,
            ..self.clone()
        }
    }
}

/// The ordered, non-overlapping segment sequence of one session
#[derive(Debug, Clone, Default)]
pub struct SegmentLog {
    pub(crate) segments: Vec<TranscriptSegment>,
    /// (span, text) pairs accepted at or above the retention floor, for
    /// redelivery detection
    pub(crate) delivered: HashSet<(SegmentSpan, String)>,
    /// Largest end offset seen so far
    pub(crate) high_water_ms: u64,
}

impl SegmentLog {
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn high_water_ms(&self) -> u64 {
        self.high_water_ms
    }

    /// Earliest start offset still accepted for the given retention horizon
    pub fn retention_floor(&self, horizon_ms: u64) -> u64 {
        self.high_water_ms.saturating_sub(horizon_ms)
    }

    /// Live pieces of segments whose original span is `origin`
    pub fn pieces_of(&self, origin: &SegmentSpan) -> impl Iterator<Item = &TranscriptSegment> {
        self.segments.iter().filter(move |s| s.origin == *origin)
    }
}
