use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Agenda, ItemId, SegmentSpan, TranscriptSegment};

/// Which bucket a minutes entry belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "item_id", rename_all = "snake_case")]
pub enum EntryTarget {
    Item(ItemId),
    /// Discussion that matched no open agenda item
    Unassigned,
}

impl EntryTarget {
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            EntryTarget::Item(id) => Some(id),
            EntryTarget::Unassigned => None,
        }
    }
}

impl fmt::Display for EntryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryTarget::Item(id) => write!(f, "item {}", id),
            EntryTarget::Unassigned => f.write_str("unassigned"),
        }
    }
}

/// Synthesized minutes for one agenda item (or the unassigned bucket)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinutesEntry {
    pub target: EntryTarget,
    /// Last successfully drafted text
    pub text: String,
    /// Original spans of every segment drafted into `text`; append-only
    pub contributing: BTreeSet<SegmentSpan>,
    /// Text each contributing span carried when it was last drafted
    #[serde(skip)]
    absorbed: BTreeMap<SegmentSpan, String>,
    /// Set when the last drafting attempt failed
    #[serde(default)]
    pub stale: bool,
    /// A later fragment replaced speech drafted into `text`; the next pass
    /// redrafts the entry from the segment log
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub outdated: bool,
    /// Segments routed here whose drafting has not succeeded yet
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<TranscriptSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MinutesEntry {
    pub fn new(target: EntryTarget) -> Self {
        Self {
            target,
            text: String::new(),
            contributing: BTreeSet::new(),
            absorbed: BTreeMap::new(),
            stale: false,
            outdated: false,
            pending: Vec::new(),
            last_error: None,
            updated_at: None,
        }
    }

    /// Whether `text` still reflects this segment as drafted
    pub fn was_drafted(&self, segment: &TranscriptSegment) -> bool {
        self.absorbed.get(&segment.origin) == Some(&segment.text)
    }

    /// Whether this exact segment, span and text, was already drafted here
    /// or is queued for the next pass
    pub fn has_seen(&self, segment: &TranscriptSegment) -> bool {
        self.was_drafted(segment)
            || self
                .pending
                .iter()
                .any(|p| p.origin == segment.origin && p.text == segment.text)
    }

    /// Whether `segment` replaces speech already drafted into this entry
    pub fn is_superseded_by(&self, segment: &TranscriptSegment) -> bool {
        !self.has_seen(segment)
            && self
                .contributing
                .iter()
                .any(|span| span.overlaps(&segment.origin))
    }

    /// Replace the text after a successful draft and record its sources
    pub fn apply_draft(&mut self, text: String, drafted: &[TranscriptSegment]) {
        self.text = text;
        for segment in drafted {
            self.contributing.insert(segment.origin);
            self.absorbed.insert(segment.origin, segment.text.clone());
        }
        let contributing = &self.contributing;
        self.pending.retain(|s| !contributing.contains(&s.origin));
        self.stale = false;
        self.outdated = false;
        self.last_error = None;
        self.updated_at = Some(Utc::now());
    }

    /// Keep the last good text and queue the segments for the next pass.
    ///
    /// A failed segment replaces a queued one with the same original span.
    pub fn mark_stale(&mut self, failed: Vec<TranscriptSegment>, error: String) {
        for segment in failed {
            if self.has_seen(&segment) {
                continue;
            }
            self.pending.retain(|p| p.origin != segment.origin);
            self.pending.push(segment);
        }
        self.stale = true;
        self.last_error = Some(error);
    }
}

/// The incrementally maintained minutes of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinutesDocument {
    pub entries: Vec<MinutesEntry>,
    /// Bumped on every applied entry replacement
    pub revision: u64,
}

impl MinutesDocument {
    pub fn entry(&self, target: &EntryTarget) -> Option<&MinutesEntry> {
        self.entries.iter().find(|e| e.target == *target)
    }

    /// Swap in a whole entry at once; never a partial field update
    pub fn replace_entry(&mut self, entry: MinutesEntry) {
        match self.entries.iter_mut().find(|e| e.target == entry.target) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
        self.revision += 1;
    }

    /// Every original span that has contributed to any entry
    pub fn contributing_spans(&self) -> BTreeSet<SegmentSpan> {
        self.entries
            .iter()
            .flat_map(|e| e.contributing.iter().copied())
            .collect()
    }

    pub fn stale_entries(&self) -> impl Iterator<Item = &MinutesEntry> {
        self.entries.iter().filter(|e| e.stale)
    }

    /// Entries in agenda order; items no longer on the agenda follow,
    /// then the unassigned bucket
    pub fn ordered<'a>(&'a self, agenda: &Agenda) -> Vec<&'a MinutesEntry> {
        let mut entries: Vec<&MinutesEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| match &e.target {
            EntryTarget::Item(id) => match agenda.ordinal_of(id) {
                Some(ordinal) => (0, ordinal),
                None => (1, 0),
            },
            EntryTarget::Unassigned => (2, 0),
        });
        entries
    }
}
