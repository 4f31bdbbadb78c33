use async_trait::async_trait;

use crate::io::format_timestamp;
use crate::matching::{tokenize, MatchConfig};
use crate::models::ResolvedGoal;

use super::{Draft, DraftError, DraftRequest, Drafter};

/// Offline drafter that turns segments into timestamped bullet points.
///
/// Deterministic, so it doubles as the drafter for replays without an API
/// key. A goal counts as resolved when one segment carries a decision
/// marker and at least half of the goal's keywords.
pub struct ExtractiveDrafter {
    decision_markers: Vec<String>,
    stop_words: Vec<String>,
}

impl Default for ExtractiveDrafter {
    fn default() -> Self {
        Self {
            decision_markers: ["agreed", "approved", "decided", "confirmed", "settled"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            stop_words: MatchConfig::default().stop_words,
        }
    }
}

impl ExtractiveDrafter {
    fn resolve_goals(&self, request: &DraftRequest) -> Vec<ResolvedGoal> {
        let mut resolved = Vec::new();

        for goal in &request.open_goals {
            let keywords: Vec<String> = tokenize(&goal.condition, &self.stop_words).collect();
            if keywords.is_empty() {
                continue;
            }
            let needed = keywords.len().div_ceil(2);

            let decision = request.segments.iter().find(|segment| {
                let lower = segment.text.to_lowercase();
                let words: Vec<String> = tokenize(&segment.text, &self.stop_words).collect();
                let hits = keywords.iter().filter(|k| words.contains(k)).count();
                self.decision_markers.iter().any(|m| lower.contains(m.as_str())) && hits >= needed
            });

            if let Some(segment) = decision {
                resolved.push(ResolvedGoal {
                    condition: goal.condition.clone(),
                    result: segment.text.clone(),
                });
            }
        }

        resolved
    }
}

#[async_trait]
impl Drafter for ExtractiveDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<Draft, DraftError> {
        let mut lines: Vec<String> = request
            .prior_text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.to_string())
            .collect();

        for segment in &request.segments {
            let line = match &segment.speaker {
                Some(speaker) => format!(
                    "- [{}] {}: {}",
                    format_timestamp(segment.start_ms),
                    speaker,
                    segment.text
                ),
                None => format!("- [{}] {}", format_timestamp(segment.start_ms), segment.text),
            };
            if !lines.contains(&line) {
                lines.push(line);
            }
        }

        Ok(Draft {
            text: lines.join("\n"),
            resolved_goals: self.resolve_goals(request),
        })
    }

    fn drafter_id(&self) -> &str {
        "extractive"
    }
}
