use crate::io::format_timestamp;

use super::DraftRequest;

/// System prompt for the drafting model (non-negotiable constraints)
pub const SYSTEM_PROMPT: &str = r#"You are keeping the minutes of a meeting, one agenda item at a time. This task runs repeatedly during the meeting: each call gives you the current minutes of one agenda item and the transcript segments spoken since the last call. You MUST follow these rules:

1. Return the COMPLETE updated minutes for this agenda item, not just the new part.
2. Keep everything the current minutes already record unless the new segments explicitly correct it.
3. Only record what the transcript says. Do not invent decisions, owners, numbers or dates.
4. Write concise Markdown bullet points. Record decisions, open questions and action items with owners.
5. If the new segments are unrelated to this agenda item, return the current minutes unchanged.

GOALS:
- Each open goal has a condition the meeting has to settle.
- Report a goal in "resolved_goals" ONLY if the transcript shows the condition was met.
- Copy the condition text exactly and state in "result" what was decided.

Submit your answer with the submit_minutes tool."#;

/// Build the user prompt for one synthesis pass
pub fn build_draft_prompt(request: &DraftRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("# Agenda item: {}\n\n", request.item_title));

    if !request.open_goals.is_empty() {
        prompt.push_str("## Open goals\n");
        for goal in &request.open_goals {
            prompt.push_str(&format!("- {}\n", goal.condition));
        }
        prompt.push('\n');
    }

    prompt.push_str("## Current minutes\n");
    if request.prior_text.trim().is_empty() {
        prompt.push_str("(none yet)\n\n");
    } else {
        prompt.push_str(request.prior_text.trim());
        prompt.push_str("\n\n");
    }

    prompt.push_str("## New transcript segments\n");
    if request.segments.is_empty() {
        prompt.push_str("(none; rewrite the current minutes for clarity)\n");
    }
    for segment in &request.segments {
        let speaker = segment.speaker.as_deref().unwrap_or("Unknown speaker");
        prompt.push_str(&format!(
            "[{} - {}] {}: {}\n",
            format_timestamp(segment.start_ms),
            format_timestamp(segment.end_ms),
            speaker,
            segment.text
        ));
    }

    prompt.push_str("\nUpdate the minutes for this agenda item with the new segments.\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgendaGoal, SegmentSpan, TranscriptSegment};

    #[test]
    fn test_prompt_lists_goals_and_segments() {
        let request = DraftRequest {
            item_title: "Budget".to_string(),
            prior_text: String::new(),
            segments: vec![TranscriptSegment {
                start_ms: 65_000,
                end_ms: 70_500,
                origin: SegmentSpan::new(65_000, 70_500),
                speaker: Some("Alice".to_string()),
                text: "We approve 40k for Q3".to_string(),
                item_id: None,
            }],
            open_goals: vec![AgendaGoal::new("Agree on the Q3 budget")],
        };

        let prompt = build_draft_prompt(&request);

        assert!(prompt.starts_with("# Agenda item: Budget"));
        assert!(prompt.contains("- Agree on the Q3 budget"));
        assert!(prompt.contains("(none yet)"));
        assert!(prompt.contains("[01:05.000 - 01:10.500] Alice: We approve 40k for Q3"));
    }

    #[test]
    fn test_prompt_for_refresh_without_segments() {
        let request = DraftRequest {
            item_title: "Hiring".to_string(),
            prior_text: "- Two roles open".to_string(),
            segments: vec![],
            open_goals: vec![],
        };

        let prompt = build_draft_prompt(&request);

        assert!(!prompt.contains("## Open goals"));
        assert!(prompt.contains("- Two roles open"));
        assert!(prompt.contains("rewrite the current minutes"));
    }
}
