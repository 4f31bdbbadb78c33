use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::SessionSnapshot;
use crate::models::{ActionSuggestion, Agenda, EntryTarget, ItemStatus, MinutesDocument};

/// Machine-readable report of one session
#[derive(Debug, Clone, Serialize)]
pub struct MinutesReport {
    pub session_id: String,
    pub generated_at: DateTime<Utc>,
    pub agenda: Agenda,
    pub minutes: MinutesDocument,
    pub suggestions: Vec<ActionSuggestion>,
    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub segments: usize,
    pub entries: usize,
    pub stale_entries: usize,
    pub unassigned_segments: usize,
    pub agenda_version: u64,
    pub minutes_revision: u64,
    pub duration_ms: u64,
}

impl MinutesReport {
    pub fn new(snapshot: SessionSnapshot, suggestions: Vec<ActionSuggestion>) -> Self {
        let duration_ms = match (snapshot.segments.first(), snapshot.segments.last()) {
            (Some(first), Some(last)) => last.end_ms.saturating_sub(first.start_ms),
            _ => 0,
        };
        let metadata = ReportMetadata {
            segments: snapshot.segments.len(),
            entries: snapshot.minutes.entries.len(),
            stale_entries: snapshot.minutes.stale_entries().count(),
            unassigned_segments: snapshot
                .minutes
                .entry(&EntryTarget::Unassigned)
                .map(|e| e.contributing.len() + e.pending.len())
                .unwrap_or(0),
            agenda_version: snapshot.agenda.version,
            minutes_revision: snapshot.minutes.revision,
            duration_ms,
        };

        Self {
            session_id: snapshot.session_id.to_string(),
            generated_at: Utc::now(),
            agenda: snapshot.agenda,
            minutes: snapshot.minutes,
            suggestions,
            metadata,
        }
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

/// Human-readable minutes in Markdown
pub struct HumanMinutes<'a> {
    report: &'a MinutesReport,
}

impl<'a> HumanMinutes<'a> {
    pub fn new(report: &'a MinutesReport) -> Self {
        Self { report }
    }

    pub fn format(&self) -> String {
        let agenda = &self.report.agenda;
        let minutes = &self.report.minutes;
        let mut output = String::from("# Meeting minutes\n\n");

        for item in &agenda.items {
            output.push_str(&format!(
                "## {}. {} ({})\n\n",
                item.ordinal + 1,
                item.title,
                status_label(item.status)
            ));

            for goal in &item.goals {
                let mark = if goal.done { "x" } else { " " };
                match &goal.result {
                    Some(result) => {
                        output.push_str(&format!("- [{}] {}: {}\n", mark, goal.condition, result))
                    }
                    None => output.push_str(&format!("- [{}] {}\n", mark, goal.condition)),
                }
            }
            if !item.goals.is_empty() {
                output.push('\n');
            }

            match minutes.entry(&EntryTarget::Item(item.id.clone())) {
                Some(entry) if !entry.text.is_empty() => {
                    output.push_str(entry.text.trim());
                    output.push_str("\n\n");
                    if entry.stale {
                        output.push_str("_Last refresh failed; showing the previous minutes._\n\n");
                    }
                }
                Some(entry) if entry.stale => {
                    output.push_str("_Drafting failed; segments are queued for the next refresh._\n\n");
                }
                _ => output.push_str("_Not discussed yet._\n\n"),
            }
        }

        if let Some(entry) = minutes.entry(&EntryTarget::Unassigned) {
            if !entry.text.is_empty() {
                output.push_str("## Outside the agenda\n\n");
                output.push_str(entry.text.trim());
                output.push_str("\n\n");
            }
        }

        output.push_str("## Carry-over\n\n");
        output.push_str(&wrap_text(&carry_over(agenda), 80));
        output.push_str("\n\n");

        if !self.report.suggestions.is_empty() {
            output.push_str("## Suggested actions\n\n");
            for suggestion in &self.report.suggestions {
                output.push_str(&format!(
                    "- {} ({:.0}%)\n",
                    suggestion.description,
                    suggestion.confidence * 100.0
                ));
            }
            output.push('\n');
        }

        output
    }

    /// Write to a Markdown file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

fn status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Pending => "not started",
        ItemStatus::InProgress => "in progress",
        ItemStatus::Closed => "closed",
    }
}

/// What the next interval of the meeting has to pick up
fn carry_over(agenda: &Agenda) -> String {
    let titles = |status: ItemStatus| -> Vec<&str> {
        agenda
            .items
            .iter()
            .filter(|i| i.status == status)
            .map(|i| i.title.as_str())
            .collect()
    };
    let closed = titles(ItemStatus::Closed);
    let in_progress = titles(ItemStatus::InProgress);
    let pending = titles(ItemStatus::Pending);

    let mut parts = Vec::new();
    if !closed.is_empty() {
        parts.push(format!("Closed: {}.", closed.join(", ")));
    }
    if !in_progress.is_empty() {
        parts.push(format!("Still in progress: {}.", in_progress.join(", ")));
    }
    if !pending.is_empty() {
        parts.push(format!("Not yet discussed: {}.", pending.join(", ")));
    }
    if parts.is_empty() {
        return "The agenda is empty.".to_string();
    }
    parts.join(" ")
}

/// Format milliseconds as MM:SS.mmm
pub fn format_timestamp(ms: u64) -> String {
    let seconds = ms / 1000;
    let millis = ms % 1000;
    let minutes = seconds / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}.{:03}", minutes, secs, millis)
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        if line_len + word.len() + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word.len();
    }

    result
}
