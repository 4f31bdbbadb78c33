use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{ActionTemplate, AgendaSubmission, DeepgramResponse, RawFragment, TemplateCatalog};

/// Parse an agenda submission file
pub fn parse_agenda_file(path: &Path) -> Result<AgendaSubmission> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_agenda_json(&content)
}

/// Parse an agenda submission from JSON
pub fn parse_agenda_json(json: &str) -> Result<AgendaSubmission> {
    serde_json::from_str(json).context("Failed to parse agenda JSON")
}

/// Accepted transcript layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    List(Vec<RawFragment>),
    Wrapped { fragments: Vec<RawFragment> },
    Deepgram(DeepgramResponse),
}

/// Parse a transcript file: a fragment list, `{"fragments": [...]}`, or a
/// Deepgram response whose words are folded into fragments
pub fn parse_fragments_file(path: &Path, max_gap_ms: u64) -> Result<Vec<RawFragment>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_fragments_json(&content, max_gap_ms)
}

pub fn parse_fragments_json(json: &str, max_gap_ms: u64) -> Result<Vec<RawFragment>> {
    let file: TranscriptFile =
        serde_json::from_str(json).context("Failed to parse transcript JSON")?;
    Ok(match file {
        TranscriptFile::List(fragments) => fragments,
        TranscriptFile::Wrapped { fragments } => fragments,
        TranscriptFile::Deepgram(response) => response.fragments(max_gap_ms),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<ActionTemplate>),
    Wrapped { templates: Vec<ActionTemplate> },
}

/// Load an action template catalog from JSON
pub fn parse_catalog_file(path: &Path) -> Result<TemplateCatalog> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let file: CatalogFile =
        serde_json::from_str(&content).context("Failed to parse template catalog JSON")?;
    Ok(match file {
        CatalogFile::List(templates) | CatalogFile::Wrapped { templates } => {
            TemplateCatalog::new(templates)
        }
    })
}
