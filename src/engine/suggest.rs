use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{
    ActionSuggestion, ActionTemplate, Agenda, AgendaItem, EntryTarget, MinutesDocument,
    TemplateCatalog,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    /// Floor applied on top of each template's own threshold
    pub min_confidence: f64,
    pub limit: Option<usize>,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            limit: None,
        }
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whole-word, case-insensitive phrase containment
fn contains_phrase(haystack: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && haystack.windows(phrase.len()).any(|window| window == phrase)
}

fn score(template: &ActionTemplate, text: &[String]) -> (f64, Vec<String>) {
    let mut total = 0.0;
    let mut signals = Vec::new();

    for trigger in &template.triggers {
        if contains_phrase(text, &words(&trigger.phrase)) {
            total += trigger.weight;
            signals.push(trigger.phrase.clone());
        }
    }

    let confidence = if template.saturation > 0.0 {
        (total / template.saturation).min(1.0)
    } else {
        0.0
    };
    (confidence, signals)
}

fn strongest_signal(template: &ActionTemplate, signals: &[String]) -> String {
    template
        .triggers
        .iter()
        .filter(|t| signals.contains(&t.phrase))
        .max_by(|a, b| a.weight.total_cmp(&b.weight))
        .map(|t| t.phrase.clone())
        .unwrap_or_default()
}

/// Score the minutes of every open item against the template catalog.
///
/// Ordered by confidence (highest first), then agenda position, then
/// template id.
pub fn suggest(
    agenda: &Agenda,
    minutes: &MinutesDocument,
    catalog: &TemplateCatalog,
    config: &SuggestConfig,
) -> Vec<ActionSuggestion> {
    let mut found: Vec<(u32, ActionSuggestion)> = Vec::new();

    for item in agenda.open_items() {
        let Some(entry) = minutes.entry(&EntryTarget::Item(item.id.clone())) else {
            continue;
        };
        if entry.text.trim().is_empty() {
            continue;
        }
        let text = words(&entry.text);

        for template in catalog.templates() {
            let (confidence, signals) = score(template, &text);
            if confidence <= 0.0 || confidence < template.threshold.max(config.min_confidence) {
                continue;
            }
            found.push((item.ordinal, build(item, template, confidence, signals)));
        }
    }

    found.sort_by(|(ordinal_a, a), (ordinal_b, b)| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(ordinal_a.cmp(ordinal_b))
            .then_with(|| a.template_id.cmp(&b.template_id))
    });

    let mut suggestions: Vec<ActionSuggestion> = found.into_iter().map(|(_, s)| s).collect();
    if let Some(limit) = config.limit {
        suggestions.truncate(limit);
    }
    debug!("{} action suggestion(s)", suggestions.len());
    suggestions
}

fn build(
    item: &AgendaItem,
    template: &ActionTemplate,
    confidence: f64,
    signals: Vec<String>,
) -> ActionSuggestion {
    let signal = strongest_signal(template, &signals);
    ActionSuggestion {
        template_id: template.id.clone(),
        item_id: item.id.clone(),
        description: template.render(&item.title, &signal),
        confidence,
        signals,
    }
}
