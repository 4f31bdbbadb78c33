use serde::{Deserialize, Serialize};

use super::ItemId;

/// One weighted phrase of a template's trigger pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerPhrase {
    pub phrase: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_saturation() -> f64 {
    2.0
}

/// A canonical follow-up action the engine can propose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub id: String,
    pub label: String,
    pub triggers: Vec<TriggerPhrase>,
    /// Rendered with `{title}` and `{signal}` placeholders
    pub description: String,
    /// Minimum confidence for the template to fire
    pub threshold: f64,
    /// Summed trigger weight that maps to confidence 1.0
    #[serde(default = "default_saturation")]
    pub saturation: f64,
}

impl ActionTemplate {
    fn builtin(
        id: &str,
        label: &str,
        description: &str,
        threshold: f64,
        triggers: &[(&str, f64)],
    ) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            triggers: triggers
                .iter()
                .map(|(phrase, weight)| TriggerPhrase {
                    phrase: phrase.to_string(),
                    weight: *weight,
                })
                .collect(),
            description: description.to_string(),
            threshold,
            saturation: default_saturation(),
        }
    }

    pub fn render(&self, title: &str, signal: &str) -> String {
        self.description
            .replace("{title}", title)
            .replace("{signal}", signal)
    }
}

/// Process-wide, read-only catalog of action templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCatalog {
    templates: Vec<ActionTemplate>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<ActionTemplate>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &[ActionTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&ActionTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The catalog shipped with the engine
    pub fn builtin() -> Self {
        Self::new(vec![
            ActionTemplate::builtin(
                "highlight_unresolved_points",
                "Highlight unresolved points",
                "Point out what is still unresolved in \"{title}\" (raised: \"{signal}\")",
                0.5,
                &[
                    ("unresolved", 1.0),
                    ("open question", 1.0),
                    ("need to decide", 0.8),
                    ("undecided", 0.8),
                    ("not sure", 0.6),
                    ("revisit", 0.6),
                    ("disagree", 0.6),
                    ("tbd", 0.6),
                ],
            ),
            ActionTemplate::builtin(
                "suggest_related_ideas",
                "Suggest related ideas",
                "Offer related ideas for \"{title}\" (prompted by \"{signal}\")",
                0.5,
                &[
                    ("what if", 0.8),
                    ("alternative", 0.8),
                    ("brainstorm", 0.8),
                    ("idea", 0.6),
                    ("could also", 0.6),
                    ("option", 0.5),
                    ("maybe we", 0.5),
                ],
            ),
            ActionTemplate::builtin(
                "raise_off_agenda_topics",
                "Raise off-agenda topics",
                "Park the off-agenda topic raised during \"{title}\" (\"{signal}\")",
                0.5,
                &[
                    ("parking lot", 1.0),
                    ("out of scope", 1.0),
                    ("another topic", 0.8),
                    ("side note", 0.6),
                    ("separately", 0.6),
                    ("offline", 0.6),
                ],
            ),
            ActionTemplate::builtin(
                "assign_follow_up_owner",
                "Assign a follow-up owner",
                "Name an owner for the follow-up on \"{title}\" (\"{signal}\")",
                0.5,
                &[
                    ("action item", 1.0),
                    ("follow up", 0.8),
                    ("take care of", 0.6),
                    ("owner", 0.6),
                    ("assign", 0.6),
                    ("will send", 0.6),
                ],
            ),
            ActionTemplate::builtin(
                "schedule_follow_up_meeting",
                "Schedule a follow-up meeting",
                "Schedule a follow-up meeting for \"{title}\" (\"{signal}\")",
                0.5,
                &[
                    ("next meeting", 1.0),
                    ("follow-up meeting", 1.0),
                    ("reconvene", 0.8),
                    ("schedule", 0.6),
                    ("next week", 0.6),
                ],
            ),
        ])
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// A proposed action, derived fresh on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSuggestion {
    pub template_id: String,
    pub item_id: ItemId,
    pub description: String,
    /// Normalized signal strength in [0, 1]
    pub confidence: f64,
    /// Trigger phrases found in the minutes text
    pub signals: Vec<String>,
}
