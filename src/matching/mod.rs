pub mod bigram;
pub mod keyword;

pub use bigram::*;
pub use keyword::*;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{AgendaItem, ItemId};

/// Scores how strongly a piece of transcript text is about an agenda title.
/// Scores are in [0, 1]; higher is a better match.
pub trait TitleMatcher: Send + Sync {
    fn score(&self, text: &str, title: &str) -> f64;

    fn name(&self) -> &str;
}

/// Available matching strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Share of title keywords present in the text
    #[default]
    Keyword,
    /// Character-bigram containment, tolerant of inflection and typos
    Bigram,
}

/// Configuration for routing segments to agenda items
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub strategy: MatchStrategy,
    /// Minimum score for a segment to be routed to an item
    pub min_match_score: f64,
    /// Words ignored when comparing text to titles
    pub stop_words: Vec<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::Keyword,
            min_match_score: 0.5,
            stop_words: [
                "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it",
                "its", "let's", "now", "of", "on", "or", "our", "so", "that", "the", "this", "to",
                "we", "with", "discuss", "talk", "about",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
        }
    }
}

impl MatchConfig {
    pub fn build_matcher(&self) -> Arc<dyn TitleMatcher> {
        match self.strategy {
            MatchStrategy::Keyword => Arc::new(KeywordMatcher::new(&self.stop_words)),
            MatchStrategy::Bigram => Arc::new(BigramMatcher::new(&self.stop_words)),
        }
    }
}

/// Lowercase words of `text` (letters, digits and apostrophes), minus stop words
pub fn tokenize<'a>(text: &'a str, stop_words: &'a [String]) -> impl Iterator<Item = String> + 'a {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .filter(move |w| !stop_words.iter().any(|s| s == w))
}

/// Pick the best-scoring candidate at or above `min_score`.
/// Ties go to the lower ordinal.
pub fn best_match<'a>(
    matcher: &dyn TitleMatcher,
    text: &str,
    candidates: impl IntoIterator<Item = &'a AgendaItem>,
    min_score: f64,
) -> Option<(ItemId, f64)> {
    let mut best: Option<(&AgendaItem, f64)> = None;

    for item in candidates {
        let score = matcher.score(text, &item.title);
        if score < min_score {
            continue;
        }
        let better = match best {
            None => true,
            Some((current, current_score)) => {
                score > current_score || (score == current_score && item.ordinal < current.ordinal)
            }
        };
        if better {
            best = Some((item, score));
        }
    }

    best.map(|(item, score)| (item.id.clone(), score))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stop_words_and_punctuation() {
        let config = MatchConfig::default();
        let words: Vec<String> = tokenize("Let's discuss the BUDGET, now!", &config.stop_words).collect();
        assert_eq!(words, vec!["budget"]);
    }

    #[test]
    fn test_best_match_prefers_lower_ordinal_on_tie() {
        let config = MatchConfig::default();
        let matcher = config.build_matcher();
        let items = vec![
            AgendaItem::new("late", "Budget review", 3),
            AgendaItem::new("early", "Budget planning", 1),
        ];

        let (id, score) = best_match(matcher.as_ref(), "budget", &items, 0.4).unwrap();

        assert_eq!(id, ItemId::new("early"));
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_best_match_respects_threshold() {
        let config = MatchConfig::default();
        let matcher = config.build_matcher();
        let items = vec![AgendaItem::new("1", "Hiring plan", 0)];

        assert!(best_match(matcher.as_ref(), "the budget is tight", &items, 0.5).is_none());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: MatchConfig =
            serde_json::from_str(r#"{"strategy": "bigram", "min_match_score": 0.7}"#).unwrap();
        assert_eq!(config.strategy, MatchStrategy::Bigram);
        assert!(!config.stop_words.is_empty());
        assert_eq!(config.build_matcher().name(), "bigram");
    }
}
