use std::collections::HashMap;

use super::{tokenize, TitleMatcher};

/// Containment of the title's character bigrams in the text.
///
/// Bigrams are taken per word so word boundaries never create spurious
/// pairs. Counting is multiset-based: a bigram occurring twice in the
/// title needs two occurrences in the text.
pub struct BigramMatcher {
    stop_words: Vec<String>,
}

impl BigramMatcher {
    pub fn new(stop_words: &[String]) -> Self {
        Self {
            stop_words: stop_words.to_vec(),
        }
    }

    fn bigrams(&self, text: &str) -> HashMap<(char, char), usize> {
        let mut counts = HashMap::new();
        for word in tokenize(text, &self.stop_words) {
            let chars: Vec<char> = word.chars().collect();
            if chars.len() == 1 {
                *counts.entry((chars[0], ' ')).or_insert(0) += 1;
            }
            for pair in chars.windows(2) {
                *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl TitleMatcher for BigramMatcher {
    fn score(&self, text: &str, title: &str) -> f64 {
        let title_bigrams = self.bigrams(title);
        let total: usize = title_bigrams.values().sum();
        if total == 0 {
            return 0.0;
        }

        let text_bigrams = self.bigrams(text);
        let shared: usize = title_bigrams
            .iter()
            .map(|(bigram, count)| (*count).min(text_bigrams.get(bigram).copied().unwrap_or(0)))
            .sum();

        shared as f64 / total as f64
    }

    fn name(&self) -> &str {
        "bigram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchConfig;

    fn matcher() -> BigramMatcher {
        BigramMatcher::new(&MatchConfig::default().stop_words)
    }

    #[test]
    fn test_exact_word_scores_one() {
        assert_eq!(matcher().score("Let's discuss the budget now", "Budget"), 1.0);
    }

    #[test]
    fn test_inflection_scores_high() {
        let score = matcher().score("we are budgeting for next year", "Budget");
        assert!(score > 0.9, "score was {}", score);
    }

    #[test]
    fn test_typo_scores_partially() {
        let score = matcher().score("the budjet is tight", "Budget");
        assert!(score > 0.3 && score < 1.0, "score was {}", score);
    }

    #[test]
    fn test_unrelated_text_scores_low() {
        let score = matcher().score("lunch options downstairs", "Budget");
        assert!(score < 0.3, "score was {}", score);
    }
}
