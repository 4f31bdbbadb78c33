use std::collections::HashSet;

use super::{tokenize, TitleMatcher};

/// Share of the title's keywords that appear in the text.
///
/// A trailing plural "s" is ignored on both sides so "budgets" still
/// matches a "Budget" item.
pub struct KeywordMatcher {
    stop_words: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(stop_words: &[String]) -> Self {
        Self {
            stop_words: stop_words.to_vec(),
        }
    }

    fn keywords(&self, text: &str) -> HashSet<String> {
        tokenize(text, &self.stop_words).map(|w| stem(&w)).collect()
    }
}

fn stem(word: &str) -> String {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

impl TitleMatcher for KeywordMatcher {
    fn score(&self, text: &str, title: &str) -> f64 {
        let title_words = self.keywords(title);
        if title_words.is_empty() {
            return 0.0;
        }
        let text_words = self.keywords(text);
        let hits = title_words.intersection(&text_words).count();
        hits as f64 / title_words.len() as f64
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
