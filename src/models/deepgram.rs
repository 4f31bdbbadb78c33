use serde::{Deserialize, Serialize};

use super::RawFragment;

/// Root of a Deepgram pre-recorded response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramResponse {
    pub results: DeepgramResults,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramResults {
    pub channels: Vec<DeepgramChannel>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramChannel {
    pub alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramAlternative {
    #[serde(default)]
    pub words: Vec<DeepgramWord>,
}

/// A single recognized word
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramWord {
    pub word: String,
    /// Start timestamp in seconds
    pub start: f64,
    /// End timestamp in seconds
    pub end: f64,
    /// Present only when diarization was requested
    #[serde(default)]
    pub speaker: Option<u32>,
    #[serde(default)]
    pub punctuated_word: Option<String>,
}

impl DeepgramWord {
    fn text(&self) -> &str {
        self.punctuated_word.as_deref().unwrap_or(&self.word)
    }
}

impl DeepgramResponse {
    /// Words of the first channel's first alternative
    pub fn words(&self) -> &[DeepgramWord] {
        self.results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.words.as_slice())
            .unwrap_or(&[])
    }

    /// Fold words into fragments: a new fragment starts when the speaker
    /// changes or the pause between words exceeds `max_gap_ms`
    pub fn fragments(&self, max_gap_ms: u64) -> Vec<RawFragment> {
        let mut fragments = Vec::new();
        let mut current: Option<(RawFragment, Option<u32>)> = None;

        for word in self.words() {
            let start_ms = (word.start * 1000.0).round() as u64;
            let end_ms = (word.end * 1000.0).round() as u64;

            if let Some((fragment, speaker)) = current.as_mut() {
                let gap = start_ms.saturating_sub(fragment.end_ms);
                if *speaker == word.speaker && gap <= max_gap_ms {
                    fragment.text.push(' ');
                    fragment.text.push_str(word.text());
                    fragment.end_ms = fragment.end_ms.max(end_ms);
                    continue;
                }
            }

            if let Some((fragment, _)) = current.take() {
                fragments.push(fragment);
            }

            let mut fragment = RawFragment::new(start_ms, end_ms, word.text());
            fragment.speaker = word.speaker.map(|s| format!("Speaker {}", s));
            current = Some((fragment, word.speaker));
        }

        if let Some((fragment, _)) = current {
            fragments.push(fragment);
        }

        fragments
    }
}
