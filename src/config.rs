use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{SegmenterConfig, SuggestConfig, SynthesisConfig};
use crate::matching::MatchConfig;

/// Engine-wide configuration; every section falls back to its defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub segmenter: SegmenterConfig,
    pub synthesis: SynthesisConfig,
    pub matching: MatchConfig,
    pub suggest: SuggestConfig,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse engine config JSON")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchStrategy;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.segmenter.retention_horizon_ms, 600_000);
        assert_eq!(config.synthesis.max_retries, 5);
        assert_eq!(config.matching.min_match_score, 0.5);
        assert!(config.suggest.limit.is_none());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(
            r#"{"synthesis": {"draft_timeout_ms": 5000}, "matching": {"strategy": "bigram"}}"#,
        )
        .unwrap();

        assert_eq!(config.synthesis.draft_timeout_ms, 5_000);
        assert_eq!(config.synthesis.backoff_base_ms, 1_000);
        assert_eq!(config.matching.strategy, MatchStrategy::Bigram);
        assert_eq!(config.segmenter.max_gap_ms, 1_500);
    }
}
