use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AgendaGoal, ResolvedGoal, TranscriptSegment};

/// Title used when drafting the unassigned bucket
pub const UNASSIGNED_TITLE: &str = "Discussion outside the agenda";

/// Everything the drafting collaborator sees for one synthesis pass
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub item_title: String,
    /// Minutes text produced by the previous successful pass
    pub prior_text: String,
    /// New raw segments, in start order
    pub segments: Vec<TranscriptSegment>,
    /// Goals of the item that are still open
    pub open_goals: Vec<AgendaGoal>,
}

/// Output of one drafting call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    #[serde(default)]
    pub resolved_goals: Vec<ResolvedGoal>,
}

#[derive(Debug, Error)]
pub enum DraftError {
    /// Network failures, rate limits, malformed model output
    #[error("transient drafting error: {0}")]
    Transient(String),

    /// Rejected requests that will fail the same way on retry
    #[error("drafting rejected: {0}")]
    Permanent(String),
}

impl DraftError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DraftError::Transient(_))
    }
}

/// The language-model collaborator that turns raw segments into prose.
///
/// Treated as a function of (prior text, new segments) for contract
/// purposes; two successful outputs for the same input are equally valid.
#[async_trait]
pub trait Drafter: Send + Sync {
    async fn draft(&self, request: &DraftRequest) -> Result<Draft, DraftError>;

    /// Short identifier used in logs, e.g. "anthropic" or "extractive"
    fn drafter_id(&self) -> &str;
}

/// Reject drafts that would regress an entry
pub fn validate_draft(draft: &Draft) -> Result<(), String> {
    if draft.text.trim().is_empty() {
        return Err("drafter returned empty text".to_string());
    }
    Ok(())
}
