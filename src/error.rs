use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::engine::SessionId;
use crate::models::{EntryTarget, ItemId};

pub type EngineResult<T> = Result<T, EngineError>;

/// Agenda rule broken by a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationRule {
    EmptyTitle,
    DuplicateTitle,
    DuplicateOrdinal,
    DuplicateId,
    UnknownParent,
    ParentCycle,
    BackwardTransition,
}

/// One agenda validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub rule: ViolationRule,
    /// Position of the offending item in the submission
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    pub message: String,
}

impl Violation {
    pub fn new(rule: ViolationRule, index: usize, item_id: Option<&ItemId>, message: String) -> Self {
        Self {
            rule,
            index,
            item_id: item_id.cloned(),
            message,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item #{}: {}", self.index, self.message)
    }
}

/// Failures surfaced by the engine. All are scoped to one session and
/// recoverable by correcting input or retrying.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid agenda ({} violation(s)): {}", .0.len(), join_violations(.0))]
    InvalidAgenda(Vec<Violation>),

    #[error("fragment starting at {start_ms}ms is before the retention floor at {floor_ms}ms")]
    OutOfOrderFragment { start_ms: u64, floor_ms: u64 },

    #[error("invalid fragment: {0}")]
    InvalidFragment(String),

    #[error("drafting for {target} timed out after {timeout_ms}ms")]
    SynthesisTimeout { target: EntryTarget, timeout_ms: u64 },

    #[error("drafting for {target} failed: {reason}")]
    SynthesisFailure { target: EntryTarget, reason: String },

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session {0} was closed")]
    SessionClosed(SessionId),
}

impl EngineError {
    /// Retrying the same call may succeed without changing the input
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::SynthesisTimeout { .. }
                | EngineError::SynthesisFailure { .. }
                | EngineError::Transcription(_)
        )
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            EngineError::InvalidAgenda(violations) => violations,
            _ => &[],
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
