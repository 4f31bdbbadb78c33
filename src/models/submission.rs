use serde::{Deserialize, Serialize};

use super::{ItemId, ItemStatus};

/// A candidate agenda as submitted by the caller, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgendaSubmission {
    pub items: Vec<ItemDraft>,
    /// Allow status and goal transitions to move backward
    #[serde(default)]
    pub reset: bool,
}

/// One submitted agenda item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDraft {
    /// Existing id, or None for a new item
    #[serde(default)]
    pub id: Option<ItemId>,
    pub title: String,
    /// Caller ordering; any integers, normalized to 0..n-1 on acceptance
    pub ordinal: i64,
    /// None keeps the current status (pending for new items)
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default)]
    pub timebox_minutes: Option<u32>,
    #[serde(default)]
    pub parent: Option<ItemId>,
    #[serde(default)]
    pub goals: Vec<GoalDraft>,
}

impl ItemDraft {
    pub fn new(id: impl Into<String>, title: impl Into<String>, ordinal: i64) -> Self {
        Self {
            id: Some(ItemId::new(id)),
            title: title.into(),
            ordinal,
            status: None,
            timebox_minutes: None,
            parent: None,
            goals: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(ItemId::new(parent));
        self
    }

    pub fn with_goal(mut self, condition: impl Into<String>) -> Self {
        self.goals.push(GoalDraft {
            condition: condition.into(),
            done: None,
            result: None,
        });
        self
    }
}

/// A submitted goal; `done: None` keeps whatever the session recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalDraft {
    pub condition: String,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub result: Option<String>,
}
