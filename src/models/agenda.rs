use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Stable identifier of an agenda item, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier for items submitted without one
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// Agenda files written by hand often use numeric ids.
impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => ItemId(text),
            RawId::Number(number) => ItemId(number.to_string()),
        })
    }
}

/// Lifecycle of an agenda item. Ordered: transitions only move forward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    InProgress,
    Closed,
}

impl ItemStatus {
    /// Pending and in-progress items still accept discussion
    pub fn is_open(self) -> bool {
        !matches!(self, ItemStatus::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition the meeting has to settle for an agenda item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaGoal {
    /// What must be decided, e.g. "agree on the Q3 budget"
    pub condition: String,
    /// Whether the condition has been met
    #[serde(default)]
    pub done: bool,
    /// What was actually decided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl AgendaGoal {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            done: false,
            result: None,
        }
    }
}

/// A goal reported as achieved by the drafting collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedGoal {
    pub condition: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaItem {
    pub id: ItemId,
    pub title: String,
    /// Dense position in the agenda (0..n-1 once accepted)
    pub ordinal: u32,
    #[serde(default)]
    pub status: ItemStatus,
    /// Optional time-box estimate in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timebox_minutes: Option<u32>,
    /// Parent item for nested agendas; siblings share a parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ItemId>,
    #[serde(default)]
    pub goals: Vec<AgendaGoal>,
}

impl AgendaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, ordinal: u32) -> Self {
        Self {
            id: ItemId::new(id),
            title: title.into(),
            ordinal,
            status: ItemStatus::Pending,
            timebox_minutes: None,
            parent: None,
            goals: Vec::new(),
        }
    }

    /// True when the item has goals and every one of them is met
    pub fn goals_complete(&self) -> bool {
        !self.goals.is_empty() && self.goals.iter().all(|g| g.done)
    }
}

/// The accepted agenda of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agenda {
    /// Items in ordinal order
    pub items: Vec<AgendaItem>,
    /// Incremented on every structural change
    pub version: u64,
}

impl Agenda {
    pub fn get(&self, id: &ItemId) -> Option<&AgendaItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    pub fn get_mut(&mut self, id: &ItemId) -> Option<&mut AgendaItem> {
        self.items.iter_mut().find(|item| item.id == *id)
    }

    /// Items that still accept discussion, in ordinal order
    pub fn open_items(&self) -> impl Iterator<Item = &AgendaItem> {
        self.items.iter().filter(|item| item.status.is_open())
    }

    pub fn ordinal_of(&self, id: &ItemId) -> Option<u32> {
        self.get(id).map(|item| item.ordinal)
    }

    /// Move an item's status forward. Backward moves are ignored.
    /// Returns true (and bumps the version) if the status changed.
    pub fn advance_status(&mut self, id: &ItemId, to: ItemStatus) -> bool {
        let Some(item) = self.get_mut(id) else {
            return false;
        };
        if to <= item.status {
            return false;
        }
        item.status = to;
        self.version += 1;
        true
    }

    /// Mark goals reported as achieved, matching on the condition text.
    /// Goals already done keep their recorded result.
    /// Returns true (and bumps the version) if any goal changed.
    pub fn resolve_goals(&mut self, id: &ItemId, resolved: &[ResolvedGoal]) -> bool {
        let Some(item) = self.get_mut(id) else {
            return false;
        };

        let mut changed = false;
        for report in resolved {
            let wanted = report.condition.trim();
            let goal = item
                .goals
                .iter_mut()
                .find(|g| !g.done && g.condition.trim().eq_ignore_ascii_case(wanted));
            if let Some(goal) = goal {
                goal.done = true;
                goal.result = Some(report.result.trim().to_string());
                changed = true;
            }
        }

        if changed {
            self.version += 1;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_agenda() -> Agenda {
        let mut budget = AgendaItem::new("1", "Budget", 0);
        budget.goals = vec![AgendaGoal::new("Agree on the Q3 budget")];
        Agenda {
            items: vec![budget, AgendaItem::new("2", "Hiring", 1)],
            version: 1,
        }
    }

    #[test]
    fn test_item_id_accepts_numbers() {
        let item: AgendaItem =
            serde_json::from_str(r#"{"id": 1, "title": "Budget", "ordinal": 0}"#).unwrap();
        assert_eq!(item.id, ItemId::new("1"));
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(serde_json::to_string(&item.id).unwrap(), r#""1""#);
    }

    #[test]
    fn test_status_order() {
        assert!(ItemStatus::Pending < ItemStatus::InProgress);
        assert!(ItemStatus::InProgress < ItemStatus::Closed);
        assert!(ItemStatus::InProgress.is_open());
        assert!(!ItemStatus::Closed.is_open());
    }

    #[test]
    fn test_advance_status_only_moves_forward() {
        let mut agenda = sample_agenda();
        let id = ItemId::new("1");

        assert!(agenda.advance_status(&id, ItemStatus::Closed));
        assert_eq!(agenda.version, 2);

        assert!(!agenda.advance_status(&id, ItemStatus::InProgress));
        assert_eq!(agenda.get(&id).unwrap().status, ItemStatus::Closed);
        assert_eq!(agenda.version, 2);
    }

    #[test]
    fn test_resolve_goals() {
        let mut agenda = sample_agenda();
        let id = ItemId::new("1");
        let resolved = vec![ResolvedGoal {
            condition: "agree on the q3 budget".to_string(),
            result: "Budget approved at 40k".to_string(),
        }];

        assert!(agenda.resolve_goals(&id, &resolved));
        let item = agenda.get(&id).unwrap();
        assert!(item.goals_complete());
        assert_eq!(item.goals[0].result.as_deref(), Some("Budget approved at 40k"));

        // Already done: nothing changes the second time
        assert!(!agenda.resolve_goals(&id, &resolved));
        assert_eq!(agenda.version, 2);
    }

    #[test]
    fn test_open_items_skip_closed() {
        let mut agenda = sample_agenda();
        agenda.advance_status(&ItemId::new("1"), ItemStatus::Closed);
        let open: Vec<_> = agenda.open_items().map(|i| i.title.as_str()).collect();
        assert_eq!(open, vec!["Hiring"]);
    }
}
