use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{EngineError, EngineResult, Violation, ViolationRule};
use crate::models::{Agenda, AgendaGoal, AgendaItem, AgendaSubmission, ItemDraft, ItemId};

/// Validate a candidate agenda against the session's current one.
///
/// Every rule is checked independently and all violations are returned
/// together. On success the returned agenda has dense ordinals `0..n-1`,
/// trimmed titles and statuses/goals merged from the current agenda where the
/// submission leaves them out. Its version is the current version; bumping it
/// is left to whoever applies the result.
pub fn validate_agenda(submission: &AgendaSubmission, current: &Agenda) -> EngineResult<Agenda> {
    let drafts = &submission.items;
    let ids = assign_ids(drafts, current);
    let mut violations = Vec::new();

    check_titles(drafts, &ids, &mut violations);
    check_ordinals(drafts, &ids, &mut violations);
    check_ids(&ids, &mut violations);
    check_parents(drafts, &ids, &mut violations);
    if !submission.reset {
        check_transitions(drafts, &ids, current, &mut violations);
    }

    if !violations.is_empty() {
        violations.sort_by_key(|v| v.index);
        debug!("Agenda rejected with {} violation(s)", violations.len());
        return Err(EngineError::InvalidAgenda(violations));
    }

    let mut order: Vec<usize> = (0..drafts.len()).collect();
    order.sort_by_key(|&index| (drafts[index].ordinal, index));

    let items = order
        .into_iter()
        .enumerate()
        .map(|(ordinal, index)| build_item(&drafts[index], &ids[index], ordinal as u32, current))
        .collect();

    Ok(Agenda {
        items,
        version: current.version,
    })
}

/// Submitted ids, or the id of a current item with the same title and
/// parent, or a fresh one
fn assign_ids(drafts: &[ItemDraft], current: &Agenda) -> Vec<ItemId> {
    drafts
        .iter()
        .map(|draft| match &draft.id {
            Some(id) => id.clone(),
            None => current
                .items
                .iter()
                .find(|item| {
                    item.parent == draft.parent && title_key(&item.title) == title_key(&draft.title)
                })
                .map(|item| item.id.clone())
                .unwrap_or_else(ItemId::generate),
        })
        .collect()
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

fn check_titles(drafts: &[ItemDraft], ids: &[ItemId], violations: &mut Vec<Violation>) {
    let mut seen: HashMap<(Option<&ItemId>, String), usize> = HashMap::new();

    for (index, draft) in drafts.iter().enumerate() {
        let key = title_key(&draft.title);
        if key.is_empty() {
            violations.push(Violation::new(
                ViolationRule::EmptyTitle,
                index,
                Some(&ids[index]),
                "title is empty".to_string(),
            ));
            continue;
        }

        match seen.get(&(draft.parent.as_ref(), key.clone())) {
            Some(first) => violations.push(Violation::new(
                ViolationRule::DuplicateTitle,
                index,
                Some(&ids[index]),
                format!(
                    "title \"{}\" duplicates item #{} at the same level",
                    draft.title.trim(),
                    first
                ),
            )),
            None => {
                seen.insert((draft.parent.as_ref(), key), index);
            }
        }
    }
}

fn check_ordinals(drafts: &[ItemDraft], ids: &[ItemId], violations: &mut Vec<Violation>) {
    let mut by_ordinal: HashMap<i64, Vec<usize>> = HashMap::new();
    for (index, draft) in drafts.iter().enumerate() {
        by_ordinal.entry(draft.ordinal).or_default().push(index);
    }

    for (ordinal, indices) in by_ordinal {
        if indices.len() < 2 {
            continue;
        }
        let index = indices[1];
        violations.push(Violation::new(
            ViolationRule::DuplicateOrdinal,
            index,
            Some(&ids[index]),
            format!("ordinal {} is used {} times", ordinal, indices.len()),
        ));
    }
}

fn check_ids(ids: &[ItemId], violations: &mut Vec<Violation>) {
    let mut seen = HashSet::new();
    for (index, id) in ids.iter().enumerate() {
        if !seen.insert(id) {
            violations.push(Violation::new(
                ViolationRule::DuplicateId,
                index,
                Some(id),
                format!("id {} appears more than once", id),
            ));
        }
    }
}

fn check_parents(drafts: &[ItemDraft], ids: &[ItemId], violations: &mut Vec<Violation>) {
    let parents: HashMap<&ItemId, &ItemId> = ids
        .iter()
        .zip(drafts)
        .filter_map(|(id, draft)| draft.parent.as_ref().map(|parent| (id, parent)))
        .collect();

    for (index, draft) in drafts.iter().enumerate() {
        let Some(parent) = &draft.parent else {
            continue;
        };
        let id = &ids[index];

        if parent == id {
            violations.push(Violation::new(
                ViolationRule::ParentCycle,
                index,
                Some(id),
                "item is its own parent".to_string(),
            ));
            continue;
        }
        if !ids.contains(parent) {
            violations.push(Violation::new(
                ViolationRule::UnknownParent,
                index,
                Some(id),
                format!("parent {} is not part of the agenda", parent),
            ));
            continue;
        }

        // Walk up the chain; a chain longer than the item count must loop.
        let mut cursor = parent;
        for _ in 0..ids.len() {
            if cursor == id {
                violations.push(Violation::new(
                    ViolationRule::ParentCycle,
                    index,
                    Some(id),
                    "parent chain loops back to this item".to_string(),
                ));
                break;
            }
            match parents.get(cursor) {
                Some(next) => cursor = next,
                None => break,
            }
        }
    }
}

fn check_transitions(
    drafts: &[ItemDraft],
    ids: &[ItemId],
    current: &Agenda,
    violations: &mut Vec<Violation>,
) {
    for (index, draft) in drafts.iter().enumerate() {
        let id = &ids[index];
        let Some(existing) = current.get(id) else {
            continue;
        };

        if let Some(status) = draft.status {
            if status < existing.status {
                violations.push(Violation::new(
                    ViolationRule::BackwardTransition,
                    index,
                    Some(id),
                    format!("status cannot move from {} back to {}", existing.status, status),
                ));
            }
        }

        for goal in &draft.goals {
            let reopened = goal.done == Some(false)
                && existing
                    .goals
                    .iter()
                    .any(|g| g.done && title_key(&g.condition) == title_key(&goal.condition));
            if reopened {
                violations.push(Violation::new(
                    ViolationRule::BackwardTransition,
                    index,
                    Some(id),
                    format!("goal \"{}\" is already done", goal.condition.trim()),
                ));
            }
        }
    }
}

fn build_item(draft: &ItemDraft, id: &ItemId, ordinal: u32, current: &Agenda) -> AgendaItem {
    let existing = current.get(id);

    let goals = draft
        .goals
        .iter()
        .map(|goal| {
            let previous = existing.and_then(|item| {
                item.goals
                    .iter()
                    .find(|g| title_key(&g.condition) == title_key(&goal.condition))
            });
            let done = goal
                .done
                .or(previous.map(|g| g.done))
                .unwrap_or(false);
            let result = goal
                .result
                .clone()
                .or_else(|| previous.and_then(|g| g.result.clone()))
                .filter(|_| done);
            AgendaGoal {
                condition: goal.condition.trim().to_string(),
                done,
                result,
            }
        })
        .collect();

    AgendaItem {
        id: id.clone(),
        title: draft.title.trim().to_string(),
        ordinal,
        status: draft
            .status
            .or(existing.map(|item| item.status))
            .unwrap_or_default(),
        timebox_minutes: draft.timebox_minutes,
        parent: draft.parent.clone(),
        goals,
    }
}
