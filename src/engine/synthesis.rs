use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::llm::{validate_draft, Draft, DraftRequest, Drafter, UNASSIGNED_TITLE};
use crate::matching::{best_match, TitleMatcher};
use crate::models::{
    Agenda, EntryTarget, ItemId, ItemStatus, MinutesEntry, ResolvedGoal, SegmentLog,
    TranscriptSegment,
};

use super::session::Session;

/// Configuration for drafting passes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Upper bound for a single drafter call
    pub draft_timeout_ms: u64,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            draft_timeout_ms: 30_000,
            max_retries: 5,
            backoff_base_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl SynthesisConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.backoff_base_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Applied,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub target: EntryTarget,
    pub segments_added: usize,
    pub status: PassStatus,
}

/// Outcome of one `synthesize` call across all touched targets
#[derive(Debug, Default)]
pub struct SynthesisReport {
    pub passes: Vec<PassSummary>,
    pub failures: Vec<EngineError>,
}

impl SynthesisReport {
    pub fn applied(&self) -> usize {
        self.passes
            .iter()
            .filter(|p| p.status == PassStatus::Applied)
            .count()
    }
}

/// How a pass treats the entry's existing text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassMode {
    /// Extend the prior text with new and pending segments
    Merge,
    /// Drafted speech was replaced; rebuild from the segment log
    Supersede,
    /// Caller-requested rebuild from the segment log
    Refresh,
}

/// Routes segments to minutes entries and drafts them
#[derive(Clone)]
pub struct Synthesizer {
    drafter: Arc<dyn Drafter>,
    matcher: Arc<dyn TitleMatcher>,
    min_match_score: f64,
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(
        drafter: Arc<dyn Drafter>,
        matcher: Arc<dyn TitleMatcher>,
        min_match_score: f64,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            drafter,
            matcher,
            min_match_score,
            config,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn TitleMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn drafter_id(&self) -> &str {
        self.drafter.drafter_id()
    }

    /// Pick the entry a segment belongs to.
    ///
    /// An explicit binding to a known item wins; otherwise the best title
    /// match among open items, otherwise unassigned.
    pub fn route(&self, agenda: &Agenda, segment: &TranscriptSegment) -> EntryTarget {
        if let Some(id) = &segment.item_id {
            if agenda.get(id).is_some() {
                return EntryTarget::Item(id.clone());
            }
            warn!(
                "Segment {}-{}ms is bound to unknown item {}, matching by content",
                segment.start_ms, segment.end_ms, id
            );
        }

        match best_match(
            self.matcher.as_ref(),
            &segment.text,
            agenda.open_items(),
            self.min_match_score,
        ) {
            Some((id, score)) => {
                debug!(
                    "Segment {}-{}ms matched item {} ({:.2})",
                    segment.start_ms, segment.end_ms, id, score
                );
                EntryTarget::Item(id)
            }
            None => EntryTarget::Unassigned,
        }
    }

    /// Merge new segments into the minutes.
    ///
    /// Segments are grouped per target and each group is drafted in its own
    /// task. Entries still holding pending segments from a failed pass are
    /// retried alongside, and entries whose drafted speech was replaced by
    /// one of the new segments are redrafted from the log.
    pub async fn synthesize(
        &self,
        session: &Arc<Session>,
        segments: Vec<TranscriptSegment>,
    ) -> SynthesisReport {
        let mut groups: BTreeMap<EntryTarget, (Vec<TranscriptSegment>, PassMode)> =
            BTreeMap::new();
        {
            let state = session.read().await;
            for entry in &state.minutes.entries {
                if segments.iter().any(|s| entry.is_superseded_by(s)) {
                    debug!("New segments replace speech drafted into {}", entry.target);
                    groups.insert(entry.target.clone(), (Vec::new(), PassMode::Supersede));
                } else if !entry.pending.is_empty() || entry.outdated {
                    groups.insert(entry.target.clone(), (Vec::new(), PassMode::Merge));
                }
            }
            for segment in segments {
                groups
                    .entry(self.route(&state.agenda, &segment))
                    .or_insert_with(|| (Vec::new(), PassMode::Merge))
                    .0
                    .push(segment);
            }
        }

        let mut tasks = JoinSet::new();
        for (target, (segments, mode)) in groups {
            let synthesizer = self.clone();
            let session = session.clone();
            tasks.spawn(async move { synthesizer.run_pass(session, target, segments, mode).await });
        }

        let mut report = SynthesisReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(summary)) => report.passes.push(summary),
                Ok(Err(e)) => {
                    warn!("Synthesis pass failed: {}", e);
                    report.failures.push(e);
                }
                Err(e) => warn!("Synthesis task aborted: {}", e),
            }
        }
        report.passes.sort_by(|a, b| a.target.cmp(&b.target));

        info!(
            "Session {}: {} pass(es) applied, {} failed",
            session.id(),
            report.applied(),
            report.failures.len()
        );
        report
    }

    /// Redraft an entry from scratch out of every segment it has absorbed
    /// plus its pending ones
    pub async fn refresh(
        &self,
        session: &Arc<Session>,
        target: EntryTarget,
    ) -> EngineResult<PassSummary> {
        self.run_pass(session.clone(), target, Vec::new(), PassMode::Refresh)
            .await
    }

    async fn run_pass(
        &self,
        session: Arc<Session>,
        target: EntryTarget,
        segments: Vec<TranscriptSegment>,
        mode: PassMode,
    ) -> EngineResult<PassSummary> {
        let _guard = tokio::select! {
            guard = session.lock_target(&target) => guard,
            _ = session.closed() => return Err(EngineError::SessionClosed(session.id().clone())),
        };
        session.ensure_open()?;

        let unchanged = PassSummary {
            target: target.clone(),
            segments_added: 0,
            status: PassStatus::Unchanged,
        };

        let (plan, fresh, pending, superseded) = {
            let state = session.read().await;
            let entry = state.minutes.entry(&target);

            let mut fresh: Vec<TranscriptSegment> = Vec::new();
            for segment in segments {
                if entry.is_some_and(|e| e.has_seen(&segment)) {
                    continue;
                }
                fresh.retain(|f| f.origin != segment.origin);
                fresh.push(segment);
            }

            // Queued segments whose speech a later fragment replaced are dropped
            let pending: Vec<TranscriptSegment> = entry
                .map(|e| e.pending.as_slice())
                .unwrap_or_default()
                .iter()
                .filter(|p| !fresh.iter().any(|f| f.origin == p.origin))
                .filter(|p| !replaced_in_log(&state.segments, p))
                .cloned()
                .collect();

            let superseded = mode == PassMode::Supersede
                || entry.is_some_and(|e| {
                    e.outdated || fresh.iter().any(|f| e.is_superseded_by(f))
                });
            let redraft = superseded || mode == PassMode::Refresh;

            if fresh.is_empty() && pending.is_empty() && !redraft {
                debug!("No new segments for {}", target);
                return Ok(unchanged);
            }

            let mut batch: Vec<TranscriptSegment> = match (redraft, entry) {
                (true, Some(entry)) => state
                    .segments
                    .segments()
                    .iter()
                    .filter(|s| entry.was_drafted(s))
                    .filter(|s| !fresh.iter().chain(&pending).any(|n| n.origin == s.origin))
                    .cloned()
                    .collect(),
                _ => Vec::new(),
            };
            batch.extend(pending.iter().cloned());
            batch.extend(fresh.iter().cloned());
            batch.sort_by_key(|s| s.start_ms);

            let plan = if batch.is_empty() {
                // Everything drafted here was replaced and nothing is left
                match entry {
                    Some(entry) if superseded && !entry.text.is_empty() => None,
                    _ => return Ok(unchanged),
                }
            } else {
                let (item_title, open_goals) = match &target {
                    EntryTarget::Item(id) => match state.agenda.get(id) {
                        Some(item) => (
                            item.title.clone(),
                            item.goals.iter().filter(|g| !g.done).cloned().collect(),
                        ),
                        None => (id.to_string(), Vec::new()),
                    },
                    EntryTarget::Unassigned => (UNASSIGNED_TITLE.to_string(), Vec::new()),
                };

                let prior_text = match (redraft, entry) {
                    (false, Some(entry)) => entry.text.clone(),
                    _ => String::new(),
                };

                Some(DraftRequest {
                    item_title,
                    prior_text,
                    segments: batch,
                    open_goals,
                })
            };
            (plan, fresh, pending, superseded)
        };

        let outcome = match &plan {
            Some(request) => {
                info!(
                    "Drafting {} with {} segment(s) via {}",
                    target,
                    request.segments.len(),
                    self.drafter.drafter_id()
                );
                let outcome = self.draft_with_retry(&session, &target, request).await;
                if let Err(EngineError::SessionClosed(id)) = outcome {
                    return Err(EngineError::SessionClosed(id));
                }
                outcome
            }
            None => {
                info!("Clearing {}, all of its speech was replaced", target);
                Ok(Draft::default())
            }
        };

        let mut state = session.write().await;
        session.ensure_open()?;

        let mut entry = state
            .minutes
            .entry(&target)
            .cloned()
            .unwrap_or_else(|| MinutesEntry::new(target.clone()));
        entry.pending = pending;

        match outcome {
            Ok(draft) => {
                let Draft {
                    text,
                    resolved_goals,
                } = draft;
                let drafted = plan.map(|request| request.segments).unwrap_or_default();
                entry.apply_draft(text, &drafted);
                state.minutes.replace_entry(entry);

                if let (EntryTarget::Item(id), false) = (&target, drafted.is_empty()) {
                    advance_item(&mut state.agenda, id, &resolved_goals);
                }

                Ok(PassSummary {
                    target,
                    segments_added: fresh.len(),
                    status: PassStatus::Applied,
                })
            }
            Err(e) => {
                entry.mark_stale(fresh, e.to_string());
                entry.outdated |= superseded;
                state.minutes.replace_entry(entry);
                Err(e)
            }
        }
    }

    /// Call the drafter with a per-attempt timeout, retrying transient
    /// failures with exponential backoff
    async fn draft_with_retry(
        &self,
        session: &Session,
        target: &EntryTarget,
        request: &DraftRequest,
    ) -> EngineResult<Draft> {
        let timeout = Duration::from_millis(self.config.draft_timeout_ms);
        let mut last_error = String::from("no attempt made");

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.backoff(attempt);
                info!(
                    "Drafting {}: retry {} of {} in {:?}",
                    target, attempt, self.config.max_retries, delay
                );
                tokio::select! {
                    _ = time::sleep(delay) => {}
                    _ = session.closed() => return Err(EngineError::SessionClosed(session.id().clone())),
                }
            }

            let result = tokio::select! {
                result = time::timeout(timeout, self.drafter.draft(request)) => result,
                _ = session.closed() => return Err(EngineError::SessionClosed(session.id().clone())),
            };

            match result {
                Err(_) => {
                    warn!("Drafting {} timed out after {:?}", target, timeout);
                    return Err(EngineError::SynthesisTimeout {
                        target: target.clone(),
                        timeout_ms: self.config.draft_timeout_ms,
                    });
                }
                Ok(Ok(draft)) => match validate_draft(&draft) {
                    Ok(()) => return Ok(draft),
                    Err(reason) => {
                        warn!("Drafting {} returned an unusable draft: {}", target, reason);
                        last_error = reason;
                    }
                },
                Ok(Err(e)) if e.is_retryable() => {
                    warn!("Drafting {} failed: {}", target, e);
                    last_error = e.to_string();
                }
                Ok(Err(e)) => {
                    return Err(EngineError::SynthesisFailure {
                        target: target.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(EngineError::SynthesisFailure {
            target: target.clone(),
            reason: format!(
                "gave up after {} attempt(s): {}",
                self.config.max_retries + 1,
                last_error
            ),
        })
    }
}

/// Whether the log no longer carries `segment`'s text for its span
fn replaced_in_log(log: &SegmentLog, segment: &TranscriptSegment) -> bool {
    match log.pieces_of(&segment.origin).next() {
        Some(piece) => piece.text != segment.text,
        None => log
            .segments()
            .iter()
            .any(|s| s.span().overlaps(&segment.origin)),
    }
}

/// Forward-only status derivation: a contribution starts an item, resolving
/// every goal closes it
fn advance_item(agenda: &mut Agenda, id: &ItemId, resolved: &[ResolvedGoal]) {
    agenda.advance_status(id, ItemStatus::InProgress);
    if !resolved.is_empty() && agenda.resolve_goals(id, resolved) {
        info!("Item {}: {} goal(s) resolved", id, resolved.len());
    }
    if agenda.get(id).is_some_and(|item| item.goals_complete())
        && agenda.advance_status(id, ItemStatus::Closed)
    {
        info!("Item {} closed, all goals met", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::SessionId;
    use crate::engine::test_support::{ScriptedDrafter, SlowDrafter};
    use crate::llm::{DraftError, ExtractiveDrafter};
    use crate::matching::MatchConfig;
    use crate::models::{AgendaSubmission, ItemDraft, SegmentSpan};

    fn fast_config() -> SynthesisConfig {
        SynthesisConfig {
            draft_timeout_ms: 1_000,
            max_retries: 2,
            backoff_base_ms: 1,
            max_backoff_ms: 5,
        }
    }

    fn synthesizer(drafter: Arc<dyn Drafter>, config: SynthesisConfig) -> Synthesizer {
        let matching = MatchConfig::default();
        Synthesizer::new(drafter, matching.build_matcher(), matching.min_match_score, config)
    }

    fn segment(start_ms: u64, end_ms: u64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_ms,
            end_ms,
            origin: SegmentSpan::new(start_ms, end_ms),
            speaker: None,
            text: text.to_string(),
            item_id: None,
        }
    }

    async fn session_with(items: Vec<ItemDraft>) -> Arc<Session> {
        let session = Arc::new(Session::new(SessionId::new("test")));
        session
            .apply_agenda(&AgendaSubmission {
                items,
                reset: false,
            })
            .await
            .unwrap();
        session
    }

    fn budget() -> EntryTarget {
        EntryTarget::Item(ItemId::new("1"))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = SynthesisConfig {
            backoff_base_ms: 100,
            max_backoff_ms: 350,
            ..Default::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(350));
        assert_eq!(config.backoff(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_routing() {
        let session = session_with(vec![
            ItemDraft::new("1", "Budget", 0),
            ItemDraft::new("2", "Hiring plan", 1),
        ])
        .await;
        let synth = synthesizer(Arc::new(ScriptedDrafter::default()), fast_config());
        let state = session.read().await;

        let mut bound = segment(0, 5, "unrelated words");
        bound.item_id = Some(ItemId::new("2"));
        assert_eq!(synth.route(&state.agenda, &bound), EntryTarget::Item(ItemId::new("2")));

        let mut unknown = segment(0, 5, "the budget again");
        unknown.item_id = Some(ItemId::new("99"));
        assert_eq!(synth.route(&state.agenda, &unknown), budget());

        assert_eq!(
            synth.route(&state.agenda, &segment(0, 5, "Let's discuss the budget now")),
            budget()
        );
        assert_eq!(
            synth.route(&state.agenda, &segment(0, 5, "How was everyone's weekend?")),
            EntryTarget::Unassigned
        );
    }

    #[tokio::test]
    async fn test_pass_applies_and_is_idempotent() {
        let session = session_with(vec![ItemDraft::new("1", "Budget", 0)]).await;
        let drafter = Arc::new(ScriptedDrafter::default());
        let synth = synthesizer(drafter.clone(), fast_config());
        let segments = vec![segment(0, 5, "Let's discuss the budget now")];

        let report = synth.synthesize(&session, segments.clone()).await;
        assert_eq!(report.applied(), 1);
        assert!(report.failures.is_empty());

        let again = synth.synthesize(&session, segments).await;
        assert_eq!(again.passes[0].status, PassStatus::Unchanged);
        assert_eq!(drafter.calls(), 1);

        let state = session.read().await;
        let entry = state.minutes.entry(&budget()).unwrap();
        assert_eq!(entry.text, "Let's discuss the budget now");
        assert_eq!(
            entry.contributing.iter().copied().collect::<Vec<_>>(),
            vec![SegmentSpan::new(0, 5)]
        );
        assert_eq!(state.minutes.revision, 1);
        let item = state.agenda.get(&ItemId::new("1")).unwrap();
        assert_eq!(item.status, ItemStatus::InProgress);
        assert_eq!(state.agenda.version, 2);
    }

    #[tokio::test]
    async fn test_timeout_marks_stale_and_keeps_text() {
        let session = session_with(vec![ItemDraft::new("1", "Budget", 0)]).await;
        let config = SynthesisConfig {
            draft_timeout_ms: 20,
            ..fast_config()
        };

        let quick = synthesizer(Arc::new(ScriptedDrafter::default()), config.clone());
        quick
            .synthesize(&session, vec![segment(0, 5, "budget first")])
            .await;

        let slow = synthesizer(Arc::new(SlowDrafter::new(Duration::from_millis(500))), config);
        let report = slow
            .synthesize(&session, vec![segment(5, 9, "budget second")])
            .await;

        assert!(matches!(
            report.failures.as_slice(),
            [EngineError::SynthesisTimeout { timeout_ms: 20, .. }]
        ));
        {
            let state = session.read().await;
            let entry = state.minutes.entry(&budget()).unwrap();
            assert_eq!(entry.text, "budget first");
            assert!(entry.stale);
            assert_eq!(entry.pending.len(), 1);
            assert!(entry.last_error.as_deref().unwrap().contains("timed out"));
        }

        // The next pass picks up the pending segment even with nothing new.
        let report = quick.synthesize(&session, vec![]).await;
        assert_eq!(report.applied(), 1);
        let state = session.read().await;
        let entry = state.minutes.entry(&budget()).unwrap();
        assert!(!entry.stale);
        assert!(entry.pending.is_empty());
        assert_eq!(entry.text, "budget first\nbudget second");
        assert_eq!(entry.contributing.len(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let session = session_with(vec![ItemDraft::new("1", "Budget", 0)]).await;
        let drafter = Arc::new(ScriptedDrafter::new(vec![
            Err(DraftError::Transient("overloaded".to_string())),
            Ok(Draft::default()),
        ]));
        let synth = synthesizer(drafter.clone(), fast_config());

        let report = synth.synthesize(&session, vec![segment(0, 5, "budget")]).await;

        assert_eq!(report.applied(), 1);
        assert_eq!(drafter.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_without_retry() {
        let session = session_with(vec![ItemDraft::new("1", "Budget", 0)]).await;
        let drafter = Arc::new(ScriptedDrafter::new(vec![Err(DraftError::Permanent(
            "bad request".to_string(),
        ))]));
        let synth = synthesizer(drafter.clone(), fast_config());

        let report = synth.synthesize(&session, vec![segment(0, 5, "budget")]).await;

        assert!(matches!(
            report.failures.as_slice(),
            [EngineError::SynthesisFailure { .. }]
        ));
        assert_eq!(drafter.calls(), 1);
        let state = session.read().await;
        let entry = state.minutes.entry(&budget()).unwrap();
        assert!(entry.stale);
        assert!(entry.text.is_empty());
        assert_eq!(
            state.agenda.get(&ItemId::new("1")).unwrap().status,
            ItemStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries() {
        let session = session_with(vec![ItemDraft::new("1", "Budget", 0)]).await;
        let drafter = Arc::new(ScriptedDrafter::new(vec![
            Err(DraftError::Transient("a".to_string())),
            Err(DraftError::Transient("b".to_string())),
            Err(DraftError::Transient("c".to_string())),
        ]));
        let synth = synthesizer(drafter.clone(), fast_config());

        let report = synth.synthesize(&session, vec![segment(0, 5, "budget")]).await;

        match report.failures.as_slice() {
            [EngineError::SynthesisFailure { reason, .. }] => {
                assert!(reason.contains("3 attempt(s)"));
            }
            other => panic!("unexpected failures: {:?}", other),
        }
        assert_eq!(drafter.calls(), 3);
    }

    #[tokio::test]
    async fn test_same_target_passes_are_serialized() {
        let session = session_with(vec![ItemDraft::new("1", "Budget", 0)]).await;
        let drafter = Arc::new(SlowDrafter::new(Duration::from_millis(50)));
        let synth = synthesizer(drafter.clone(), fast_config());

        let first = synth.synthesize(&session, vec![segment(0, 5, "budget one")]);
        let second = synth.synthesize(&session, vec![segment(5, 9, "budget two")]);
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a.applied() + b.applied(), 2);
        assert_eq!(drafter.max_in_flight(), 1);

        let state = session.read().await;
        let entry = state.minutes.entry(&budget()).unwrap();
        assert_eq!(entry.contributing.len(), 2);
        assert_eq!(entry.text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_different_targets_run_concurrently() {
        let session = session_with(vec![
            ItemDraft::new("1", "Budget", 0),
            ItemDraft::new("2", "Hiring", 1),
        ])
        .await;
        let drafter = Arc::new(SlowDrafter::new(Duration::from_millis(100)));
        let synth = synthesizer(drafter.clone(), fast_config());

        let report = synth
            .synthesize(
                &session,
                vec![segment(0, 5, "budget"), segment(5, 9, "hiring")],
            )
            .await;

        assert_eq!(report.applied(), 2);
        assert_eq!(drafter.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_close_cancels_pass_and_releases_lock() {
        let session = session_with(vec![ItemDraft::new("1", "Budget", 0)]).await;
        let synth = synthesizer(
            Arc::new(SlowDrafter::new(Duration::from_secs(10))),
            SynthesisConfig {
                draft_timeout_ms: 60_000,
                ..fast_config()
            },
        );

        let task = {
            let synth = synth.clone();
            let session = session.clone();
            tokio::spawn(async move { synth.synthesize(&session, vec![segment(0, 5, "budget")]).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.close();

        let report = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            report.failures.as_slice(),
            [EngineError::SessionClosed(_)]
        ));

        let lock = tokio::time::timeout(Duration::from_millis(100), session.lock_target(&budget())).await;
        assert!(lock.is_ok());
        assert!(session.read().await.minutes.entries.is_empty());
    }

    #[tokio::test]
    async fn test_goals_close_item() {
        let session = session_with(vec![
            ItemDraft::new("1", "Budget", 0).with_goal("Agree on the Q3 budget"),
        ])
        .await;
        let synth = synthesizer(Arc::new(ExtractiveDrafter::default()), fast_config());

        synth
            .synthesize(&session, vec![segment(0, 5, "Let's discuss the budget now")])
            .await;
        assert_eq!(
            session.read().await.agenda.items[0].status,
            ItemStatus::InProgress
        );

        let mut decision = segment(5, 9, "Okay, the Q3 budget is approved at 40k");
        decision.item_id = Some(ItemId::new("1"));
        synth.synthesize(&session, vec![decision]).await;

        let state = session.read().await;
        let item = &state.agenda.items[0];
        assert_eq!(item.status, ItemStatus::Closed);
        assert!(item.goals[0].done);
        assert_eq!(
            item.goals[0].result.as_deref(),
            Some("Okay, the Q3 budget is approved at 40k")
        );
    }

    #[tokio::test]
    async fn test_refresh_redrafts_from_contributing_segments() {
        let session = session_with(vec![ItemDraft::new("1", "Budget", 0)]).await;
        let drafter = Arc::new(ScriptedDrafter::default());
        let synth = synthesizer(drafter.clone(), fast_config());

        synth.synthesize(&session, vec![segment(0, 5, "budget one")]).await;
        synth.synthesize(&session, vec![segment(5, 9, "budget two")]).await;
        {
            let mut state = session.write().await;
            state.segments.segments = vec![segment(0, 5, "budget one"), segment(5, 9, "budget two")];
        }

        let summary = synth.refresh(&session, budget()).await.unwrap();

        assert_eq!(summary.status, PassStatus::Applied);
        assert_eq!(summary.segments_added, 0);
        let requests = drafter.requests.lock().unwrap();
        let last = requests.last().unwrap();
        assert!(last.prior_text.is_empty());
        assert_eq!(last.segments.len(), 2);

        let unknown = synth
            .refresh(&session, EntryTarget::Item(ItemId::new("nope")))
            .await
            .unwrap();
        assert_eq!(unknown.status, PassStatus::Unchanged);
    }
}
