pub mod segmenter;
pub mod session;
pub mod suggest;
pub mod synthesis;
pub mod transcriber;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use segmenter::*;
pub use session::*;
pub use suggest::*;
pub use synthesis::*;
pub use transcriber::*;
pub use validator::*;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::llm::Drafter;
use crate::matching::TitleMatcher;
use crate::models::{
    ActionSuggestion, Agenda, AgendaSubmission, EntryTarget, MinutesDocument, RawFragment,
    TemplateCatalog,
};

/// What one ingest call did to a session
#[derive(Debug, Default)]
pub struct IngestReport {
    pub accepted: usize,
    pub duplicates: usize,
    pub warnings: Vec<OverlapWarning>,
    pub rejected: Vec<RejectedFragment>,
    pub synthesis: SynthesisReport,
}

/// Entry point tying sessions, segmentation, synthesis and suggestions
/// together
pub struct MinutesEngine {
    config: EngineConfig,
    sessions: SessionStore,
    synthesizer: Synthesizer,
    catalog: Arc<TemplateCatalog>,
}

impl MinutesEngine {
    pub fn new(config: EngineConfig, drafter: Arc<dyn Drafter>, catalog: Arc<TemplateCatalog>) -> Self {
        let synthesizer = Synthesizer::new(
            drafter,
            config.matching.build_matcher(),
            config.matching.min_match_score,
            config.synthesis.clone(),
        );
        Self {
            config,
            sessions: SessionStore::new(),
            synthesizer,
            catalog,
        }
    }

    /// Replace the title matcher built from the config
    pub fn with_matcher(mut self, matcher: Arc<dyn TitleMatcher>) -> Self {
        self.synthesizer = self.synthesizer.with_matcher(matcher);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn open_session(&self) -> SessionId {
        self.sessions.open().id().clone()
    }

    /// Tear a session down; in-flight passes stop without touching minutes
    pub fn close_session(&self, id: &SessionId) -> EngineResult<()> {
        self.sessions.close(id)
    }

    /// Dry-run validation against the session's current agenda
    pub async fn validate_agenda(
        &self,
        id: &SessionId,
        submission: &AgendaSubmission,
    ) -> EngineResult<Agenda> {
        let session = self.sessions.get(id)?;
        let state = session.read().await;
        validate_agenda(submission, &state.agenda)
    }

    pub async fn submit_agenda(
        &self,
        id: &SessionId,
        submission: &AgendaSubmission,
    ) -> EngineResult<Agenda> {
        self.sessions.get(id)?.apply_agenda(submission).await
    }

    /// Ingest a batch of fragments and synthesize what was accepted.
    ///
    /// Rejected fragments are reported per fragment; the rest of the batch
    /// still goes through.
    pub async fn ingest(
        &self,
        id: &SessionId,
        fragments: Vec<RawFragment>,
    ) -> EngineResult<IngestReport> {
        let session = self.sessions.get(id)?;
        session.ensure_open()?;

        let outcome = {
            let mut state = session.write().await;
            ingest_batch(&mut state.segments, fragments, &self.config.segmenter)
        };

        let synthesis = self
            .synthesizer
            .synthesize(&session, outcome.accepted.clone())
            .await;

        Ok(IngestReport {
            accepted: outcome.accepted.len(),
            duplicates: outcome.duplicates,
            warnings: outcome.warnings,
            rejected: outcome.rejected,
            synthesis,
        })
    }

    /// Ingest a single fragment; unlike `ingest`, a rejection is returned as
    /// the error
    pub async fn ingest_fragment(
        &self,
        id: &SessionId,
        fragment: RawFragment,
    ) -> EngineResult<IngestReport> {
        let session = self.sessions.get(id)?;
        session.ensure_open()?;

        let outcome = {
            let mut state = session.write().await;
            ingest_fragment(&mut state.segments, fragment, &self.config.segmenter)?
        };

        let mut report = IngestReport {
            warnings: outcome.warnings,
            ..Default::default()
        };
        match outcome.segment {
            Some(segment) => {
                report.accepted = 1;
                report.synthesis = self.synthesizer.synthesize(&session, vec![segment]).await;
            }
            None => report.duplicates = 1,
        }
        Ok(report)
    }

    /// Transcribe one audio chunk and ingest the fragments it yields
    pub async fn ingest_audio(
        &self,
        id: &SessionId,
        transcriber: &dyn Transcriber,
        audio_chunk: &[u8],
        timeout: Duration,
    ) -> EngineResult<IngestReport> {
        self.sessions.get(id)?.ensure_open()?;

        let fragments = match tokio::time::timeout(timeout, transcriber.transcribe(audio_chunk)).await
        {
            Ok(Ok(fragments)) => fragments,
            Ok(Err(e)) => {
                warn!("Transcription failed: {:#}", e);
                return Err(EngineError::Transcription(format!("{:#}", e)));
            }
            Err(_) => {
                warn!("Transcription timed out after {:?}", timeout);
                return Err(EngineError::Transcription(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                )));
            }
        };

        info!("Transcribed {} fragment(s)", fragments.len());
        self.ingest(id, fragments).await
    }

    pub async fn minutes(&self, id: &SessionId) -> EngineResult<MinutesDocument> {
        let session = self.sessions.get(id)?;
        let state = session.read().await;
        Ok(state.minutes.clone())
    }

    pub async fn agenda(&self, id: &SessionId) -> EngineResult<Agenda> {
        let session = self.sessions.get(id)?;
        let state = session.read().await;
        Ok(state.agenda.clone())
    }

    pub async fn snapshot(&self, id: &SessionId) -> EngineResult<SessionSnapshot> {
        Ok(self.sessions.get(id)?.snapshot().await)
    }

    /// Redraft one entry; also the way to retry a stale one
    pub async fn refresh(&self, id: &SessionId, target: EntryTarget) -> EngineResult<PassSummary> {
        let session = self.sessions.get(id)?;
        session.ensure_open()?;
        self.synthesizer.refresh(&session, target).await
    }

    pub async fn suggest(&self, id: &SessionId) -> EngineResult<Vec<ActionSuggestion>> {
        let session = self.sessions.get(id)?;
        let state = session.read().await;
        Ok(suggest(
            &state.agenda,
            &state.minutes,
            &self.catalog,
            &self.config.suggest,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::ScriptedDrafter;
    use crate::matching::BigramMatcher;
    use crate::llm::DraftError;
    use crate::models::{ItemDraft, ItemId, ItemStatus, MinutesEntry, SegmentSpan};

    fn engine() -> MinutesEngine {
        engine_with(Arc::new(ScriptedDrafter::default()))
    }

    fn engine_with(drafter: Arc<ScriptedDrafter>) -> MinutesEngine {
        let mut config = EngineConfig::default();
        config.synthesis.backoff_base_ms = 1;
        MinutesEngine::new(config, drafter, Arc::new(TemplateCatalog::builtin()))
    }

    fn spans(entry: &MinutesEntry) -> Vec<SegmentSpan> {
        entry.contributing.iter().copied().collect()
    }

    fn budget_agenda(status: ItemStatus) -> AgendaSubmission {
        AgendaSubmission {
            items: vec![ItemDraft::new("1", "Budget", 0).with_status(status)],
            reset: false,
        }
    }

    struct FixedTranscriber(Vec<RawFragment>);

    #[async_trait::async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _audio_chunk: &[u8]) -> anyhow::Result<Vec<RawFragment>> {
            Ok(self.0.clone())
        }
    }

    struct StuckTranscriber;

    #[async_trait::async_trait]
    impl Transcriber for StuckTranscriber {
        async fn transcribe(&self, _audio_chunk: &[u8]) -> anyhow::Result<Vec<RawFragment>> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_budget_walkthrough() {
        let engine = engine();
        let id = engine.open_session();

        let agenda = engine
            .submit_agenda(&id, &budget_agenda(ItemStatus::Pending))
            .await
            .unwrap();
        assert_eq!(agenda.version, 1);

        let fragment = RawFragment::new(0, 5, "Let's discuss the budget now");
        engine.ingest(&id, vec![fragment.clone()]).await.unwrap();

        let minutes = engine.minutes(&id).await.unwrap();
        assert_eq!(minutes.entries.len(), 1);
        let entry = &minutes.entries[0];
        assert_eq!(entry.target, EntryTarget::Item(ItemId::new("1")));
        assert!(entry.contributing.contains(&SegmentSpan::new(0, 5)));

        let report = engine.ingest(&id, vec![fragment]).await.unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(engine.minutes(&id).await.unwrap(), minutes);

        engine
            .submit_agenda(&id, &budget_agenda(ItemStatus::Closed))
            .await
            .unwrap();
        let err = engine
            .submit_agenda(&id, &budget_agenda(ItemStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAgenda(_)));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_apply() {
        let engine = engine();
        let id = engine.open_session();

        let agenda = engine
            .validate_agenda(&id, &budget_agenda(ItemStatus::Pending))
            .await
            .unwrap();

        assert_eq!(agenda.items.len(), 1);
        assert!(engine.agenda(&id).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_fragment_surfaces_rejection() {
        let mut config = EngineConfig::default();
        config.segmenter.retention_horizon_ms = 1_000;
        let engine = MinutesEngine::new(
            config,
            Arc::new(ScriptedDrafter::default()),
            Arc::new(TemplateCatalog::builtin()),
        );
        let id = engine.open_session();

        engine
            .ingest_fragment(&id, RawFragment::new(10_000, 11_000, "hello"))
            .await
            .unwrap();
        let err = engine
            .ingest_fragment(&id, RawFragment::new(0, 500, "late"))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::OutOfOrderFragment { .. }));
        let minutes = engine.minutes(&id).await.unwrap();
        assert_eq!(
            minutes.entry(&EntryTarget::Unassigned).unwrap().text,
            "hello"
        );
    }

    #[tokio::test]
    async fn test_ingest_audio() {
        let engine = engine();
        let id = engine.open_session();
        engine
            .submit_agenda(&id, &budget_agenda(ItemStatus::Pending))
            .await
            .unwrap();

        let transcriber = FixedTranscriber(vec![RawFragment::new(0, 4_000, "budget is tight")]);
        let report = engine
            .ingest_audio(&id, &transcriber, &[0u8; 16], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.synthesis.applied(), 1);

        let err = engine
            .ingest_audio(&id, &StuckTranscriber, &[], Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Transcription(_)));
    }

    #[tokio::test]
    async fn test_closed_session_is_gone() {
        let engine = engine();
        let id = engine.open_session();
        assert_eq!(engine.session_count(), 1);

        engine.close_session(&id).unwrap();

        assert_eq!(engine.session_count(), 0);
        assert!(matches!(
            engine.minutes(&id).await,
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let engine = engine();
        let a = engine.open_session();
        let b = engine.open_session();

        engine
            .ingest(&a, vec![RawFragment::new(0, 5, "only in a")])
            .await
            .unwrap();

        assert_eq!(engine.minutes(&a).await.unwrap().entries.len(), 1);
        assert!(engine.minutes(&b).await.unwrap().entries.is_empty());
    }

    #[tokio::test]
    async fn test_suggest_and_custom_matcher() {
        let engine = engine().with_matcher(Arc::new(BigramMatcher::new(&[])));
        let id = engine.open_session();
        engine
            .submit_agenda(&id, &budget_agenda(ItemStatus::Pending))
            .await
            .unwrap();

        engine
            .ingest(
                &id,
                vec![
                    RawFragment::new(0, 5, "Budgeting: the open question is travel"),
                    RawFragment::new(5, 9, "Still unresolved, revisit the budgets").bound_to("1"),
                ],
            )
            .await
            .unwrap();

        let minutes = engine.minutes(&id).await.unwrap();
        assert_eq!(minutes.entries.len(), 1);

        let suggestions = engine.suggest(&id).await.unwrap();
        assert_eq!(suggestions[0].template_id, "highlight_unresolved_points");
        assert_eq!(suggestions[0].item_id, ItemId::new("1"));
    }

    #[tokio::test]
    async fn test_same_span_correction_reaches_minutes() {
        let engine = engine();
        let id = engine.open_session();
        let budget = EntryTarget::Item(ItemId::new("1"));
        engine
            .submit_agenda(&id, &budget_agenda(ItemStatus::Pending))
            .await
            .unwrap();

        engine
            .ingest(&id, vec![RawFragment::new(0, 10, "budget is fourty")])
            .await
            .unwrap();
        let report = engine
            .ingest(&id, vec![RawFragment::new(0, 10, "budget is forty thousand")])
            .await
            .unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            report.synthesis.passes,
            vec![PassSummary {
                target: budget.clone(),
                segments_added: 1,
                status: PassStatus::Applied,
            }]
        );
        let minutes = engine.minutes(&id).await.unwrap();
        let entry = minutes.entry(&budget).unwrap();
        assert_eq!(entry.text, "budget is forty thousand");
        assert_eq!(spans(entry), vec![SegmentSpan::new(0, 10)]);
    }

    #[tokio::test]
    async fn test_partial_overlap_redrafts_from_log() {
        let engine = engine();
        let id = engine.open_session();
        let budget = EntryTarget::Item(ItemId::new("1"));
        engine
            .submit_agenda(&id, &budget_agenda(ItemStatus::Pending))
            .await
            .unwrap();

        engine
            .ingest(&id, vec![RawFragment::new(0, 10, "budget is fourty")])
            .await
            .unwrap();
        engine
            .ingest(&id, vec![RawFragment::new(5, 15, "budget is forty thousand")])
            .await
            .unwrap();

        let minutes = engine.minutes(&id).await.unwrap();
        let entry = minutes.entry(&budget).unwrap();
        assert_eq!(entry.text, "budget is fourty\nbudget is forty thousand");
        assert_eq!(
            spans(entry),
            vec![SegmentSpan::new(0, 10), SegmentSpan::new(5, 15)]
        );
        assert!(!entry.outdated);
    }

    #[tokio::test]
    async fn test_correction_replaces_pending_segment() {
        let drafter = Arc::new(ScriptedDrafter::new(vec![Err(DraftError::Permanent(
            "model unavailable".to_string(),
        ))]));
        let engine = engine_with(drafter.clone());
        let id = engine.open_session();
        let budget = EntryTarget::Item(ItemId::new("1"));
        engine
            .submit_agenda(&id, &budget_agenda(ItemStatus::Pending))
            .await
            .unwrap();

        let failed = engine
            .ingest(&id, vec![RawFragment::new(0, 10, "budget is fourty")])
            .await
            .unwrap();
        assert_eq!(failed.synthesis.failures.len(), 1);

        let report = engine
            .ingest(&id, vec![RawFragment::new(0, 10, "budget is forty thousand")])
            .await
            .unwrap();
        assert_eq!(report.synthesis.applied(), 1);

        let drafted: Vec<String> = drafter.requests.lock().unwrap()[1]
            .segments
            .iter()
            .map(|s| s.text.clone())
            .collect();
        assert_eq!(drafted, vec!["budget is forty thousand"]);

        let minutes = engine.minutes(&id).await.unwrap();
        let entry = minutes.entry(&budget).unwrap();
        assert_eq!(entry.text, "budget is forty thousand");
        assert!(!entry.stale);
        assert!(entry.pending.is_empty());
        assert_eq!(spans(entry), vec![SegmentSpan::new(0, 10)]);
    }

    #[tokio::test]
    async fn test_correction_routed_elsewhere_clears_old_entry() {
        let engine = engine();
        let id = engine.open_session();
        engine
            .submit_agenda(
                &id,
                &AgendaSubmission {
                    items: vec![
                        ItemDraft::new("1", "Budget", 0),
                        ItemDraft::new("2", "Hiring", 1),
                    ],
                    reset: false,
                },
            )
            .await
            .unwrap();
        let budget = EntryTarget::Item(ItemId::new("1"));
        let hiring = EntryTarget::Item(ItemId::new("2"));

        engine
            .ingest(&id, vec![RawFragment::new(0, 10, "budget talk")])
            .await
            .unwrap();
        let report = engine
            .ingest(&id, vec![RawFragment::new(0, 10, "hiring talk")])
            .await
            .unwrap();
        assert_eq!(report.synthesis.applied(), 2);

        let minutes = engine.minutes(&id).await.unwrap();
        let old = minutes.entry(&budget).unwrap();
        assert!(old.text.is_empty());
        assert_eq!(spans(old), vec![SegmentSpan::new(0, 10)]);
        assert_eq!(minutes.entry(&hiring).unwrap().text, "hiring talk");
    }
}
