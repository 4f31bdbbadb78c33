use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex as AsyncMutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{Agenda, AgendaSubmission, EntryTarget, MinutesDocument, SegmentLog, TranscriptSegment};

use super::validator::validate_agenda;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything one meeting owns
#[derive(Debug, Default)]
pub struct SessionState {
    pub agenda: Agenda,
    pub segments: SegmentLog,
    pub minutes: MinutesDocument,
}

/// Point-in-time copy of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub agenda: Agenda,
    pub minutes: MinutesDocument,
    pub segments: Vec<TranscriptSegment>,
}

pub struct Session {
    id: SessionId,
    state: RwLock<SessionState>,
    item_locks: Mutex<HashMap<EntryTarget, Arc<AsyncMutex<()>>>>,
    closed: watch::Sender<bool>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: RwLock::new(SessionState::default()),
            item_locks: Mutex::new(HashMap::new()),
            closed: watch::Sender::new(false),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().await
    }

    /// Take the lock serializing synthesis passes for one target
    pub async fn lock_target(&self, target: &EntryTarget) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.item_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(target.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop idle locks of items that left the agenda
    fn release_locks(&self, agenda: &Agenda) {
        let mut locks = self.item_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|target, lock| match target {
            EntryTarget::Item(id) => agenda.get(id).is_some() || Arc::strong_count(lock) > 1,
            EntryTarget::Unassigned => true,
        });
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.item_locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Signal in-flight work to stop. Returns false if already closed.
    pub fn close(&self) -> bool {
        let was_closed = self.closed.send_replace(true);
        if !was_closed {
            info!("Session {} closed", self.id);
        }
        !was_closed
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the session is closed
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    pub fn ensure_open(&self) -> EngineResult<()> {
        if self.is_closed() {
            return Err(EngineError::SessionClosed(self.id.clone()));
        }
        Ok(())
    }

    /// Validate and atomically install a new agenda.
    ///
    /// The version moves only when the accepted agenda differs from the
    /// current one.
    pub async fn apply_agenda(&self, submission: &AgendaSubmission) -> EngineResult<Agenda> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        let mut agenda = validate_agenda(submission, &state.agenda)?;

        if agenda.items != state.agenda.items || state.agenda.version == 0 {
            agenda.version = state.agenda.version + 1;
            info!(
                "Session {}: agenda v{} with {} items",
                self.id,
                agenda.version,
                agenda.items.len()
            );
            state.agenda = agenda;
            self.release_locks(&state.agenda);
        } else {
            debug!("Session {}: agenda unchanged", self.id);
        }

        Ok(state.agenda.clone())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            session_id: self.id.clone(),
            agenda: state.agenda.clone(),
            minutes: state.minutes.clone(),
            segments: state.segments.segments().to_vec(),
        }
    }
}

/// Arena of live sessions keyed by id
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> Arc<Session> {
        let id = SessionId::generate();
        let session = Arc::new(Session::new(id.clone()));
        self.sessions.insert(id.clone(), session.clone());
        info!("Session {} opened", id);
        session
    }

    pub fn get(&self, id: &SessionId) -> EngineResult<Arc<Session>> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::SessionNotFound(id.clone()))
    }

    /// Remove a session and cancel its in-flight passes
    pub fn close(&self, id: &SessionId) -> EngineResult<()> {
        let (_, session) = self
            .sessions
            .remove(id)
            .ok_or_else(|| EngineError::SessionNotFound(id.clone()))?;
        session.close();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
