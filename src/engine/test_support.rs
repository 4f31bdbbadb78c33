use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{Draft, DraftError, DraftRequest, Drafter};
use crate::models::TranscriptSegment;

/// Joins segment texts onto the prior text
pub fn echo(request: &DraftRequest) -> Draft {
    let mut lines: Vec<String> = request
        .prior_text
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect();
    lines.extend(request.segments.iter().map(|s: &TranscriptSegment| s.text.clone()));
    Draft {
        text: lines.join("\n"),
        resolved_goals: Vec::new(),
    }
}

/// Plays back queued results, then echoes
#[derive(Default)]
pub struct ScriptedDrafter {
    script: Mutex<VecDeque<Result<Draft, DraftError>>>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<DraftRequest>>,
}

impl ScriptedDrafter {
    pub fn new(script: Vec<Result<Draft, DraftError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Drafter for ScriptedDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<Draft, DraftError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(echo(request)))
    }

    fn drafter_id(&self) -> &str {
        "scripted"
    }
}

/// Sleeps before echoing and records how many drafts overlap
pub struct SlowDrafter {
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowDrafter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Drafter for SlowDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<Draft, DraftError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(echo(request))
    }

    fn drafter_id(&self) -> &str {
        "slow"
    }
}
