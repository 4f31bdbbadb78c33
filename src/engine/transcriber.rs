use async_trait::async_trait;

use crate::models::RawFragment;

/// Speech-to-text collaborator.
///
/// Implementations turn one chunk of audio into timed fragments. Retrying is
/// up to the implementation; the engine only bounds each call with a timeout.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_chunk: &[u8]) -> anyhow::Result<Vec<RawFragment>>;
}
