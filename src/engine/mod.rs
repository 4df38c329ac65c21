use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub mod espeak;
pub mod whisper;

/// Engine-side knobs for synthesis. Post-processing (speed/pitch/volume)
/// happens in the media adapter, not here.
#[derive(Debug, Clone)]
pub struct VoiceOptions {
    pub lang: String,
    pub slow: bool,
}

/// Recognition engine contract. A stream accepts fixed-size chunks of
/// 16 kHz mono samples; each chunk may yield a completed utterance, and
/// `finalize` flushes whatever remains.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn open_stream(&self, lang: Option<String>) -> Result<Box<dyn RecognizerStream>>;
}

#[async_trait]
pub trait RecognizerStream: Send {
    async fn accept_chunk(&mut self, samples: &[f32]) -> Result<Option<String>>;
    async fn finalize(&mut self) -> Result<Option<String>>;
}

/// Synthesis engine contract: renders `text` as a WAV file at `output`.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceOptions, output: &Path) -> Result<()>;
}
