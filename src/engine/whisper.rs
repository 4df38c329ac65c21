use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::engine::{Recognizer, RecognizerStream};
use crate::media::TARGET_SAMPLE_RATE;

/// Decode window fed to whisper at a time. Chunks accumulate until a full
/// window is buffered, then decode as one utterance.
const WINDOW_SECS: usize = 30;

pub struct WhisperRecognizer {
    ctx: Arc<WhisperContext>,
}

impl WhisperRecognizer {
    pub fn new(model_path: String) -> Result<Self> {
        match WhisperContext::new_with_params(&model_path, WhisperContextParameters::default()) {
            Ok(ctx) => Ok(Self { ctx: Arc::new(ctx) }),
            Err(e) => Err(anyhow::anyhow!("failed to open whisper model: {}", e)),
        }
    }
}

#[async_trait]
impl Recognizer for WhisperRecognizer {
    async fn open_stream(&self, lang: Option<String>) -> Result<Box<dyn RecognizerStream>> {
        Ok(Box::new(WhisperStream {
            ctx: self.ctx.clone(),
            lang,
            buffer: Vec::new(),
            window_samples: WINDOW_SECS * TARGET_SAMPLE_RATE as usize,
        }))
    }
}

struct WhisperStream {
    ctx: Arc<WhisperContext>,
    lang: Option<String>,
    buffer: Vec<f32>,
    window_samples: usize,
}

impl WhisperStream {
    fn decode(&self, samples: &[f32]) -> Result<Option<String>> {
        // whisper rejects inputs shorter than ~1s of audio
        if samples.len() < TARGET_SAMPLE_RATE as usize {
            return Ok(None);
        }

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_translate(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_special(false);
        params.set_suppress_blank(true);
        params.set_suppress_non_speech_tokens(true);
        params.set_single_segment(false);
        if let Some(lang) = &self.lang {
            params.set_language(Some(lang.as_str()));
        }

        let mut state = self.ctx.create_state()?;
        state.full(params, samples)?;

        let num_segments = state.full_n_segments()?;
        let mut text = String::new();
        for i in 0..num_segments {
            text.push_str(state.full_get_segment_text(i)?.trim());
            if i + 1 < num_segments {
                text.push(' ');
            }
        }

        let text = text.trim().to_string();
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}

#[async_trait]
impl RecognizerStream for WhisperStream {
    async fn accept_chunk(&mut self, samples: &[f32]) -> Result<Option<String>> {
        self.buffer.extend_from_slice(samples);
        if self.buffer.len() < self.window_samples {
            return Ok(None);
        }
        let window: Vec<f32> = self.buffer.drain(..self.window_samples).collect();
        self.decode(&window)
    }

    async fn finalize(&mut self) -> Result<Option<String>> {
        let rest = std::mem::take(&mut self.buffer);
        self.decode(&rest)
    }
}
