use anyhow::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::engine::{Synthesizer, VoiceOptions};
use crate::media::run_tool;

const NORMAL_WPM: u32 = 175;
const SLOW_WPM: u32 = 110;

/// Text-to-speech via the espeak-ng binary, writing a WAV to disk.
pub struct EspeakSynthesizer {
    program: String,
    limit: Duration,
}

impl EspeakSynthesizer {
    pub fn new() -> Self {
        Self {
            program: "espeak-ng".to_string(),
            limit: Duration::from_secs(60),
        }
    }
}

impl Default for EspeakSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for EspeakSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceOptions, output: &Path) -> Result<()> {
        let wpm = if voice.slow { SLOW_WPM } else { NORMAL_WPM };
        info!("Synthesizing {} chars, lang={}, {} wpm", text.len(), voice.lang, wpm);

        run_tool(&self.program, build_args(&voice.lang, wpm, output, text), self.limit).await?;
        Ok(())
    }
}

// `--` keeps text that starts with a dash from being parsed as an option.
fn build_args(lang: &str, wpm: u32, output: &Path, text: &str) -> Vec<OsString> {
    vec![
        OsString::from("-v"),
        OsString::from(lang),
        OsString::from("-s"),
        OsString::from(wpm.to_string()),
        OsString::from("-w"),
        output.as_os_str().to_os_string(),
        OsString::from("--"),
        OsString::from(text),
    ]
}
