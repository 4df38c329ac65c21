use std::ffi::OsStr;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::info;

use crate::jobs::types::SynthesisParams;

pub mod fetch;
pub mod scratch;

pub use scratch::ScratchDir;

pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Intermediate rate the post-processing filter chain runs at. Pitch
/// shifting via asetrate needs a concrete clock to multiply.
const FILTER_SAMPLE_RATE: u32 = 24000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Ogg,
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ogg" => Some(AudioFormat::Ogg),
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            _ => None,
        }
    }
}

/// Failures from external tool invocations and input fetching.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolError {
    Timeout,
    Failed { status: Option<i32>, stderr: String },
    Io(String),
}

impl Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::Timeout => write!(f, "tool execution timed out"),
            ToolError::Failed { status, stderr } => match status {
                Some(code) => write!(f, "tool exited with status {}: {}", code, stderr),
                None => write!(f, "tool killed by signal: {}", stderr),
            },
            ToolError::Io(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ToolError {}

/// Runs an external tool with an argument vector, capturing stderr. The
/// child is killed if it outlives `limit`. Never goes through a shell.
pub async fn run_tool<I, S>(program: &str, args: I, limit: Duration) -> Result<(), ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolError::Io(format!("failed to spawn {}: {}", program, e)))?;

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Err(_) => Err(ToolError::Timeout),
        Ok(Err(e)) => Err(ToolError::Io(format!("{} wait failed: {}", program, e))),
        Ok(Ok(out)) if out.status.success() => Ok(()),
        Ok(Ok(out)) => Err(ToolError::Failed {
            status: out.status.code(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        }),
    }
}

/// Media Pipeline Adapter contract: fetches remote sources and drives the
/// external transcoder. The pipeline only ever talks to this trait.
#[async_trait]
pub trait MediaAdapter: Send + Sync {
    /// Downloads a remote source into `dest_dir`.
    async fn fetch(&self, url: &str, dest_dir: &Path, limit: Duration) -> Result<PathBuf, ToolError>;
    /// Converts any input into 16 kHz mono PCM WAV next to it.
    async fn normalize(&self, input: &Path, limit: Duration) -> Result<PathBuf, ToolError>;
    /// Duration of a normalized WAV in seconds.
    async fn probe_duration(&self, wav: &Path) -> Result<f64>;
    /// Reads a normalized WAV into mono f32 samples.
    async fn load_samples(&self, wav: &Path) -> Result<Vec<f32>>;
    /// Applies speed/pitch/volume and encodes into the requested format.
    async fn post_process(
        &self,
        input: &Path,
        params: &SynthesisParams,
        output: &Path,
        limit: Duration,
    ) -> Result<(), ToolError>;
}

/// ffmpeg-backed adapter used in production.
pub struct FfmpegMedia;

#[async_trait]
impl MediaAdapter for FfmpegMedia {
    async fn fetch(&self, url: &str, dest_dir: &Path, limit: Duration) -> Result<PathBuf, ToolError> {
        match tokio::time::timeout(limit, fetch::download(url, dest_dir)).await {
            Err(_) => Err(ToolError::Timeout),
            Ok(Err(e)) => Err(ToolError::Io(e.to_string())),
            Ok(Ok(path)) => Ok(path),
        }
    }

    async fn normalize(&self, input: &Path, limit: Duration) -> Result<PathBuf, ToolError> {
        let output = input.with_extension("norm.wav");
        info!("Normalizing {:?} -> {:?}", input, output);
        run_tool(
            "ffmpeg",
            [
                OsStr::new("-hide_banner"),
                OsStr::new("-i"),
                input.as_os_str(),
                OsStr::new("-ac"),
                OsStr::new("1"),
                OsStr::new("-ar"),
                OsStr::new("16000"),
                OsStr::new("-acodec"),
                OsStr::new("pcm_s16le"),
                OsStr::new("-y"),
                output.as_os_str(),
            ],
            limit,
        )
        .await?;
        Ok(output)
    }

    async fn probe_duration(&self, wav: &Path) -> Result<f64> {
        let reader = hound::WavReader::open(wav)?;
        let spec = reader.spec();
        let frames = reader.duration() as f64;
        Ok(frames / spec.sample_rate as f64)
    }

    async fn load_samples(&self, wav: &Path) -> Result<Vec<f32>> {
        let mut reader = hound::WavReader::open(wav)?;
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
        };
        Ok(samples)
    }

    async fn post_process(
        &self,
        input: &Path,
        params: &SynthesisParams,
        output: &Path,
        limit: Duration,
    ) -> Result<(), ToolError> {
        let filter = build_audio_filter(params);
        info!("Post-processing {:?} with filter {}", input, filter);
        run_tool(
            "ffmpeg",
            [
                OsStr::new("-hide_banner"),
                OsStr::new("-i"),
                input.as_os_str(),
                OsStr::new("-filter:a"),
                OsStr::new(&filter),
                OsStr::new("-y"),
                output.as_os_str(),
            ],
            limit,
        )
        .await
    }
}

/// Builds the ffmpeg audio filter chain for the requested transform.
/// Pitch shifting is asetrate with an atempo compensation, so the
/// requested speed folds into the same atempo chain.
pub fn build_audio_filter(params: &SynthesisParams) -> String {
    let mut stages = vec![format!("aresample={}", FILTER_SAMPLE_RATE)];

    let mut tempo = f64::from(params.speed);
    if (params.pitch - 1.0).abs() > f32::EPSILON {
        let shifted = (FILTER_SAMPLE_RATE as f64 * f64::from(params.pitch)).round() as u32;
        stages.push(format!("asetrate={}", shifted));
        stages.push(format!("aresample={}", FILTER_SAMPLE_RATE));
        tempo /= f64::from(params.pitch);
    }
    if (tempo - 1.0).abs() > f64::EPSILON {
        for factor in atempo_factors(tempo) {
            stages.push(format!("atempo={:.4}", factor));
        }
    }
    if (params.volume - 1.0).abs() > f32::EPSILON {
        stages.push(format!("volume={:.2}", params.volume));
    }

    stages.join(",")
}

// atempo only accepts [0.5, 2.0] per instance; larger shifts chain.
fn atempo_factors(mut tempo: f64) -> Vec<f64> {
    let mut factors = Vec::new();
    while tempo > 2.0 {
        factors.push(2.0);
        tempo /= 2.0;
    }
    while tempo < 0.5 {
        factors.push(0.5);
        tempo /= 0.5;
    }
    factors.push(tempo);
    factors
}
