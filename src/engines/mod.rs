//! Speech synthesis engines.
//!
//! - [`standard`] - the system voice synthesizer (espeak-ng)
//! - [`natural`] - a neural voice model with pitch-preserving rate control
//!
//! Enable neural backends via Cargo features:
//! - `kokoro` - Kokoro TTS (ONNX format, espeak-ng required for phonemization)

pub mod espeak;
#[cfg(feature = "kokoro")]
pub mod kokoro;
pub mod natural;
pub mod standard;

use serde::{Deserialize, Serialize};

use natural::NaturalError;

/// Speaking rate, in words per minute, the natural voice is assumed to produce natively.
pub const NATIVE_RATE_WPM: u32 = 150;
pub const MIN_RATE_WPM: u32 = 50;
pub const MAX_RATE_WPM: u32 = 300;

#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("No speech engine available: {0}")]
    NoEngineAvailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Synthesis failed: {0}")]
    Synthesis(String),
    #[error(transparent)]
    Espeak(#[from] espeak::EspeakError),
    #[error(transparent)]
    Natural(#[from] NaturalError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// System voice synthesizer: robotic but always local and fast.
    #[default]
    Standard,
    /// Neural voice model: human-like, rate applied by time-stretching.
    Natural,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Standard => "standard",
            EngineKind::Natural => "natural",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(EngineKind::Standard),
            "natural" => Ok(EngineKind::Natural),
            other => Err(format!(
                "unknown engine '{other}', expected 'standard' or 'natural'"
            )),
        }
    }
}

/// Everything that determines the audio produced for a given text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Words per minute, 50-300.
    pub rate: u32,
    /// 0.0-1.0.
    pub volume: f32,
    /// Index into the engine's voice list (0 = male, 1 = female).
    pub voice_id: usize,
    pub engine: EngineKind,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            rate: NATIVE_RATE_WPM,
            volume: 1.0,
            voice_id: 0,
            engine: EngineKind::Standard,
        }
    }
}

impl TtsConfig {
    /// Clamp rate and volume into the given bounds, warning when a value changes.
    pub fn clamped_to(mut self, min_rate: u32, max_rate: u32, min_vol: f32, max_vol: f32) -> Self {
        let rate = self.rate.clamp(min_rate, max_rate);
        if rate != self.rate {
            log::warn!("Speech rate {} clamped to {rate}", self.rate);
            self.rate = rate;
        }
        let volume = if self.volume.is_nan() {
            max_vol
        } else {
            self.volume.clamp(min_vol, max_vol)
        };
        if volume != self.volume {
            log::warn!("Volume {} clamped to {volume}", self.volume);
            self.volume = volume;
        }
        self
    }

    /// Clamp into the supported 50-300 WPM and 0.0-1.0 ranges.
    pub fn clamped(self) -> Self {
        self.clamped_to(MIN_RATE_WPM, MAX_RATE_WPM, 0.0, 1.0)
    }

    /// Playback speed relative to the native 150 WPM pace.
    pub fn speed_factor(&self) -> f32 {
        self.rate as f32 / NATIVE_RATE_WPM as f32
    }
}

/// A voice an engine can speak with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceInfo {
    pub id: usize,
    pub name: String,
    pub language: Option<String>,
    pub gender: Option<String>,
}
