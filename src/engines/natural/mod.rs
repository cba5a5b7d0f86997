//! Natural voice: a neural text-to-waveform model with rate control applied afterwards.
//!
//! The model only speaks at its own pace, so a request is synthesized at speed 1.0 and then
//! time-stretched by `rate / 150` with the phase vocoder in [`crate::audio::stretch`], which
//! keeps the pitch of the voice. Volume is applied last and the result hard-clipped.
//!
//! Models are loaded through a [`VoiceModelLoader`] into a [`ModelCache`]; with the `kokoro`
//! feature the default loader reads a Kokoro ONNX model directory.

mod cache;

pub use cache::{ModelCache, SharedVoice};

use crate::audio::{apply_volume, time_stretch};
use crate::config::TtsSettings;
use crate::{SynthesisEngine, SynthesisResult};

use super::{TtsConfig, TtsError, VoiceInfo};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NaturalError {
    #[error("Natural voice model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Natural voice synthesis failed: {0}")]
    Synthesis(String),
    #[error("Natural voice model is unusable after a panic during synthesis")]
    Poisoned,
}

/// A loaded neural voice model.
pub trait NeuralVoice: Send {
    /// Native output sample rate.
    fn sample_rate(&self) -> u32;

    /// Synthesize `text` with the model's `speaker` at its native pace.
    fn synthesize(&mut self, text: &str, speaker: &str) -> Result<Vec<f32>, NaturalError>;
}

/// Loads a [`NeuralVoice`]; called at most once per successful [`ModelCache`] fill.
pub trait VoiceModelLoader {
    /// Human-readable model location for logs.
    fn describe(&self) -> String;

    fn load(&self) -> Result<Box<dyn NeuralVoice>, NaturalError>;
}

/// A speaker the natural voice can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speaker {
    /// Model speaker name.
    pub name: &'static str,
    pub label: &'static str,
    pub language: &'static str,
}

/// `voice_id` to speaker. Order matters: index 0 is the male voice and 1 the female voice
/// everywhere in the application.
pub const SPEAKERS: &[Speaker] = &[
    Speaker {
        name: "am_adam",
        label: "male",
        language: "en-us",
    },
    Speaker {
        name: "af_heart",
        label: "female",
        language: "en-us",
    },
    Speaker {
        name: "bm_george",
        label: "male",
        language: "en-gb",
    },
    Speaker {
        name: "bf_emma",
        label: "female",
        language: "en-gb",
    },
];

/// Resolve `voice_id`, falling back to speaker 0 for ids outside the table.
pub fn speaker_for(voice_id: usize) -> &'static Speaker {
    match SPEAKERS.get(voice_id) {
        Some(speaker) => speaker,
        None => {
            log::warn!("Unknown natural voice id {voice_id}, using {}", SPEAKERS[0].name);
            &SPEAKERS[0]
        }
    }
}

/// Loader used when no neural backend is compiled in.
#[cfg(not(feature = "kokoro"))]
struct MissingBackend {
    model_dir: std::path::PathBuf,
}

#[cfg(not(feature = "kokoro"))]
impl VoiceModelLoader for MissingBackend {
    fn describe(&self) -> String {
        self.model_dir.display().to_string()
    }

    fn load(&self) -> Result<Box<dyn NeuralVoice>, NaturalError> {
        Err(NaturalError::ModelUnavailable(
            "built without a neural voice backend (enable the `kokoro` feature)".to_string(),
        ))
    }
}

/// The loader for the configured natural model directory.
pub fn default_loader(settings: &TtsSettings) -> Box<dyn VoiceModelLoader> {
    #[cfg(feature = "kokoro")]
    {
        Box::new(super::kokoro::KokoroLoader::from_settings(settings))
    }
    #[cfg(not(feature = "kokoro"))]
    {
        Box::new(MissingBackend {
            model_dir: settings.natural_model_dir.clone(),
        })
    }
}

pub struct NaturalEngine {
    loader: Box<dyn VoiceModelLoader>,
    cache: &'static ModelCache,
}

impl NaturalEngine {
    /// Engine backed by the process-wide model cache.
    pub fn new(loader: Box<dyn VoiceModelLoader>) -> Self {
        Self::with_cache(loader, ModelCache::global())
    }

    pub fn with_cache(loader: Box<dyn VoiceModelLoader>, cache: &'static ModelCache) -> Self {
        Self { loader, cache }
    }

    pub fn from_settings(settings: &TtsSettings) -> Self {
        Self::new(default_loader(settings))
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.is_loaded()
    }

    /// Load the model now instead of on first synthesis.
    pub fn preload(&self) -> Result<(), NaturalError> {
        self.cache.get_or_load(self.loader.as_ref()).map(|_| ())
    }
}

impl SynthesisEngine for NaturalEngine {
    fn name(&self) -> &'static str {
        "natural"
    }

    fn list_voices(&self) -> Result<Vec<VoiceInfo>, TtsError> {
        Ok(SPEAKERS
            .iter()
            .enumerate()
            .map(|(id, s)| VoiceInfo {
                id,
                name: s.name.to_string(),
                language: Some(s.language.to_string()),
                gender: Some(s.label.to_string()),
            })
            .collect())
    }

    fn synthesize(&mut self, text: &str, config: &TtsConfig) -> Result<SynthesisResult, TtsError> {
        let config = config.clamped();
        let speaker = speaker_for(config.voice_id);
        let model = self.cache.get_or_load(self.loader.as_ref())?;

        let (native, sample_rate) = {
            let mut voice = model.lock().map_err(|_| NaturalError::Poisoned)?;
            let samples = voice.synthesize(text, speaker.name)?;
            (samples, voice.sample_rate())
        };

        let speed = config.speed_factor();
        let mut samples = time_stretch(&native, speed);
        apply_volume(&mut samples, config.volume);

        log::debug!(
            "Natural voice '{}': {} samples at native pace, {} after {speed:.2}x stretch",
            speaker.name,
            native.len(),
            samples.len()
        );
        Ok(SynthesisResult {
            samples,
            sample_rate,
        })
    }
}
