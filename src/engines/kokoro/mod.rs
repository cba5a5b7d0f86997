//! Kokoro-82M backend for the natural voice.
//!
//! Text is phonemized with espeak-ng and run through the Kokoro ONNX model at speed 1.0;
//! rate control happens afterwards in [`crate::engines::natural`].
//!
//! # Model Directory Layout
//!
//! ```text
//! models/kokoro/
//! ├── kokoro-quant-convinteger.onnx   # any .onnx file is accepted, this one is preferred
//! ├── voices-v1.0.bin                  # voice style archive (.npz)
//! └── config.json                      # phoneme vocabulary ("vocab" object)
//! ```
//!
//! Download links:
//! - Model: <https://github.com/taylorchu/kokoro-onnx/releases/tag/v0.2.0>
//! - Voices: <https://github.com/thewh1teagle/kokoro-onnx/releases/tag/model-files-v1.0>
//! - Vocabulary: `config.json` from <https://huggingface.co/hexgrad/Kokoro-82M>

mod assets;
mod model;
mod phonemizer;

use std::path::PathBuf;

use crate::config::TtsSettings;
use crate::engines::espeak::{EspeakConfig, EspeakError};
use crate::engines::natural::{NaturalError, NeuralVoice, VoiceModelLoader, SPEAKERS};

pub use model::{KokoroModel, SAMPLE_RATE};

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Phonemization failed: {0}")]
    Phonemizer(#[from] EspeakError),
    #[error("Voice '{0}' not found in the voice archive")]
    VoiceNotFound(String),
    #[error("Invalid config.json: {0}")]
    Config(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
}

/// Loads a Kokoro model directory for the natural voice cache.
#[derive(Debug, Clone)]
pub struct KokoroLoader {
    model_dir: PathBuf,
    num_threads: Option<usize>,
    optimized_cache: Option<PathBuf>,
    espeak: EspeakConfig,
}

impl KokoroLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            num_threads: None,
            optimized_cache: None,
            espeak: EspeakConfig::default(),
        }
    }

    pub fn from_settings(settings: &TtsSettings) -> Self {
        Self {
            num_threads: settings.num_threads,
            optimized_cache: settings.natural_optimized_graph.clone(),
            espeak: EspeakConfig::from_settings(settings),
            ..Self::new(&settings.natural_model_dir)
        }
    }
}

impl VoiceModelLoader for KokoroLoader {
    fn describe(&self) -> String {
        format!("Kokoro model at {}", self.model_dir.display())
    }

    fn load(&self) -> Result<Box<dyn NeuralVoice>, NaturalError> {
        let model = KokoroModel::load(
            &self.model_dir,
            self.num_threads,
            self.optimized_cache.as_deref(),
        )
        .map_err(|e| NaturalError::ModelUnavailable(e.to_string()))?;

        let available = model.list_voices();
        for speaker in SPEAKERS {
            if !available.contains(&speaker.name) {
                log::warn!(
                    "Kokoro voice archive has no '{}', voice requests for it will fail",
                    speaker.name
                );
            }
        }

        Ok(Box::new(KokoroVoice {
            model,
            espeak: self.espeak.clone(),
        }))
    }
}

/// A loaded Kokoro model speaking at its native pace.
pub struct KokoroVoice {
    model: KokoroModel,
    espeak: EspeakConfig,
}

impl NeuralVoice for KokoroVoice {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn synthesize(&mut self, text: &str, speaker: &str) -> Result<Vec<f32>, NaturalError> {
        self.model
            .synthesize_text(text, speaker, &self.espeak)
            .map_err(|e| NaturalError::Synthesis(e.to_string()))
    }
}
