//! Application settings, grouped by pipeline stage.
//!
//! Everything is read once at startup from an optional TOML file; missing keys take the
//! defaults below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engines::{EngineKind, TtsConfig};
use crate::simplify::SimplifierModel;
use crate::text::echo::DEFAULT_ECHO_THRESHOLD;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ocr: OcrConfig,
    pub simplification: SimplificationConfig,
    pub tts: TtsSettings,
    pub features: FeatureFlags,
    /// Where synthesized audio is written. `None` uses `./output`.
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ocr.validate()?;
        self.simplification.validate()?;
        self.tts.validate()?;
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("output"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Path to the tesseract binary. `None` uses `tesseract` from PATH.
    pub tesseract_path: Option<PathBuf>,
    /// Path to the pdftoppm binary. `None` uses `pdftoppm` from PATH.
    pub pdftoppm_path: Option<PathBuf>,
    /// Resolution PDF pages are rendered at before recognition.
    pub pdf_dpi: u32,
    /// Tesseract language codes, e.g. `["eng", "fra"]`.
    pub languages: Vec<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            pdftoppm_path: None,
            pdf_dpi: 200,
            languages: vec!["eng".to_string()],
        }
    }
}

impl OcrConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(50..=1200).contains(&self.pdf_dpi) {
            return Err(ConfigError::Invalid(format!(
                "ocr.pdf_dpi must be within 50..=1200, got {}",
                self.pdf_dpi
            )));
        }
        if self.languages.is_empty() {
            return Err(ConfigError::Invalid(
                "ocr.languages must name at least one language".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generation settings for one simplification model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub model_name: String,
    pub max_length: usize,
    pub num_beams: usize,
}

impl ModelSettings {
    fn for_model(model: SimplifierModel) -> Self {
        Self {
            model_name: model.default_name().to_string(),
            max_length: 100,
            num_beams: 4,
        }
    }
}

impl Default for ModelSettings {
    /// Used for partially written sections; an empty name resolves in [`ModelSettings::name`].
    fn default() -> Self {
        Self {
            model_name: String::new(),
            ..Self::for_model(SimplifierModel::T5)
        }
    }
}

impl ModelSettings {
    /// Configured model name, or the family's default when left blank.
    pub fn name(&self, model: SimplifierModel) -> &str {
        if self.model_name.trim().is_empty() {
            model.default_name()
        } else {
            &self.model_name
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplificationConfig {
    pub default_model: SimplifierModel,
    pub t5: ModelSettings,
    pub bart: ModelSettings,
    /// Maximum characters per chunk sent to the model.
    pub chunk_size: usize,
    /// Share of the input a model must echo before the echo is stripped.
    pub echo_threshold: f32,
    /// Directory holding one subdirectory per exported model.
    pub model_dir: PathBuf,
    /// Inference threads for the simplification models. `None` uses the runtime default.
    pub num_threads: Option<usize>,
}

impl Default for SimplificationConfig {
    fn default() -> Self {
        Self {
            default_model: SimplifierModel::T5,
            t5: ModelSettings::for_model(SimplifierModel::T5),
            bart: ModelSettings::for_model(SimplifierModel::Bart),
            chunk_size: 512,
            echo_threshold: DEFAULT_ECHO_THRESHOLD,
            model_dir: PathBuf::from("models"),
            num_threads: None,
        }
    }
}

impl SimplificationConfig {
    pub fn settings(&self, model: SimplifierModel) -> &ModelSettings {
        match model {
            SimplifierModel::T5 => &self.t5,
            SimplifierModel::Bart => &self.bart,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, s) in [("t5", &self.t5), ("bart", &self.bart)] {
            if s.max_length == 0 || s.num_beams == 0 {
                return Err(ConfigError::Invalid(format!(
                    "simplification.{name}: max_length and num_beams must be > 0"
                )));
            }
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "simplification.chunk_size must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.echo_threshold) {
            return Err(ConfigError::Invalid(format!(
                "simplification.echo_threshold must be within 0..=1, got {}",
                self.echo_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    pub default_rate: u32,
    pub min_rate: u32,
    pub max_rate: u32,
    pub default_volume: f32,
    pub min_volume: f32,
    pub max_volume: f32,
    /// Named voices, e.g. `male = 0`.
    pub voices: BTreeMap<String, usize>,
    pub default_engine: EngineKind,
    /// espeak-ng binary for the standard engine. `None` uses PATH.
    pub espeak_path: Option<PathBuf>,
    /// espeak-ng data directory. `None` uses the system default.
    pub espeak_data_path: Option<PathBuf>,
    /// Directory of the natural voice model.
    pub natural_model_dir: PathBuf,
    /// Inference threads for the natural voice model. `None` uses the runtime default.
    pub num_threads: Option<usize>,
    /// Where to keep the optimized natural voice graph so later runs skip optimization.
    /// Must be writable.
    pub natural_optimized_graph: Option<PathBuf>,
}

impl Default for TtsSettings {
    fn default() -> Self {
        let voices = [("male".to_string(), 0), ("female".to_string(), 1)]
            .into_iter()
            .collect();
        Self {
            default_rate: 150,
            min_rate: 50,
            max_rate: 300,
            default_volume: 1.0,
            min_volume: 0.0,
            max_volume: 1.0,
            voices,
            default_engine: EngineKind::Standard,
            espeak_path: None,
            espeak_data_path: None,
            natural_model_dir: PathBuf::from("models/kokoro"),
            num_threads: None,
            natural_optimized_graph: None,
        }
    }
}

impl TtsSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_rate == 0 || self.min_rate > self.max_rate {
            return Err(ConfigError::Invalid(format!(
                "tts rate bounds are inverted or zero: {}..={}",
                self.min_rate, self.max_rate
            )));
        }
        if !(self.min_rate..=self.max_rate).contains(&self.default_rate) {
            return Err(ConfigError::Invalid(format!(
                "tts.default_rate {} is outside {}..={}",
                self.default_rate, self.min_rate, self.max_rate
            )));
        }
        if self.min_volume < 0.0 || self.min_volume > self.max_volume {
            return Err(ConfigError::Invalid(format!(
                "tts volume bounds are invalid: {}..={}",
                self.min_volume, self.max_volume
            )));
        }
        Ok(())
    }

    /// Resolve a voice by name (`"female"`) or numeric id (`"1"`).
    pub fn voice_id(&self, name: &str) -> Option<usize> {
        self.voices
            .get(&name.to_ascii_lowercase())
            .copied()
            .or_else(|| name.parse().ok())
    }

    /// Build a request config, clamping rate and volume into the configured bounds.
    pub fn request(
        &self,
        rate: Option<u32>,
        volume: Option<f32>,
        voice_id: Option<usize>,
        engine: Option<EngineKind>,
    ) -> TtsConfig {
        TtsConfig {
            rate: rate.unwrap_or(self.default_rate),
            volume: volume.unwrap_or(self.default_volume),
            voice_id: voice_id.unwrap_or(0),
            engine: engine.unwrap_or(self.default_engine),
        }
        .clamped_to(self.min_rate, self.max_rate, self.min_volume, self.max_volume)
    }
}

/// Turns individual pipeline stages on or off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_ocr: bool,
    pub enable_simplification: bool,
    pub enable_tts: bool,
    pub enable_analysis: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_ocr: true,
            enable_simplification: true,
            enable_tts: true,
            enable_analysis: true,
        }
    }
}
