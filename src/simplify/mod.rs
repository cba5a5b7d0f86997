//! AI text simplification with a rule-based fallback.
//!
//! The sequence-to-sequence models are external collaborators reached through
//! [`Seq2SeqLoader`] / [`Seq2SeqModel`]. Any load or inference failure is logged and
//! answered with [`rules::simplify`](crate::text::rules::simplify); callers never see it
//! as an error, only as an [`Outcome::Degraded`].
//!
//! # Available Backends
//!
//! Enable via Cargo features:
//! - `seq2seq` - ONNX encoder/decoder exports run with ONNX Runtime

#[cfg(feature = "seq2seq")]
pub mod onnx;

use std::collections::HashMap;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::config::SimplificationConfig;
use crate::outcome::Outcome;
use crate::text::echo::EchoFilter;
use crate::text::rules;

#[derive(thiserror::Error, Debug)]
pub enum SimplifyError {
    #[error("Model '{name}' is unavailable: {reason}")]
    ModelUnavailable { name: String, reason: String },
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "seq2seq")]
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[cfg(feature = "seq2seq")]
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

/// The two supported model families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimplifierModel {
    #[default]
    T5,
    Bart,
}

impl SimplifierModel {
    /// Hub identifier of the model this family is trained from.
    pub fn default_name(&self) -> &'static str {
        match self {
            SimplifierModel::T5 => "t5-small",
            SimplifierModel::Bart => "facebook/bart-base",
        }
    }

    /// Task instruction prepended to the input before encoding.
    pub fn task_prefix(&self) -> &'static str {
        match self {
            SimplifierModel::T5 => "simplify: ",
            SimplifierModel::Bart => "",
        }
    }
}

impl std::str::FromStr for SimplifierModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "t5" | "t5-small" => Ok(SimplifierModel::T5),
            "bart" | "facebook/bart-base" => Ok(SimplifierModel::Bart),
            other => Err(format!("unknown model '{other}', expected 't5' or 'bart'")),
        }
    }
}

/// One simplification call.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct SimplificationRequest {
    #[builder(setter(into))]
    pub text: String,
    #[builder(default)]
    pub model: SimplifierModel,
    /// Maximum generated tokens per chunk.
    #[builder(default = "100")]
    pub max_length: usize,
    #[builder(default = "4")]
    pub num_beams: usize,
}

impl SimplificationRequest {
    /// Request with the model's configured generation settings.
    pub fn new(text: impl Into<String>, model: SimplifierModel, config: &SimplificationConfig) -> Self {
        let settings = config.settings(model);
        Self {
            text: text.into(),
            model,
            max_length: settings.max_length,
            num_beams: settings.num_beams,
        }
    }
}

/// A loaded encoder-decoder model.
pub trait Seq2SeqModel {
    /// Generate output text for an already-prefixed input.
    fn generate(
        &mut self,
        input: &str,
        max_length: usize,
        num_beams: usize,
    ) -> Result<String, SimplifyError>;
}

/// Loads encoder-decoder models by name.
pub trait Seq2SeqLoader {
    fn load(
        &self,
        model: SimplifierModel,
        name: &str,
    ) -> Result<Box<dyn Seq2SeqModel>, SimplifyError>;
}

/// Loader used when no model backend is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModelLoader;

impl Seq2SeqLoader for NoModelLoader {
    fn load(
        &self,
        _model: SimplifierModel,
        name: &str,
    ) -> Result<Box<dyn Seq2SeqModel>, SimplifyError> {
        Err(SimplifyError::ModelUnavailable {
            name: name.to_string(),
            reason: "built without the `seq2seq` feature".to_string(),
        })
    }
}

/// The loader matching the compiled features: ONNX exports under `config.model_dir` with
/// `seq2seq`, otherwise [`NoModelLoader`].
pub fn default_loader(config: &SimplificationConfig) -> Box<dyn Seq2SeqLoader> {
    #[cfg(feature = "seq2seq")]
    {
        Box::new(onnx::OnnxLoader::from_config(config))
    }
    #[cfg(not(feature = "seq2seq"))]
    {
        let _ = config;
        Box::new(NoModelLoader)
    }
}

enum LoadState {
    Loaded(Box<dyn Seq2SeqModel>),
    Failed(String),
}

/// Simplifies text with an AI model, falling back to rules on any failure.
///
/// Models are loaded on first use and kept for the lifetime of the simplifier. A failed
/// load is remembered too, so a missing model is not retried on every call.
pub struct AiSimplifier {
    loader: Box<dyn Seq2SeqLoader>,
    names: HashMap<SimplifierModel, String>,
    models: HashMap<SimplifierModel, LoadState>,
    echo: EchoFilter,
    chunk_size: usize,
}

impl AiSimplifier {
    pub fn new(loader: Box<dyn Seq2SeqLoader>, config: &SimplificationConfig) -> Self {
        let names = [SimplifierModel::T5, SimplifierModel::Bart]
            .into_iter()
            .map(|m| (m, config.settings(m).name(m).to_string()))
            .collect();
        Self {
            loader,
            names,
            models: HashMap::new(),
            echo: EchoFilter::new(config.echo_threshold),
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// True once `model` has been loaded successfully.
    pub fn is_loaded(&self, model: SimplifierModel) -> bool {
        matches!(self.models.get(&model), Some(LoadState::Loaded(_)))
    }

    fn model_state(&mut self, model: SimplifierModel) -> &mut LoadState {
        let loader = &self.loader;
        let name = self
            .names
            .get(&model)
            .cloned()
            .unwrap_or_else(|| model.default_name().to_string());

        self.models.entry(model).or_insert_with(|| {
            log::info!("Loading simplification model '{name}'");
            match loader.load(model, &name) {
                Ok(m) => {
                    log::info!("Model '{name}' loaded");
                    LoadState::Loaded(m)
                }
                Err(e) => {
                    log::warn!("Could not load '{name}', using rule-based simplification: {e}");
                    LoadState::Failed(e.to_string())
                }
            }
        })
    }

    /// Simplify the request text.
    ///
    /// The text is cut into sentence-aligned chunks of at most `chunk_size` characters.
    /// Each chunk goes through the model; a chunk whose generation fails keeps its
    /// rule-based simplification and the result is reported as degraded.
    pub fn simplify(&mut self, request: &SimplificationRequest) -> Outcome<String> {
        if request.text.trim().is_empty() {
            return Outcome::Success(String::new());
        }

        let echo = self.echo;
        let chunks = chunk_sentences(&request.text, self.chunk_size);
        let model = match self.model_state(request.model) {
            LoadState::Loaded(model) => model,
            LoadState::Failed(reason) => {
                return Outcome::degraded(rules::simplify(&request.text), reason.clone());
            }
        };

        let prefix = request.model.task_prefix();
        let mut parts = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();

        for chunk in &chunks {
            let input = format!("{prefix}{chunk}");
            match model.generate(&input, request.max_length, request.num_beams) {
                Ok(output) => {
                    let cleaned = echo.apply(chunk, output.trim()).trim();
                    if cleaned.is_empty() {
                        parts.push(rules::simplify(chunk));
                    } else {
                        parts.push(cleaned.to_string());
                    }
                }
                Err(e) => {
                    log::warn!("Simplification failed for a chunk, using rules: {e}");
                    failures.push(e.to_string());
                    parts.push(rules::simplify(chunk));
                }
            }
        }

        let text = parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        log::info!("Text simplified with {}", request.model.default_name());

        match failures.first() {
            None => Outcome::Success(text),
            Some(first) => Outcome::degraded(
                text,
                format!(
                    "{} of {} chunk(s) fell back to rules: {first}",
                    failures.len(),
                    chunks.len()
                ),
            ),
        }
    }
}

/// Group sentences into chunks of at most `max_chars` characters.
///
/// A single sentence longer than `max_chars` becomes its own chunk.
pub fn chunk_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for (sentence, terminator) in rules::split_sentences(text) {
        let sentence = format!("{sentence}{terminator}");
        let would_be = current.chars().count() + 1 + sentence.chars().count();
        if !current.is_empty() && would_be > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
