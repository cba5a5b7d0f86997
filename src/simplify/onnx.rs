//! Encoder-decoder simplification models exported to ONNX.
//!
//! # Model Directory Layout
//!
//! One directory per model, named after the hub id with `/` replaced by `--`:
//!
//! ```text
//! models/
//! ├── t5-small/
//! │   ├── encoder_model.onnx
//! │   ├── decoder_model.onnx
//! │   ├── tokenizer.json
//! │   └── config.json          # optional: special token ids
//! └── facebook--bart-base/
//!     └── ...
//! ```
//!
//! These are the files produced by `optimum-cli export onnx --task text2text-generation`.

use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayD};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;

use super::{Seq2SeqLoader, Seq2SeqModel, SimplifierModel, SimplifyError};
use crate::config::SimplificationConfig;

/// Longest input, in tokens, passed to the encoder.
const MAX_INPUT_TOKENS: usize = 512;

/// Loads ONNX exports from subdirectories of a model root.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    model_dir: PathBuf,
    num_threads: Option<usize>,
}

impl OnnxLoader {
    pub fn new(model_dir: PathBuf) -> Self {
        Self {
            model_dir,
            num_threads: None,
        }
    }

    pub fn from_config(config: &SimplificationConfig) -> Self {
        Self {
            num_threads: config.num_threads,
            ..Self::new(config.model_dir.clone())
        }
    }

    fn dir_for(&self, name: &str) -> PathBuf {
        self.model_dir.join(name.replace('/', "--"))
    }
}

impl Seq2SeqLoader for OnnxLoader {
    fn load(
        &self,
        model: SimplifierModel,
        name: &str,
    ) -> Result<Box<dyn Seq2SeqModel>, SimplifyError> {
        let dir = self.dir_for(name);
        for file in ["encoder_model.onnx", "decoder_model.onnx", "tokenizer.json"] {
            if !dir.join(file).exists() {
                return Err(SimplifyError::ModelUnavailable {
                    name: name.to_string(),
                    reason: format!("{} not found", dir.join(file).display()),
                });
            }
        }
        Ok(Box::new(OnnxSeq2Seq::load(&dir, model, self.num_threads)?))
    }
}

/// Special token ids used while decoding.
#[derive(Debug, Clone, Copy)]
struct SpecialTokens {
    decoder_start: i64,
    eos: i64,
    forced_bos: Option<i64>,
}

impl SpecialTokens {
    fn defaults(model: SimplifierModel) -> Self {
        match model {
            SimplifierModel::T5 => Self {
                decoder_start: 0,
                eos: 1,
                forced_bos: None,
            },
            SimplifierModel::Bart => Self {
                decoder_start: 2,
                eos: 2,
                forced_bos: Some(0),
            },
        }
    }

    /// Override the defaults with ids from `config.json`, when present.
    fn from_config(path: &Path, model: SimplifierModel) -> Self {
        let mut tokens = Self::defaults(model);
        let Ok(content) = std::fs::read_to_string(path) else {
            return tokens;
        };
        let json: serde_json::Value = match serde_json::from_str(&content) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Ignoring unreadable {}: {e}", path.display());
                return tokens;
            }
        };

        if let Some(id) = json.get("decoder_start_token_id").and_then(|v| v.as_i64()) {
            tokens.decoder_start = id;
        }
        if let Some(id) = json.get("eos_token_id").and_then(|v| v.as_i64()) {
            tokens.eos = id;
        }
        if let Some(v) = json.get("forced_bos_token_id") {
            tokens.forced_bos = v.as_i64();
        }
        tokens
    }
}

#[derive(Debug, Clone)]
struct Beam {
    tokens: Vec<i64>,
    log_prob: f32,
    finished: bool,
}

impl Beam {
    /// Log probability normalized by generated length.
    fn score(&self) -> f32 {
        self.log_prob / self.tokens.len().max(1) as f32
    }
}

/// A T5 or BART model split into encoder and decoder sessions.
pub struct OnnxSeq2Seq {
    encoder: Session,
    decoder: Session,
    tokenizer: Tokenizer,
    special: SpecialTokens,
}

impl OnnxSeq2Seq {
    pub fn load(
        dir: &Path,
        model: SimplifierModel,
        num_threads: Option<usize>,
    ) -> Result<Self, SimplifyError> {
        log::info!("Loading {model:?} ONNX export from {}", dir.display());
        let encoder = init_session(&dir.join("encoder_model.onnx"), num_threads)?;
        let decoder = init_session(&dir.join("decoder_model.onnx"), num_threads)?;
        let tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
            .map_err(|e| SimplifyError::Tokenizer(e.to_string()))?;
        let special = SpecialTokens::from_config(&dir.join("config.json"), model);

        Ok(Self {
            encoder,
            decoder,
            tokenizer,
            special,
        })
    }

    fn encode(&mut self, ids: &[i64]) -> Result<ArrayD<f32>, SimplifyError> {
        let len = ids.len();
        let input_ids = Array2::from_shape_vec((1, len), ids.to_vec())?;
        let mask = Array2::<i64>::ones((1, len));

        let outputs = self.encoder.run(inputs![
            "input_ids" => TensorRef::from_array_view(input_ids.view())?,
            "attention_mask" => TensorRef::from_array_view(mask.view())?,
        ])?;
        let (_, hidden) = outputs.iter().next().ok_or_else(no_output)?;
        Ok(hidden.try_extract_array::<f32>()?.to_owned())
    }

    /// Log-probabilities of the next token after `tokens`.
    fn next_token_log_probs(
        &mut self,
        tokens: &[i64],
        hidden: &ArrayD<f32>,
        mask: &Array2<i64>,
    ) -> Result<Vec<f32>, SimplifyError> {
        let decoder_ids = Array2::from_shape_vec((1, tokens.len()), tokens.to_vec())?;

        let outputs = self.decoder.run(inputs![
            "input_ids" => TensorRef::from_array_view(decoder_ids.view())?,
            "encoder_attention_mask" => TensorRef::from_array_view(mask.view())?,
            "encoder_hidden_states" => TensorRef::from_array_view(hidden.view())?,
        ])?;
        let (_, logits) = outputs.iter().next().ok_or_else(no_output)?;
        let logits = logits.try_extract_array::<f32>()?;

        let shape = logits.shape();
        let vocab = *shape
            .last()
            .ok_or_else(|| SimplifyError::Inference("logits have no dimensions".to_string()))?;
        let flat = logits
            .as_slice()
            .ok_or_else(|| SimplifyError::Inference("logits are not contiguous".to_string()))?;
        if flat.len() < vocab {
            return Err(SimplifyError::Inference("empty logits".to_string()));
        }

        Ok(log_softmax(&flat[flat.len() - vocab..]))
    }

    fn beam_search(
        &mut self,
        hidden: &ArrayD<f32>,
        src_len: usize,
        max_length: usize,
        num_beams: usize,
    ) -> Result<Vec<i64>, SimplifyError> {
        let mask = Array2::<i64>::ones((1, src_len));
        let mut start = vec![self.special.decoder_start];
        if let Some(bos) = self.special.forced_bos {
            start.push(bos);
        }
        let prompt_len = start.len();

        let mut beams = vec![Beam {
            tokens: start,
            log_prob: 0.0,
            finished: false,
        }];

        for _ in 0..max_length {
            let mut candidates = Vec::with_capacity(beams.len() * num_beams);
            for beam in &beams {
                if beam.finished {
                    candidates.push(beam.clone());
                    continue;
                }
                let log_probs = self.next_token_log_probs(&beam.tokens, hidden, &mask)?;
                for (token, lp) in top_k(&log_probs, num_beams) {
                    let mut tokens = beam.tokens.clone();
                    tokens.push(token as i64);
                    candidates.push(Beam {
                        finished: token as i64 == self.special.eos,
                        tokens,
                        log_prob: beam.log_prob + lp,
                    });
                }
            }

            candidates.sort_by(|a, b| b.score().total_cmp(&a.score()));
            candidates.truncate(num_beams);
            beams = candidates;

            if beams.iter().all(|b| b.finished) {
                break;
            }
        }

        let best = beams
            .into_iter()
            .max_by(|a, b| a.score().total_cmp(&b.score()))
            .ok_or_else(|| SimplifyError::Inference("beam search produced nothing".to_string()))?;
        Ok(best.tokens[prompt_len..].to_vec())
    }
}

impl Seq2SeqModel for OnnxSeq2Seq {
    fn generate(
        &mut self,
        input: &str,
        max_length: usize,
        num_beams: usize,
    ) -> Result<String, SimplifyError> {
        let encoding = self
            .tokenizer
            .encode(input, true)
            .map_err(|e| SimplifyError::Tokenizer(e.to_string()))?;
        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        if ids.len() > MAX_INPUT_TOKENS {
            log::debug!("Truncating input from {} to {MAX_INPUT_TOKENS} tokens", ids.len());
            ids.truncate(MAX_INPUT_TOKENS);
        }
        if ids.is_empty() {
            return Ok(String::new());
        }

        let hidden = self.encode(&ids)?;
        let generated = self.beam_search(&hidden, ids.len(), max_length, num_beams.max(1))?;

        let generated: Vec<u32> = generated
            .into_iter()
            .filter(|&id| id >= 0)
            .map(|id| id as u32)
            .collect();
        self.tokenizer
            .decode(&generated, true)
            .map_err(|e| SimplifyError::Tokenizer(e.to_string()))
    }
}

fn init_session(onnx_path: &Path, num_threads: Option<usize>) -> Result<Session, SimplifyError> {
    let providers = vec![CPUExecutionProvider::default().build()];
    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?;

    if let Some(threads) = num_threads {
        builder = builder.with_intra_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}

fn no_output() -> SimplifyError {
    SimplifyError::Inference("model produced no output".to_string())
}

fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = logits.iter().map(|&l| (l - max).exp()).sum();
    let log_sum = sum.ln() + max;
    logits.iter().map(|&l| l - log_sum).collect()
}

/// Indices and values of the `k` largest entries, largest first.
fn top_k(values: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = values.iter().copied().enumerate().collect();
    let k = k.min(indexed.len());
    if k == 0 {
        return Vec::new();
    }
    indexed.select_nth_unstable_by(k - 1, |a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_softmax_sums_to_one() {
        let lp = log_softmax(&[1.0, 2.0, 3.0, -5.0]);
        let total: f32 = lp.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(lp[2] > lp[1] && lp[1] > lp[0]);
    }

    #[test]
    fn top_k_orders_largest_first() {
        let top = top_k(&[0.1, 0.9, 0.5, 0.7], 2);
        assert_eq!(top.iter().map(|t| t.0).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(top_k(&[0.3], 4).len(), 1);
        assert!(top_k(&[0.3], 0).is_empty());
    }

    #[test]
    fn loader_takes_dir_and_threads_from_config() {
        let config = SimplificationConfig {
            model_dir: PathBuf::from("/srv/models"),
            num_threads: Some(3),
            ..Default::default()
        };
        let loader = OnnxLoader::from_config(&config);
        assert_eq!(loader.num_threads, Some(3));
        assert_eq!(
            loader.dir_for("t5-small"),
            PathBuf::from("/srv/models/t5-small")
        );
    }

    #[test]
    fn missing_export_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OnnxLoader::new(dir.path().to_path_buf());
        let err = loader
            .load(SimplifierModel::Bart, "facebook/bart-base")
            .err()
            .expect("empty directory cannot load");
        match err {
            SimplifyError::ModelUnavailable { name, reason } => {
                assert_eq!(name, "facebook/bart-base");
                assert!(reason.contains("facebook--bart-base"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn special_tokens_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"decoder_start_token_id": 7, "forced_bos_token_id": null}"#)
            .unwrap();
        let tokens = SpecialTokens::from_config(&path, SimplifierModel::Bart);
        assert_eq!(tokens.decoder_start, 7);
        assert_eq!(tokens.eos, 2);
        assert_eq!(tokens.forced_bos, None);

        let missing = SpecialTokens::from_config(&dir.path().join("nope.json"), SimplifierModel::T5);
        assert_eq!(missing.decoder_start, 0);
        assert_eq!(missing.eos, 1);
    }
}
