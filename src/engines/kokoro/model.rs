use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::assets::{load_vocab, VoiceStore, STYLE_DIM};
use super::phonemizer::{phonemize, voice_lang};
use super::KokoroError;
use crate::engines::espeak::EspeakConfig;

/// Output sample rate of the Kokoro model.
pub const SAMPLE_RATE: u32 = 24_000;

/// Longest phoneme sequence the model accepts, before the two padding tokens.
const MAX_PHONEMES: usize = 510;

/// 10 ms crossfade at 24 kHz between chunk waveforms.
const CROSSFADE: usize = 240;

/// Vocabulary ids of `; : , . ! ?`, preferred chunk boundaries.
const BOUNDARY_IDS: &[i64] = &[1, 2, 3, 4, 5, 6];

/// How the loaded graph names and types its inputs. Exports differ.
struct InputLayout {
    tokens: String,
    speed_is_int32: bool,
}

impl InputLayout {
    fn detect(session: &Session) -> Self {
        let mut layout = Self {
            tokens: "input_ids".to_string(),
            speed_is_int32: true,
        };
        for input in session.inputs() {
            match input.name() {
                "input_ids" | "tokens" => layout.tokens = input.name().to_string(),
                "speed" => {
                    let dtype = format!("{:?}", input.dtype());
                    layout.speed_is_int32 = dtype.to_ascii_lowercase().contains("int32");
                }
                _ => {}
            }
        }
        layout
    }
}

pub struct KokoroModel {
    session: Session,
    voices: VoiceStore,
    vocab: HashMap<char, i64>,
    layout: InputLayout,
}

impl KokoroModel {
    /// Load the ONNX graph, the voice archive and the vocabulary from `model_dir`.
    pub fn load(
        model_dir: &Path,
        num_threads: Option<usize>,
        optimized_cache: Option<&Path>,
    ) -> Result<Self, KokoroError> {
        let onnx_path = find_onnx_file(model_dir)?;
        log::info!("Loading Kokoro model from {}", onnx_path.display());

        let session = init_session(&onnx_path, num_threads, optimized_cache)?;
        let layout = InputLayout::detect(&session);
        log::debug!(
            "Kokoro inputs: tokens='{}', speed_is_int32={}",
            layout.tokens,
            layout.speed_is_int32
        );

        let voices = VoiceStore::load(&model_dir.join("voices-v1.0.bin"))?;
        let vocab = load_vocab(&model_dir.join("config.json"))?;

        Ok(Self {
            session,
            voices,
            vocab,
            layout,
        })
    }

    /// Synthesize `text` with `voice` at the model's native pace.
    pub fn synthesize_text(
        &mut self,
        text: &str,
        voice: &str,
        espeak: &EspeakConfig,
    ) -> Result<Vec<f32>, KokoroError> {
        let ids = phonemize(text, voice_lang(voice), &self.vocab, espeak)?;
        if ids.is_empty() {
            log::warn!("No phoneme tokens produced for text: {text:?}");
            return Ok(Vec::new());
        }

        // One style for the whole text so prosody doesn't jump between chunks.
        let style = self.voices.style(voice, ids.len())?;

        let mut waveform = Vec::with_capacity(ids.len() * 300);
        for chunk in split_at_boundaries(&ids) {
            let audio = self.run_chunk(chunk, &style)?;
            crossfade_append(&mut waveform, &audio);
        }
        Ok(waveform)
    }

    fn run_chunk(&mut self, tokens: &[i64], style: &[f32; STYLE_DIM]) -> Result<Vec<f32>, KokoroError> {
        let mut padded = Vec::with_capacity(tokens.len() + 2);
        padded.push(0);
        padded.extend_from_slice(tokens);
        padded.push(0);
        let tokens = Array2::from_shape_vec((1, padded.len()), padded)?;
        let style = ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;

        let outputs = if self.layout.speed_is_int32 {
            let speed = ndarray::arr1(&[1i32]);
            let inputs = inputs![
                self.layout.tokens.as_str() => TensorRef::from_array_view(tokens.view())?,
                "style" => TensorRef::from_array_view(style)?,
                "speed" => TensorRef::from_array_view(speed.view())?,
            ];
            self.session.run(inputs)?
        } else {
            let speed = ndarray::arr1(&[1.0f32]);
            let inputs = inputs![
                self.layout.tokens.as_str() => TensorRef::from_array_view(tokens.view())?,
                "style" => TensorRef::from_array_view(style)?,
                "speed" => TensorRef::from_array_view(speed.view())?,
            ];
            self.session.run(inputs)?
        };

        let (_, waveform) = outputs
            .iter()
            .next()
            .ok_or_else(|| KokoroError::Ort(ort::Error::new("No output from model")))?;
        let waveform = waveform.try_extract_array::<f32>()?;
        Ok(waveform.iter().copied().collect())
    }

    /// Voice names in the loaded archive, sorted.
    pub fn list_voices(&self) -> Vec<&str> {
        self.voices.names()
    }
}

/// `kokoro-quant-convinteger.onnx` if present, otherwise the first `.onnx` file.
fn find_onnx_file(model_dir: &Path) -> Result<PathBuf, KokoroError> {
    let preferred = model_dir.join("kokoro-quant-convinteger.onnx");
    if preferred.exists() {
        return Ok(preferred);
    }
    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("onnx") {
            return Ok(path);
        }
    }
    Err(KokoroError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("No .onnx file found in {}", model_dir.display()),
    )))
}

/// Build the session, reusing or writing a pre-optimized graph when `optimized_cache` is set.
///
/// Level3 optimization takes several seconds; a serialized optimized graph loads with
/// optimization disabled.
fn init_session(
    onnx_path: &Path,
    num_threads: Option<usize>,
    optimized_cache: Option<&Path>,
) -> Result<Session, KokoroError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let (load_path, level, write_to) = match optimized_cache {
        Some(cache) if cache.exists() => {
            log::info!("Loading pre-optimized Kokoro graph from {}", cache.display());
            (cache, GraphOptimizationLevel::Disable, None)
        }
        Some(cache) => {
            log::info!("Optimizing Kokoro graph, saving to {}", cache.display());
            (onnx_path, GraphOptimizationLevel::Level3, Some(cache))
        }
        None => (onnx_path, GraphOptimizationLevel::Level3, None),
    };

    let mut builder = Session::builder()?
        .with_optimization_level(level)?
        .with_execution_providers(providers)?
        .with_parallel_execution(true)?;

    if let Some(cache) = write_to {
        builder = builder.with_optimized_model_path(cache)?;
    }

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

/// Split `ids` into runs of at most [`MAX_PHONEMES`], cutting after the last punctuation
/// token of each run when there is one.
fn split_at_boundaries(ids: &[i64]) -> Vec<&[i64]> {
    let mut chunks = Vec::new();
    let mut rest = ids;
    while rest.len() > MAX_PHONEMES {
        let window = &rest[..MAX_PHONEMES];
        let cut = window
            .iter()
            .rposition(|id| BOUNDARY_IDS.contains(id))
            .map(|i| i + 1)
            .unwrap_or(MAX_PHONEMES);
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

/// Append `next` to `dst`, linearly blending the overlapping [`CROSSFADE`] samples.
fn crossfade_append(dst: &mut Vec<f32>, next: &[f32]) {
    let overlap = CROSSFADE.min(dst.len()).min(next.len());
    let start = dst.len() - overlap;
    for (i, (d, &n)) in dst[start..].iter_mut().zip(next).enumerate() {
        let t = (i + 1) as f32 / (overlap + 1) as f32;
        *d = *d * (1.0 - t) + n * t;
    }
    dst.extend_from_slice(&next[overlap..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sequences_stay_whole() {
        let ids: Vec<i64> = (10..60).collect();
        assert_eq!(split_at_boundaries(&ids), vec![&ids[..]]);
        assert!(split_at_boundaries(&[]).is_empty());
    }

    #[test]
    fn long_sequences_split_after_punctuation() {
        let mut ids = vec![20i64; 700];
        ids[300] = 4; // '.'
        let chunks = split_at_boundaries(&ids);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 301);
        assert_eq!(*chunks[0].last().unwrap(), 4);
        assert_eq!(chunks[1].len(), 399);
    }

    #[test]
    fn long_sequences_without_punctuation_split_at_limit() {
        let ids = vec![20i64; 1_200];
        let lens: Vec<usize> = split_at_boundaries(&ids).iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![MAX_PHONEMES, MAX_PHONEMES, 180]);
    }

    #[test]
    fn crossfade_blends_overlap() {
        let mut dst = vec![1.0f32; 500];
        crossfade_append(&mut dst, &[0.0f32; 500]);
        assert_eq!(dst.len(), 500 + 500 - CROSSFADE);
        assert_eq!(dst[0], 1.0);
        assert!(dst[500 - CROSSFADE] < 1.0 && dst[500 - CROSSFADE] > 0.99);
        assert!(dst[499] < 0.01);
        assert_eq!(*dst.last().unwrap(), 0.0);
    }

    #[test]
    fn crossfade_into_empty_copies() {
        let mut dst = Vec::new();
        crossfade_append(&mut dst, &[0.5, 0.25]);
        assert_eq!(dst, vec![0.5, 0.25]);
    }

    #[test]
    fn missing_onnx_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        match find_onnx_file(dir.path()) {
            Err(KokoroError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
