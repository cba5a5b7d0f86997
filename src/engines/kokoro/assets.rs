//! Voice styles and phoneme vocabulary shipped next to the Kokoro graph.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::KokoroError;

/// Length of one style vector.
pub const STYLE_DIM: usize = 256;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Style vectors per voice. Row `i` is tuned for a phoneme sequence of length `i`.
pub struct VoiceStore {
    voices: HashMap<String, Vec<[f32; STYLE_DIM]>>,
}

impl VoiceStore {
    /// Read every `<voice>.npy` entry of an `.npz` archive.
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        let file = File::open(path).map_err(|e| {
            KokoroError::VoiceParse(format!("cannot open {}: {e}", path.display()))
        })?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| KokoroError::VoiceParse(format!("{}: {e}", path.display())))?;

        let mut voices = HashMap::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| KokoroError::VoiceParse(format!("zip entry {i}: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            let Some(voice) = entry_name.strip_suffix(".npy") else {
                continue;
            };
            let voice = voice.rsplit('/').next().unwrap_or(voice).to_string();

            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            voices.insert(voice, parse_styles(&bytes, &entry_name)?);
        }

        log::info!("Loaded {} Kokoro voices", voices.len());
        Ok(Self { voices })
    }

    /// Style row for `voice` matching a sequence of `phonemes` tokens, clamped to the last row.
    pub fn style(&self, voice: &str, phonemes: usize) -> Result<[f32; STYLE_DIM], KokoroError> {
        let rows = self
            .voices
            .get(voice)
            .filter(|rows| !rows.is_empty())
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))?;
        Ok(rows[phonemes.min(rows.len() - 1)])
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.voices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Decode a little-endian float32 `.npy` array of shape `[N, 256]` (any leading 1-dims).
fn parse_styles(bytes: &[u8], name: &str) -> Result<Vec<[f32; STYLE_DIM]>, KokoroError> {
    let bad = |msg: String| KokoroError::VoiceParse(format!("{name}: {msg}"));

    if bytes.len() < 10 || !bytes.starts_with(NPY_MAGIC) {
        return Err(bad("not a numpy array".to_string()));
    }
    // v1 headers store a u16 length at offset 8, v2/v3 a u32.
    let (header_len, prelude) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        _ if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        _ => return Err(bad("truncated header".to_string())),
    };
    let data = bytes
        .get(prelude + header_len..)
        .ok_or_else(|| bad(format!("header of {header_len} bytes is truncated")))?;

    let row_bytes = STYLE_DIM * 4;
    if data.len() % row_bytes != 0 {
        return Err(bad(format!(
            "{} data bytes is not a whole number of {STYLE_DIM}-float rows",
            data.len()
        )));
    }

    Ok(data
        .chunks_exact(row_bytes)
        .map(|row| {
            let mut style = [0f32; STYLE_DIM];
            for (value, raw) in style.iter_mut().zip(row.chunks_exact(4)) {
                *value = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            }
            style
        })
        .collect())
}

/// Read the `"vocab"` object (`{"ə": 83, ...}`) of a Kokoro `config.json`.
pub fn load_vocab(config_path: &Path) -> Result<HashMap<char, i64>, KokoroError> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        KokoroError::Config(format!("cannot read {}: {e}", config_path.display()))
    })?;
    parse_vocab(&content)
}

fn parse_vocab(json: &str) -> Result<HashMap<char, i64>, KokoroError> {
    let root: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| KokoroError::Config(format!("Failed to parse JSON: {e}")))?;
    let entries = root
        .get("vocab")
        .and_then(|v| v.as_object())
        .ok_or_else(|| KokoroError::Config("missing 'vocab' object".to_string()))?;

    entries
        .iter()
        .map(|(symbol, id)| {
            let mut chars = symbol.chars();
            match (chars.next(), chars.next(), id.as_i64()) {
                (Some(ch), None, Some(id)) => Ok((ch, id)),
                _ => Err(KokoroError::Config(format!(
                    "vocab entry {symbol:?} => {id} is not a single character with an integer id"
                ))),
            }
        })
        .collect()
}
