//! # reading-aid
//!
//! Turns scanned documents or pasted text into simplified, spoken-aloud content for readers
//! with dyslexia.
//!
//! ## Stages
//!
//! - **Extraction**: OCR over `tesseract` + `pdftoppm` ([`extract`])
//! - **Simplification**: a seq2seq model with a rule-based fallback ([`simplify`], [`text::rules`])
//! - **Analysis**: Flesch-style reading level ([`text::reading_level`])
//! - **Speech**: the espeak-ng system voice or a neural voice with pitch-preserving rate
//!   control ([`engines`])
//!
//! [`pipeline::Pipeline`] chains the stages and degrades instead of failing where it can.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! reading-aid = { version = "2026.10", features = ["kokoro"] }
//! ```
//!
//! ```ignore
//! use reading_aid::{config::Config, pipeline::Pipeline};
//!
//! let mut pipeline = Pipeline::new(Config::default());
//! let report = pipeline.process_text("The cat sat on the mat. It was warm.")?;
//! println!("{:?} -> {:?}", report.original_level, report.audio_path);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audio;
pub mod config;
pub mod document;
pub mod engines;
pub mod extract;
pub mod outcome;
pub mod pipeline;
pub mod simplify;
pub mod text;

use std::path::Path;

use engines::{TtsConfig, TtsError, VoiceInfo};

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Raw mono audio samples
    pub samples: Vec<f32>,
    /// Native sample rate of the engine that produced them
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Write the audio to a mono 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Decode a WAV stream into mono f32 samples, averaging channels.
    pub fn read_wav<R: std::io::Read>(reader: R) -> Result<Self, hound::Error> {
        let mut wav = hound::WavReader::new(reader)?;
        let spec = wav.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => wav.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                wav.samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Common interface for text-to-speech synthesis engines.
///
/// Rate, volume and voice travel with each request in a [`TtsConfig`], so an engine can be
/// shared by requests with different settings.
pub trait SynthesisEngine {
    /// Short engine name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Voices selectable through [`TtsConfig::voice_id`].
    fn list_voices(&self) -> Result<Vec<VoiceInfo>, TtsError>;

    /// Synthesize speech from the given text.
    fn synthesize(&mut self, text: &str, config: &TtsConfig) -> Result<SynthesisResult, TtsError>;

    /// Synthesize speech from the given text and write it to a WAV file.
    ///
    /// Default implementation calls `synthesize()` then `SynthesisResult::write_wav()`.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        wav_path: &Path,
        config: &TtsConfig,
    ) -> Result<SynthesisResult, TtsError> {
        let result = self.synthesize(text, config)?;
        result.write_wav(wav_path)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_round_trip_keeps_samples_and_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let result = SynthesisResult {
            samples: vec![0.0, 0.25, -0.5, 1.0],
            sample_rate: 24_000,
        };
        result.write_wav(&path).unwrap();

        let read = SynthesisResult::read_wav(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(read, result);
    }

    #[test]
    fn reads_16_bit_stereo_as_mono() {
        let mut bytes = std::io::Cursor::new(Vec::new());
        {
            let spec = hound::WavSpec {
                channels: 2,
                sample_rate: 22_050,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::new(&mut bytes, spec).unwrap();
            for s in [16_384i16, 0, -16_384, -16_384] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        bytes.set_position(0);

        let read = SynthesisResult::read_wav(bytes).unwrap();
        assert_eq!(read.sample_rate, 22_050);
        assert_eq!(read.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn duration() {
        let result = SynthesisResult {
            samples: vec![0.0; 12_000],
            sample_rate: 24_000,
        };
        assert_eq!(result.duration_secs(), 0.5);
    }
}
