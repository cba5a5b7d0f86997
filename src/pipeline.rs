//! Extraction -> simplification -> reading level -> speech.
//!
//! Extraction failures are returned to the caller. Simplification and natural-voice failures
//! are absorbed: the stage falls back (rules, standard voice), logs a warning and records a
//! [`DegradationEvent`] in the [`PipelineReport`].
//!
//! Speech output is content-addressed (`speech-<hash>.wav`). The last request and its file
//! are remembered so re-submitting identical text and settings does not synthesize again.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::document::{Document, DocumentKind};
use crate::engines::natural::NaturalEngine;
use crate::engines::standard::StandardEngine;
use crate::engines::{EngineKind, TtsConfig, TtsError, VoiceInfo};
use crate::extract::{ExtractError, ExtractedText, TesseractExtractor, TextExtractor};
use crate::outcome::Outcome;
use crate::simplify::{self, AiSimplifier, SimplificationRequest, SimplifierModel};
use crate::text::{ReadingComparison, ReadingLevel, TextStats};
use crate::SynthesisEngine;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Tts(#[from] TtsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("The {0} stage is disabled in the configuration")]
    StageDisabled(&'static str),
    #[error("There is no text to speak")]
    NothingToSpeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extraction,
    Simplification,
    Analysis,
    Synthesis,
}

/// A stage that completed with a fallback instead of its preferred path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationEvent {
    pub stage: Stage,
    pub reason: String,
}

/// A synthesized audio file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechOutput {
    pub path: PathBuf,
    /// The request as clamped and submitted.
    pub config: TtsConfig,
    /// Engine that actually produced the audio.
    pub engine: EngineKind,
    pub duration_secs: f64,
    /// True when an identical earlier request's file was returned.
    pub reused: bool,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub extracted_text: String,
    pub pages: usize,
    pub simplified_text: Option<String>,
    pub original_level: Option<ReadingLevel>,
    pub simplified_level: Option<ReadingLevel>,
    pub stats: Option<TextStats>,
    pub audio: Option<SpeechOutput>,
    pub events: Vec<DegradationEvent>,
}

impl PipelineReport {
    pub fn is_degraded(&self) -> bool {
        !self.events.is_empty()
    }

    /// Simplified text if simplification ran, otherwise the extracted text.
    pub fn final_text(&self) -> &str {
        self.simplified_text
            .as_deref()
            .unwrap_or(&self.extracted_text)
    }

    fn record<T>(&mut self, stage: Stage, outcome: Outcome<T>) -> T {
        if let Some(reason) = outcome.reason() {
            self.events.push(DegradationEvent {
                stage,
                reason: reason.to_string(),
            });
        }
        outcome.into_value()
    }
}

struct SpeechMemo {
    text: String,
    output: SpeechOutput,
    /// Set when the remembered file came from a fallback.
    degraded: Option<String>,
}

pub struct Pipeline {
    config: Config,
    extractor: Box<dyn TextExtractor>,
    simplifier: AiSimplifier,
    standard: Box<dyn SynthesisEngine>,
    natural: Box<dyn SynthesisEngine>,
    extracted: Option<ExtractedText>,
    simplified: Option<String>,
    last_speech: Option<SpeechMemo>,
}

impl Pipeline {
    /// Pipeline with the tesseract extractor, the configured simplification models and both
    /// voices. Nothing is loaded until first use.
    pub fn new(config: Config) -> Self {
        let extractor = Box::new(TesseractExtractor::new(&config.ocr));
        let simplifier = AiSimplifier::new(
            simplify::default_loader(&config.simplification),
            &config.simplification,
        );
        let standard = Box::new(StandardEngine::from_settings(&config.tts));
        let natural = Box::new(NaturalEngine::from_settings(&config.tts));
        Self::with_parts(config, extractor, simplifier, standard, natural)
    }

    pub fn with_parts(
        config: Config,
        extractor: Box<dyn TextExtractor>,
        simplifier: AiSimplifier,
        standard: Box<dyn SynthesisEngine>,
        natural: Box<dyn SynthesisEngine>,
    ) -> Self {
        Self {
            config,
            extractor,
            simplifier,
            standard,
            natural,
            extracted: None,
            simplified: None,
            last_speech: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Text from the last extraction.
    pub fn extracted(&self) -> Option<&ExtractedText> {
        self.extracted.as_ref()
    }

    /// Text from the last simplification.
    pub fn simplified(&self) -> Option<&str> {
        self.simplified.as_deref()
    }

    /// Build a request from the configured defaults, overriding what is given.
    pub fn tts_request(
        &self,
        rate: Option<u32>,
        volume: Option<f32>,
        voice_id: Option<usize>,
        engine: Option<EngineKind>,
    ) -> TtsConfig {
        self.config.tts.request(rate, volume, voice_id, engine)
    }

    /// Extract the document's text. A new document clears the previous session.
    pub fn extract(&mut self, document: &Document) -> Result<&ExtractedText, PipelineError> {
        if document.kind != DocumentKind::PlainText && !self.config.features.enable_ocr {
            return Err(PipelineError::StageDisabled("ocr"));
        }
        let extracted = self.extractor.extract(document)?;
        self.simplified = None;
        Ok(self.extracted.insert(extracted))
    }

    /// Simplify `text` with `model` (the configured default when `None`).
    ///
    /// Returns the text unchanged when simplification is disabled.
    pub fn simplify(&mut self, text: &str, model: Option<SimplifierModel>) -> Outcome<String> {
        if !self.config.features.enable_simplification {
            return Outcome::Success(text.to_string());
        }
        let model = model.unwrap_or(self.config.simplification.default_model);
        let request = SimplificationRequest::new(text, model, &self.config.simplification);
        let outcome = self.simplifier.simplify(&request);
        if let Some(reason) = outcome.reason() {
            log::warn!("Simplification degraded: {reason}");
        }
        self.simplified = Some(outcome.value().clone());
        outcome
    }

    /// Synthesize `text` into the output directory.
    ///
    /// A natural-voice request that fails is retried with the standard voice and reported
    /// as degraded. An identical repeat of the last request returns the existing file.
    pub fn speak(
        &mut self,
        text: &str,
        request: TtsConfig,
    ) -> Result<Outcome<SpeechOutput>, PipelineError> {
        if !self.config.features.enable_tts {
            return Err(PipelineError::StageDisabled("tts"));
        }
        if text.trim().is_empty() {
            return Err(PipelineError::NothingToSpeak);
        }
        let tts = &self.config.tts;
        let config = request.clamped_to(tts.min_rate, tts.max_rate, tts.min_volume, tts.max_volume);

        if let Some(memo) = &self.last_speech {
            if memo.text == text && memo.output.config == config && memo.output.path.exists() {
                log::info!(
                    "Speech settings unchanged, reusing {}",
                    memo.output.path.display()
                );
                let output = SpeechOutput {
                    reused: true,
                    ..memo.output.clone()
                };
                return Ok(match &memo.degraded {
                    Some(reason) => Outcome::degraded(output, reason.clone()),
                    None => Outcome::Success(output),
                });
            }
        }

        let dir = self.config.output_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(output_file_name(text, &config));

        let outcome = self.synthesize_with_fallback(text, &path, &config)?;
        log::info!(
            "Wrote {:.1}s of speech to {} ({} voice)",
            outcome.value().duration_secs,
            path.display(),
            outcome.value().engine
        );

        let previous = self.last_speech.replace(SpeechMemo {
            text: text.to_string(),
            output: outcome.value().clone(),
            degraded: outcome.reason().map(str::to_string),
        });
        if let Some(previous) = previous {
            remove_stale(&previous.output.path, &path);
        }
        Ok(outcome)
    }

    /// Speak the current session text again with new voice settings, without re-running
    /// extraction or simplification.
    pub fn resynthesize(&mut self, request: TtsConfig) -> Result<Outcome<SpeechOutput>, PipelineError> {
        let text = match (&self.simplified, &self.extracted) {
            (Some(simplified), _) => simplified.clone(),
            (None, Some(extracted)) => extracted.text.clone(),
            (None, None) => return Err(PipelineError::NothingToSpeak),
        };
        self.speak(&text, request)
    }

    fn synthesize_with_fallback(
        &mut self,
        text: &str,
        path: &Path,
        config: &TtsConfig,
    ) -> Result<Outcome<SpeechOutput>, PipelineError> {
        let output = |engine: EngineKind, duration_secs: f64| SpeechOutput {
            path: path.to_path_buf(),
            config: *config,
            engine,
            duration_secs,
            reused: false,
        };

        if config.engine == EngineKind::Natural {
            match self.natural.synthesize_to_file(text, path, config) {
                Ok(result) => {
                    return Ok(Outcome::Success(output(
                        EngineKind::Natural,
                        result.duration_secs(),
                    )))
                }
                Err(e) => {
                    log::warn!("Natural voice failed, falling back to the standard voice: {e}");
                    let result = self.standard.synthesize_to_file(text, path, config)?;
                    return Ok(Outcome::degraded(
                        output(EngineKind::Standard, result.duration_secs()),
                        format!("natural voice unavailable, used standard voice: {e}"),
                    ));
                }
            }
        }

        let result = self.standard.synthesize_to_file(text, path, config)?;
        Ok(Outcome::Success(output(
            EngineKind::Standard,
            result.duration_secs(),
        )))
    }

    /// Voices of the given engine.
    pub fn list_voices(&self, engine: EngineKind) -> Result<Vec<VoiceInfo>, TtsError> {
        match engine {
            EngineKind::Standard => self.standard.list_voices(),
            EngineKind::Natural => self.natural.list_voices(),
        }
    }

    /// Run every enabled stage over `document`, speaking the result with `tts`.
    pub fn run(&mut self, document: &Document, tts: TtsConfig) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::default();

        let extracted = self.extract(document)?.clone();
        report.extracted_text = extracted.text;
        report.pages = extracted.pages;

        if self.config.features.enable_simplification {
            let outcome = self.simplify(&report.extracted_text, None);
            report.simplified_text = Some(report.record(Stage::Simplification, outcome));
        }

        if self.config.features.enable_analysis {
            let comparison = ReadingComparison::new(&report.extracted_text, report.final_text());
            report.original_level = Some(comparison.original);
            report.simplified_level = report.simplified_text.as_ref().map(|_| comparison.simplified);
            report.stats = Some(crate::text::reading_level::stats(report.final_text()));
        }

        if self.config.features.enable_tts {
            let text = report.final_text().to_string();
            let outcome = self.speak(&text, tts)?;
            report.audio = Some(report.record(Stage::Synthesis, outcome));
        }

        Ok(report)
    }

    /// [`Pipeline::run`] over pasted text with the configured default voice settings.
    pub fn process_text(&mut self, text: &str) -> Result<PipelineReport, PipelineError> {
        let tts = self.tts_request(None, None, None, None);
        self.run(&Document::from_text(text), tts)
    }
}

/// `speech-<first 16 hex digits of sha256(text, settings)>.wav`.
fn output_file_name(text: &str, config: &TtsConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(config.rate.to_le_bytes());
    hasher.update(config.volume.to_bits().to_le_bytes());
    hasher.update((config.voice_id as u64).to_le_bytes());
    hasher.update(config.engine.as_str().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("speech-{hex}.wav")
}

/// Delete the previous output once a different file has replaced it.
fn remove_stale(previous: &Path, current: &Path) {
    if previous == current {
        return;
    }
    match std::fs::remove_file(previous) {
        Ok(()) => log::debug!("Removed previous output {}", previous.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {e}", previous.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimplificationConfig;
    use crate::simplify::{NoModelLoader, Seq2SeqLoader, Seq2SeqModel, SimplifyError};
    use crate::text::Complexity;
    use crate::SynthesisResult;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts synthesis calls; fails every call when `fail` is set.
    struct FakeEngine {
        calls: Rc<Cell<usize>>,
        fail: Option<fn() -> TtsError>,
    }

    impl FakeEngine {
        fn working() -> (Box<Self>, Rc<Cell<usize>>) {
            let calls = Rc::new(Cell::new(0));
            let engine = Box::new(Self {
                calls: Rc::clone(&calls),
                fail: None,
            });
            (engine, calls)
        }

        fn failing(error: fn() -> TtsError) -> (Box<Self>, Rc<Cell<usize>>) {
            let (mut engine, calls) = Self::working();
            engine.fail = Some(error);
            (engine, calls)
        }
    }

    impl SynthesisEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn list_voices(&self) -> Result<Vec<VoiceInfo>, TtsError> {
            Ok(Vec::new())
        }

        fn synthesize(&mut self, _text: &str, config: &TtsConfig) -> Result<SynthesisResult, TtsError> {
            self.calls.set(self.calls.get() + 1);
            if let Some(error) = self.fail {
                return Err(error());
            }
            Ok(SynthesisResult {
                samples: vec![0.1 * config.volume; 2_400],
                sample_rate: 24_000,
            })
        }
    }

    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn recognize(&self, _document: &Document) -> Result<ExtractedText, ExtractError> {
            Ok(ExtractedText::from_pages(&[self.0]))
        }
    }

    struct Unreadable;

    impl TextExtractor for Unreadable {
        fn recognize(&self, _document: &Document) -> Result<ExtractedText, ExtractError> {
            Err(ExtractError::ToolNotFound { tool: "tesseract" })
        }
    }

    struct ShortModel(Rc<Cell<usize>>);

    impl Seq2SeqModel for ShortModel {
        fn generate(&mut self, _input: &str, _max: usize, _beams: usize) -> Result<String, SimplifyError> {
            self.0.set(self.0.get() + 1);
            Ok("Short text.".to_string())
        }
    }

    struct ShortLoader(Rc<Cell<usize>>);

    impl Seq2SeqLoader for ShortLoader {
        fn load(&self, _model: SimplifierModel, _name: &str) -> Result<Box<dyn Seq2SeqModel>, SimplifyError> {
            Ok(Box::new(ShortModel(Rc::clone(&self.0))))
        }
    }

    struct Harness {
        pipeline: Pipeline,
        standard_calls: Rc<Cell<usize>>,
        natural_calls: Rc<Cell<usize>>,
        _dir: tempfile::TempDir,
    }

    fn config_in(dir: &Path) -> Config {
        Config {
            output_dir: Some(dir.join("out")),
            ..Default::default()
        }
    }

    fn harness_with(
        extractor: Box<dyn TextExtractor>,
        loader: Box<dyn Seq2SeqLoader>,
        natural_error: Option<fn() -> TtsError>,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let (standard, standard_calls) = FakeEngine::working();
        let (natural, natural_calls) = match natural_error {
            Some(error) => FakeEngine::failing(error),
            None => FakeEngine::working(),
        };
        let simplifier = AiSimplifier::new(loader, &SimplificationConfig::default());
        Harness {
            pipeline: Pipeline::with_parts(config, extractor, simplifier, standard, natural),
            standard_calls,
            natural_calls,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        harness_with(Box::new(FixedText("unused")), Box::new(NoModelLoader), None)
    }

    fn natural(rate: u32) -> TtsConfig {
        TtsConfig {
            rate,
            engine: EngineKind::Natural,
            ..Default::default()
        }
    }

    fn model_unavailable() -> TtsError {
        TtsError::Natural(crate::engines::natural::NaturalError::ModelUnavailable(
            "no weights".to_string(),
        ))
    }

    #[test]
    fn easy_text_end_to_end() {
        let mut h = harness();
        let report = h
            .pipeline
            .process_text("The cat sat on the mat. It was warm.")
            .unwrap();

        let level = report.original_level.unwrap();
        assert_eq!(level.complexity, Complexity::Easy);
        assert!(level.level <= 6.0);
        assert_eq!(report.pages, 1);

        // No model is compiled in, so rules simplified the text.
        assert_eq!(report.final_text(), "The cat sat on the mat. It was warm.");
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].stage, Stage::Simplification);

        let audio = report.audio.unwrap();
        assert!(audio.path.exists());
        assert_eq!(audio.engine, EngineKind::Standard);
        assert_eq!(h.standard_calls.get(), 1);
    }

    #[test]
    fn identical_request_does_not_synthesize_again() {
        let mut h = harness();
        let first = h.pipeline.speak("Hello there.", natural(150)).unwrap();
        let second = h.pipeline.speak("Hello there.", natural(150)).unwrap();

        assert_eq!(h.natural_calls.get(), 1);
        assert!(!first.value().reused);
        assert!(second.value().reused);
        assert_eq!(first.value().path, second.value().path);
    }

    #[test]
    fn changed_settings_replace_previous_file() {
        let mut h = harness();
        let first = h.pipeline.speak("Hello there.", natural(150)).unwrap().into_value();
        let second = h.pipeline.speak("Hello there.", natural(200)).unwrap().into_value();

        assert_eq!(h.natural_calls.get(), 2);
        assert_ne!(first.path, second.path);
        assert!(!first.path.exists());
        assert!(second.path.exists());
    }

    #[test]
    fn deleted_output_is_synthesized_again() {
        let mut h = harness();
        let first = h.pipeline.speak("Hello.", TtsConfig::default()).unwrap().into_value();
        std::fs::remove_file(&first.path).unwrap();

        let again = h.pipeline.speak("Hello.", TtsConfig::default()).unwrap().into_value();
        assert_eq!(h.standard_calls.get(), 2);
        assert!(!again.reused);
        assert!(again.path.exists());
    }

    #[test]
    fn natural_failure_falls_back_to_standard() {
        let mut h = harness_with(
            Box::new(FixedText("unused")),
            Box::new(NoModelLoader),
            Some(model_unavailable),
        );
        let outcome = h.pipeline.speak("Hello there.", natural(180)).unwrap();

        assert!(outcome.is_degraded());
        assert!(outcome.reason().unwrap().contains("no weights"));
        let output = outcome.value();
        assert_eq!(output.engine, EngineKind::Standard);
        assert_eq!(output.config.engine, EngineKind::Natural);
        assert!(output.path.exists());
        assert_eq!(h.natural_calls.get(), 1);
        assert_eq!(h.standard_calls.get(), 1);

        let written = SynthesisResult::read_wav(std::fs::File::open(&output.path).unwrap()).unwrap();
        assert_eq!(written.samples.len(), 2_400);
    }

    #[test]
    fn reused_fallback_output_stays_degraded() {
        let mut h = harness_with(
            Box::new(FixedText("unused")),
            Box::new(NoModelLoader),
            Some(model_unavailable),
        );
        let first = h.pipeline.speak("Hello there.", natural(180)).unwrap();
        let again = h.pipeline.speak("Hello there.", natural(180)).unwrap();

        assert!(again.is_degraded());
        assert_eq!(again.reason(), first.reason());
        assert!(again.value().reused);
        assert_eq!(again.value().engine, EngineKind::Standard);
        assert_eq!(h.natural_calls.get(), 1);
        assert_eq!(h.standard_calls.get(), 1);
    }

    #[test]
    fn natural_fallback_is_reported() {
        let mut h = harness_with(
            Box::new(FixedText("unused")),
            Box::new(NoModelLoader),
            Some(model_unavailable),
        );
        let report = h
            .pipeline
            .run(&Document::from_text("Short words here."), natural(150))
            .unwrap();
        assert!(report
            .events
            .iter()
            .any(|e| e.stage == Stage::Synthesis && e.reason.contains("standard voice")));
        assert!(report.audio.unwrap().path.exists());
    }

    #[test]
    fn no_engine_available_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let (standard, _) = FakeEngine::failing(|| {
            TtsError::NoEngineAvailable("espeak-ng not found".to_string())
        });
        let (natural_engine, _) = FakeEngine::failing(model_unavailable);
        let mut pipeline = Pipeline::with_parts(
            config_in(dir.path()),
            Box::new(FixedText("unused")),
            AiSimplifier::new(Box::new(NoModelLoader), &SimplificationConfig::default()),
            standard,
            natural_engine,
        );

        let err = pipeline.speak("Hello.", natural(150)).unwrap_err();
        assert!(matches!(err, PipelineError::Tts(TtsError::NoEngineAvailable(_))));
    }

    #[test]
    fn extraction_failure_halts_the_pipeline() {
        let mut h = harness_with(Box::new(Unreadable), Box::new(NoModelLoader), None);
        let scan = Document::from_bytes(b"%PDF-1.7 scan".to_vec(), Some("pdf")).unwrap();

        let err = h.pipeline.run(&scan, TtsConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Extract(ExtractError::ToolNotFound { .. })
        ));
        assert_eq!(h.standard_calls.get(), 0);
    }

    #[test]
    fn scanned_pages_are_extracted_then_simplified() {
        let calls = Rc::new(Cell::new(0));
        let mut h = harness_with(
            Box::new(FixedText("A   long\nscanned   page.")),
            Box::new(ShortLoader(Rc::clone(&calls))),
            None,
        );
        let scan = Document::from_bytes(b"%PDF-1.7 scan".to_vec(), Some("pdf")).unwrap();
        let report = h.pipeline.run(&scan, TtsConfig::default()).unwrap();

        assert_eq!(report.extracted_text, "A long scanned page.");
        assert_eq!(report.simplified_text.as_deref(), Some("Short text."));
        assert!(!report.is_degraded());
        assert!(report.simplified_level.is_some());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn resynthesis_reuses_simplified_text() {
        let calls = Rc::new(Cell::new(0));
        let mut h = harness_with(
            Box::new(FixedText("unused")),
            Box::new(ShortLoader(Rc::clone(&calls))),
            None,
        );
        h.pipeline
            .process_text("Some text that the model will shorten.")
            .unwrap();
        let outcome = h.pipeline.resynthesize(natural(250)).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(h.pipeline.simplified(), Some("Short text."));
        assert_eq!(outcome.value().config.rate, 250);
        assert_eq!(h.natural_calls.get(), 1);
    }

    #[test]
    fn resynthesis_without_text_fails() {
        let mut h = harness();
        assert!(matches!(
            h.pipeline.resynthesize(TtsConfig::default()),
            Err(PipelineError::NothingToSpeak)
        ));
        assert!(matches!(
            h.pipeline.speak("   ", TtsConfig::default()),
            Err(PipelineError::NothingToSpeak)
        ));
    }

    #[test]
    fn disabled_stages_are_skipped() {
        let mut h = harness();
        h.pipeline.config.features.enable_simplification = false;
        h.pipeline.config.features.enable_tts = false;
        h.pipeline.config.features.enable_analysis = false;

        let report = h.pipeline.process_text("Just read this.").unwrap();
        assert!(report.simplified_text.is_none());
        assert!(report.original_level.is_none());
        assert!(report.audio.is_none());
        assert_eq!(h.standard_calls.get(), 0);
    }

    #[test]
    fn disabled_ocr_still_accepts_plain_text() {
        let mut h = harness();
        h.pipeline.config.features.enable_ocr = false;

        assert!(h.pipeline.extract(&Document::from_text("Typed text.")).is_ok());
        let scan = Document::from_bytes(b"%PDF-1.7".to_vec(), Some("pdf")).unwrap();
        assert!(matches!(
            h.pipeline.extract(&scan),
            Err(PipelineError::StageDisabled("ocr"))
        ));
    }

    #[test]
    fn requests_are_clamped_to_configured_bounds() {
        let mut h = harness();
        let output = h
            .pipeline
            .speak("Hello.", TtsConfig { rate: 900, volume: 2.0, ..Default::default() })
            .unwrap()
            .into_value();
        assert_eq!(output.config.rate, 300);
        assert_eq!(output.config.volume, 1.0);
    }

    #[test]
    fn output_names_depend_on_text_and_settings() {
        let base = TtsConfig::default();
        let name = output_file_name("Hello.", &base);
        assert!(name.starts_with("speech-") && name.ends_with(".wav"));
        assert_eq!(name.len(), "speech-".len() + 16 + ".wav".len());
        assert_eq!(name, output_file_name("Hello.", &base));
        assert_ne!(name, output_file_name("Hello!", &base));
        assert_ne!(name, output_file_name("Hello.", &TtsConfig { voice_id: 1, ..base }));
    }
}
