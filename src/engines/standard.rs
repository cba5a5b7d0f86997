//! Standard voice: the espeak-ng system synthesizer.
//!
//! Construction never fails. If the binary cannot be probed the engine is left disabled and
//! every later operation reports [`TtsError::NoEngineAvailable`].

use crate::config::TtsSettings;
use crate::{SynthesisEngine, SynthesisResult};

use super::espeak::EspeakConfig;
use super::{TtsConfig, TtsError, VoiceInfo, MAX_RATE_WPM, MIN_RATE_WPM, NATIVE_RATE_WPM};

/// espeak-ng voice variants selectable by `voice_id`, in the same order as the natural
/// speakers so an id means the same kind of voice on both engines.
pub const VOICE_VARIANTS: &[(&str, &str, &str)] = &[
    ("en-us+m3", "en-us", "male"),
    ("en-us+f3", "en-us", "female"),
    ("en-gb+m3", "en-gb", "male"),
    ("en-gb+f3", "en-gb", "female"),
];

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Ready { version: String },
    Disabled { reason: String },
}

pub struct StandardEngine {
    espeak: EspeakConfig,
    status: Status,
    rate: u32,
    volume: f32,
    voice_id: usize,
}

impl StandardEngine {
    /// Probe the espeak-ng binary and build an engine, disabled if the probe fails.
    pub fn new(espeak: EspeakConfig) -> Self {
        let status = match espeak.version() {
            Ok(version) => {
                log::info!("Standard voice ready: {version}");
                Status::Ready { version }
            }
            Err(e) => {
                log::warn!("Standard voice disabled: {e}");
                Status::Disabled {
                    reason: e.to_string(),
                }
            }
        };
        Self {
            espeak,
            status,
            rate: NATIVE_RATE_WPM,
            volume: 1.0,
            voice_id: 0,
        }
    }

    pub fn from_settings(settings: &TtsSettings) -> Self {
        let mut engine = Self::new(EspeakConfig::from_settings(settings));
        engine.rate = settings.default_rate;
        engine.volume = settings.default_volume;
        engine
    }

    pub fn is_available(&self) -> bool {
        matches!(self.status, Status::Ready { .. })
    }

    /// espeak-ng version banner, when available.
    pub fn version(&self) -> Option<&str> {
        match &self.status {
            Status::Ready { version } => Some(version),
            Status::Disabled { .. } => None,
        }
    }

    fn ensure_ready(&self) -> Result<(), TtsError> {
        match &self.status {
            Status::Ready { .. } => Ok(()),
            Status::Disabled { reason } => Err(TtsError::NoEngineAvailable(reason.clone())),
        }
    }

    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate.clamp(MIN_RATE_WPM, MAX_RATE_WPM);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() {
            1.0
        } else {
            volume.clamp(0.0, 1.0)
        };
    }

    pub fn set_voice(&mut self, voice_id: usize) {
        self.voice_id = voice_id;
    }

    /// Settings last given to the setters, as used by [`StandardEngine::speak`].
    pub fn current_config(&self) -> TtsConfig {
        TtsConfig {
            rate: self.rate,
            volume: self.volume,
            voice_id: self.voice_id,
            engine: super::EngineKind::Standard,
        }
    }

    /// Speak `text` through the default audio device, blocking until playback ends.
    pub fn speak(&self, text: &str) -> Result<(), TtsError> {
        self.ensure_ready()?;
        let args = voice_args(&self.current_config());
        let mut argv: Vec<&str> = args.iter().map(String::as_str).collect();
        argv.push("--stdin");
        self.espeak.run(&argv, Some(text))?;
        Ok(())
    }

    /// Every language voice espeak-ng has installed.
    pub fn installed_voices(&self) -> Result<Vec<VoiceInfo>, TtsError> {
        self.ensure_ready()?;
        let out = self.espeak.run(&["--voices"], None)?;
        Ok(parse_voice_list(&String::from_utf8_lossy(&out)))
    }
}

impl SynthesisEngine for StandardEngine {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn list_voices(&self) -> Result<Vec<VoiceInfo>, TtsError> {
        self.ensure_ready()?;
        Ok(VOICE_VARIANTS
            .iter()
            .enumerate()
            .map(|(id, (name, lang, gender))| VoiceInfo {
                id,
                name: name.to_string(),
                language: Some(lang.to_string()),
                gender: Some(gender.to_string()),
            })
            .collect())
    }

    fn synthesize(&mut self, text: &str, config: &TtsConfig) -> Result<SynthesisResult, TtsError> {
        self.ensure_ready()?;

        // espeak-ng cannot seek on stdout, so its streamed WAV header has no usable length.
        let wav = tempfile::Builder::new()
            .prefix("espeak-")
            .suffix(".wav")
            .tempfile()?;
        let wav_path = wav.path().to_string_lossy().into_owned();

        let args = voice_args(config);
        let mut argv: Vec<&str> = args.iter().map(String::as_str).collect();
        argv.extend(["-w", wav_path.as_str(), "--stdin"]);
        self.espeak.run(&argv, Some(text))?;

        let result = SynthesisResult::read_wav(std::fs::File::open(wav.path())?)?;
        log::debug!(
            "Standard voice produced {:.2}s at {} Hz",
            result.duration_secs(),
            result.sample_rate
        );
        Ok(result)
    }
}

fn variant(voice_id: usize) -> &'static str {
    match VOICE_VARIANTS.get(voice_id) {
        Some(&(name, _, _)) => name,
        None => {
            log::warn!("Unknown standard voice id {voice_id}, using voice 0");
            VOICE_VARIANTS[0].0
        }
    }
}

/// espeak-ng flags for rate (`-s`, WPM), amplitude (`-a`, 0-200 with 100 normal) and voice.
fn voice_args(config: &TtsConfig) -> Vec<String> {
    let config = config.clamped();
    let amplitude = (config.volume * 100.0).round() as u32;
    vec![
        "-s".to_string(),
        config.rate.to_string(),
        "-a".to_string(),
        amplitude.to_string(),
        "-v".to_string(),
        variant(config.voice_id).to_string(),
    ]
}

/// Parse the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-gb           --/M      English_(Great_Britain) gmw/en
/// ```
fn parse_voice_list(table: &str) -> Vec<VoiceInfo> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let gender = match cols[2].rsplit('/').next() {
                Some("M") => Some("male".to_string()),
                Some("F") => Some("female".to_string()),
                _ => None,
            };
            Some((cols[1], cols[3], gender))
        })
        .enumerate()
        .map(|(id, (lang, name, gender))| VoiceInfo {
            id,
            name: name.replace('_', " "),
            language: Some(lang.to_string()),
            gender,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::EngineKind;
    use std::path::PathBuf;

    fn disabled() -> StandardEngine {
        StandardEngine::new(EspeakConfig {
            bin_path: Some(PathBuf::from("/nonexistent/espeak-ng")),
            data_path: None,
        })
    }

    fn espeak_available() -> bool {
        std::process::Command::new("espeak-ng")
            .arg("--version")
            .output()
            .is_ok()
    }

    #[test]
    fn missing_binary_leaves_engine_disabled() {
        let mut engine = disabled();
        assert!(!engine.is_available());
        assert!(engine.version().is_none());

        assert!(matches!(
            engine.synthesize("Hello", &TtsConfig::default()),
            Err(TtsError::NoEngineAvailable(_))
        ));
        assert!(matches!(engine.speak("Hello"), Err(TtsError::NoEngineAvailable(_))));
        assert!(matches!(engine.list_voices(), Err(TtsError::NoEngineAvailable(_))));
        assert!(matches!(
            engine.installed_voices(),
            Err(TtsError::NoEngineAvailable(_))
        ));
    }

    #[test]
    fn setters_clamp_into_supported_range() {
        let mut engine = disabled();
        engine.set_rate(1_000);
        engine.set_volume(-3.0);
        engine.set_voice(1);
        assert_eq!(
            engine.current_config(),
            TtsConfig {
                rate: MAX_RATE_WPM,
                volume: 0.0,
                voice_id: 1,
                engine: EngineKind::Standard,
            }
        );
    }

    #[test]
    fn voice_args_map_rate_volume_and_voice() {
        let config = TtsConfig {
            rate: 200,
            volume: 0.5,
            voice_id: 1,
            engine: EngineKind::Standard,
        };
        assert_eq!(voice_args(&config), ["-s", "200", "-a", "50", "-v", "en-us+f3"]);
    }

    #[test]
    fn voice_zero_is_male_and_one_is_female() {
        assert_eq!(VOICE_VARIANTS[0].2, "male");
        assert_eq!(VOICE_VARIANTS[1].2, "female");
    }

    #[test]
    fn unknown_voice_id_uses_first_variant() {
        assert_eq!(variant(42), "en-us+m3");
    }

    #[test]
    fn parses_voice_table() {
        let table = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-gb           --/F      English_(Great_Britain) gmw/en
 5  eo              --/-      Esperanto          art/eo
";
        let voices = parse_voice_list(table);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0].language.as_deref(), Some("af"));
        assert_eq!(voices[0].gender.as_deref(), Some("male"));
        assert_eq!(voices[1].name, "English (Great Britain)");
        assert_eq!(voices[1].gender.as_deref(), Some("female"));
        assert_eq!(voices[2].gender, None);
        assert_eq!(voices[2].id, 2);
    }

    #[test]
    fn synthesizes_wav_with_espeak() {
        // Skip when espeak-ng is unavailable in the execution environment.
        if !espeak_available() {
            return;
        }
        let mut engine = StandardEngine::new(EspeakConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.wav");

        let result = engine
            .synthesize_to_file("Hello there.", &path, &TtsConfig::default())
            .expect("espeak should succeed");
        assert!(result.sample_rate > 0);
        assert!(result.duration_secs() > 0.1);
        assert!(path.exists());
    }

    #[test]
    fn faster_rate_gives_shorter_audio() {
        if !espeak_available() {
            return;
        }
        let mut engine = StandardEngine::new(EspeakConfig::default());
        let text = "Reading is easier when the words come at a comfortable pace.";
        let slow = engine
            .synthesize(text, &TtsConfig { rate: 100, ..Default::default() })
            .unwrap();
        let fast = engine
            .synthesize(text, &TtsConfig { rate: 250, ..Default::default() })
            .unwrap();
        assert!(fast.duration_secs() < slow.duration_secs());
    }
}
