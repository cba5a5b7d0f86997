use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use super::{NaturalError, NeuralVoice, VoiceModelLoader};

/// A loaded voice model shared by every engine that uses the same cache.
pub type SharedVoice = Arc<Mutex<Box<dyn NeuralVoice>>>;

struct CachedVoice {
    source: String,
    voice: SharedVoice,
}

/// Holds at most one loaded neural voice model for the lifetime of the cache.
///
/// The first successful load wins. A failed load leaves the cache empty so a later call can
/// retry. Concurrent first use blocks on the initializing call instead of loading twice.
/// The cache does not distinguish models: a loader for a different model directory gets the
/// model that is already loaded.
pub struct ModelCache {
    slot: OnceCell<CachedVoice>,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelCache {
    pub const fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    /// The process-wide cache.
    pub fn global() -> &'static ModelCache {
        static GLOBAL: ModelCache = ModelCache::new();
        &GLOBAL
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Where the cached model was loaded from, if one is loaded.
    pub fn source(&self) -> Option<&str> {
        self.slot.get().map(|c| c.source.as_str())
    }

    /// Return the cached model, loading it with `loader` on first use.
    pub fn get_or_load(&self, loader: &dyn VoiceModelLoader) -> Result<SharedVoice, NaturalError> {
        let source = loader.describe();
        let cached = self.slot.get_or_try_init(|| {
            log::info!("Loading natural voice model from {source}");
            let voice = loader.load()?;
            log::info!("Natural voice model ready ({} Hz)", voice.sample_rate());
            Ok::<_, NaturalError>(CachedVoice {
                source: source.clone(),
                voice: Arc::new(Mutex::new(voice)),
            })
        })?;

        if cached.source != source {
            log::info!(
                "Natural voice model already loaded from {}, ignoring {source}",
                cached.source
            );
        }
        Ok(Arc::clone(&cached.voice))
    }
}
