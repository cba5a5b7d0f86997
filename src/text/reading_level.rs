use serde::Serialize;

/// Grade level at or below which text counts as easy.
pub const EASY_MAX_LEVEL: f64 = 6.0;
/// Grade level at or below which text counts as moderate.
pub const MODERATE_MAX_LEVEL: f64 = 9.0;

/// Three-valued complexity classification derived from the grade level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Easy,
    Moderate,
    Difficult,
}

impl Complexity {
    fn from_level(level: f64) -> Self {
        if level <= EASY_MAX_LEVEL {
            Complexity::Easy
        } else if level <= MODERATE_MAX_LEVEL {
            Complexity::Moderate
        } else {
            Complexity::Difficult
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Easy => "easy",
            Complexity::Moderate => "moderate",
            Complexity::Difficult => "difficult",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approximate grade level of a text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadingLevel {
    pub level: f32,
    pub complexity: Complexity,
}

impl Default for ReadingLevel {
    fn default() -> Self {
        Self {
            level: 0.0,
            complexity: Complexity::Easy,
        }
    }
}

/// Word and sentence counts as shown next to a reading level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextStats {
    pub words: usize,
    pub sentences: usize,
    pub avg_words_per_sentence: f32,
}

/// Reading levels of an original text and its simplification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadingComparison {
    pub original: ReadingLevel,
    pub simplified: ReadingLevel,
}

impl ReadingComparison {
    pub fn new(original: &str, simplified: &str) -> Self {
        Self {
            original: estimate(original),
            simplified: estimate(simplified),
        }
    }

    /// How many grade levels the simplification removed. Negative if it got harder.
    pub fn reduction(&self) -> f32 {
        self.original.level - self.simplified.level
    }
}

/// Estimate the grade level of `text`.
///
/// This is a Flesch-Kincaid style approximation that uses average word length in
/// place of syllable counts:
///
/// ```text
/// 0.39 * words_per_sentence + 11.8 * (chars_per_word / 6) - 15.59
/// ```
///
/// Sentences are the non-blank pieces between literal periods. Text with no words or no
/// sentences scores 0 (easy). The band is decided on the unrounded score; only the reported
/// `level` is rounded to two decimals.
pub fn estimate(text: &str) -> ReadingLevel {
    let words: Vec<&str> = text.split_whitespace().collect();
    let sentences = count_sentences(text);

    if words.is_empty() || sentences == 0 {
        return ReadingLevel::default();
    }

    let word_count = words.len() as f64;
    let total_chars: usize = words.iter().map(|w| w.chars().count()).sum();

    let avg_sentence_len = word_count / sentences as f64;
    let avg_word_len = total_chars as f64 / word_count;

    let raw = (0.39 * avg_sentence_len + 11.8 * (avg_word_len / 6.0) - 15.59).max(0.0);

    ReadingLevel {
        level: round2(raw) as f32,
        complexity: Complexity::from_level(raw),
    }
}

/// Word and sentence statistics using the same counting rules as [`estimate`].
pub fn stats(text: &str) -> TextStats {
    let words = text.split_whitespace().count();
    let sentences = count_sentences(text);
    let avg_words_per_sentence = round2(words as f64 / sentences.max(1) as f64) as f32;
    TextStats {
        words,
        sentences,
        avg_words_per_sentence,
    }
}

fn count_sentences(text: &str) -> usize {
    text.split('.').filter(|s| !s.trim().is_empty()).count()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
