use std::collections::HashMap;

use super::KokoroError;
use crate::engines::espeak::EspeakConfig;

/// espeak-ng language for a Kokoro voice, from its two-letter prefix (`af_heart` -> `en-us`).
pub fn voice_lang(voice: &str) -> &'static str {
    match voice.get(..2).unwrap_or("") {
        "bf" | "bm" => "en-gb",
        "ef" | "em" => "es",
        "ff" => "fr",
        "hf" | "hm" => "hi",
        "if" | "im" => "it",
        "jf" | "jm" => "ja",
        "pf" | "pm" => "pt-br",
        "zf" | "zm" => "cmn",
        _ => "en-us",
    }
}

/// A run of words, or a punctuation mark passed to the model as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Words(String),
    Mark(char),
}

/// Convert `text` to Kokoro token ids.
///
/// Word runs go through espeak-ng in one batch (one line per run); punctuation is looked up
/// in the vocabulary directly so pauses survive. Symbols missing from `vocab` are dropped.
pub fn phonemize(
    text: &str,
    lang: &str,
    vocab: &HashMap<char, i64>,
    espeak: &EspeakConfig,
) -> Result<Vec<i64>, KokoroError> {
    let pieces = split_pieces(text);
    let runs: Vec<&str> = pieces
        .iter()
        .filter_map(|p| match p {
            Piece::Words(w) => Some(w.as_str()),
            Piece::Mark(_) => None,
        })
        .collect();

    let ipa = if runs.is_empty() {
        Vec::new()
    } else {
        ipa_lines(&runs, lang, espeak)?
    };
    let mut phonemes = ipa.into_iter();

    let mut ids = Vec::new();
    for piece in &pieces {
        match piece {
            Piece::Words(_) => {
                if let Some(ipa) = phonemes.next() {
                    ids.extend(to_ids(&ipa, vocab));
                }
            }
            Piece::Mark(mark) => ids.extend(vocab.get(mark).copied()),
        }
    }
    Ok(ids)
}

/// IPA for each run. Falls back to one espeak-ng call per run if the batch output does not
/// come back one line per input line.
fn ipa_lines(runs: &[&str], lang: &str, espeak: &EspeakConfig) -> Result<Vec<String>, KokoroError> {
    let ipa = |input: &str| -> Result<String, KokoroError> {
        let out = espeak.run(&["--ipa", "--stdin", "-q", "-v", lang], Some(input))?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    };

    let batch = ipa(&runs.join("\n"))?;
    let lines: Vec<String> = batch.lines().map(str::to_string).collect();
    if lines.len() == runs.len() {
        return Ok(lines);
    }
    log::debug!(
        "espeak-ng returned {} lines for {} runs, phonemizing one at a time",
        lines.len(),
        runs.len()
    );
    runs.iter().map(|run| ipa(run)).collect()
}

fn to_ids<'a>(ipa: &'a str, vocab: &'a HashMap<char, i64>) -> impl Iterator<Item = i64> + 'a {
    ipa.trim()
        .chars()
        .filter(|&c| c != '_' && c != '\n')
        .filter_map(|c| vocab.get(&c).copied())
}

fn split_pieces(text: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut words = String::new();
    let mut chars = text.char_indices().peekable();
    let mut prev: Option<char> = None;
    while let Some((_, ch)) = chars.next() {
        let next = chars.peek().map(|&(_, c)| c);
        let mark = match ch {
            '\n' | '\r' => Some('.'),
            // "2.5" and "1,000" stay inside the word run.
            '.' | ',' if is_digit(prev) && is_digit(next) => None,
            '.' | '!' | '?' | ',' | ';' | ':' | '—' | '…' | '"' | '(' | ')' | '\u{201c}'
            | '\u{201d}' => Some(ch),
            _ => None,
        };
        match mark {
            Some(mark) => {
                flush_words(&mut words, &mut pieces);
                pieces.push(Piece::Mark(mark));
            }
            None if ch.is_whitespace() => {
                if !words.is_empty() && !words.ends_with(' ') {
                    words.push(' ');
                }
            }
            None => words.push(ch),
        }
        prev = Some(ch);
    }
    flush_words(&mut words, &mut pieces);
    pieces
}

fn flush_words(words: &mut String, pieces: &mut Vec<Piece>) {
    let run = words.trim();
    if !run.is_empty() {
        pieces.push(Piece::Words(run.to_string()));
    }
    words.clear();
}

fn is_digit(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn espeak_available() -> bool {
        EspeakConfig::default().version().is_ok()
    }

    fn words(s: &str) -> Piece {
        Piece::Words(s.to_string())
    }

    #[test]
    fn voice_prefix_selects_language() {
        assert_eq!(voice_lang("am_adam"), "en-us");
        assert_eq!(voice_lang("af_heart"), "en-us");
        assert_eq!(voice_lang("bf_emma"), "en-gb");
        assert_eq!(voice_lang("zf_xiaobei"), "cmn");
        assert_eq!(voice_lang("x"), "en-us");
    }

    #[test]
    fn splits_words_and_punctuation() {
        assert_eq!(
            split_pieces("Hello, world. Testing!"),
            vec![
                words("Hello"),
                Piece::Mark(','),
                words("world"),
                Piece::Mark('.'),
                words("Testing"),
                Piece::Mark('!'),
            ]
        );
    }

    #[test]
    fn keeps_number_separators_inside_words() {
        assert_eq!(
            split_pieces("Version 2.0 reached 1,000 users."),
            vec![words("Version 2.0 reached 1,000 users"), Piece::Mark('.')]
        );
        assert_eq!(
            split_pieces("Value 2, next"),
            vec![words("Value 2"), Piece::Mark(','), words("next")]
        );
    }

    #[test]
    fn newlines_become_full_stops() {
        assert_eq!(
            split_pieces("one\ntwo"),
            vec![words("one"), Piece::Mark('.'), words("two")]
        );
    }

    #[test]
    fn punctuation_only_text_needs_no_espeak() {
        let vocab: HashMap<char, i64> = [('.', 4), ('!', 5)].into_iter().collect();
        let espeak = EspeakConfig {
            bin_path: Some("/nonexistent/espeak-ng".into()),
            data_path: None,
        };
        assert_eq!(phonemize("...!", "en-us", &vocab, &espeak).unwrap(), vec![4, 4, 4, 5]);
    }

    #[test]
    fn keeps_terminal_schwa_for_america() {
        // Skip when espeak-ng is unavailable in the execution environment.
        if !espeak_available() {
            return;
        }
        let vocab: HashMap<char, i64> = "Amɛɹɪkəæɚɾeɑˈˌ"
            .chars()
            .enumerate()
            .map(|(i, c)| (c, i as i64 + 20))
            .collect();
        let ids = phonemize("America", "en-us", &vocab, &EspeakConfig::default()).unwrap();
        assert_eq!(ids.last(), vocab.get(&'ə'));
    }
}
