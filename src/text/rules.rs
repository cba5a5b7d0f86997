//! Rule-based simplification.
//!
//! Used on its own when no model is available, and as the fallback whenever an AI model
//! fails to load or to generate.

/// Sentences with more words than this are split further.
pub const MAX_SENTENCE_WORDS: usize = 20;

/// Coordinating conjunctions that mark a split point. The tokens themselves are dropped.
pub const CONJUNCTIONS: &[&str] = &["and", "but", "or", "because"];

/// Simplify `text` by splitting it into short sentences.
///
/// Never fails; empty or whitespace-only input yields an empty string.
pub fn simplify(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();

    for (sentence, terminator) in split_sentences(text) {
        let word_count = sentence.split_whitespace().count();
        if word_count > MAX_SENTENCE_WORDS {
            for fragment in split_long_sentence(sentence) {
                out.push(finish_fragment(&fragment, terminator));
            }
        } else if let Some(s) = finish_sentence(sentence, terminator) {
            out.push(s);
        }
    }

    out.join(" ")
}

/// Split text into `(sentence, terminator)` pairs on `.`, `!` and `?`.
///
/// Text after the last terminator is returned with `.` as its terminator. Runs of
/// terminators (`?!`, `...`) are folded into the first one.
pub fn split_sentences(text: &str) -> Vec<(&str, char)> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            let sentence = &text[start..idx];
            if !sentence.trim().is_empty() {
                sentences.push((sentence.trim(), ch));
            }
            start = idx + ch.len_utf8();
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push((tail, '.'));
    }

    sentences
}

/// Split an over-long sentence at conjunctions and commas.
///
/// Conjunction tokens are dropped; a comma closes the fragment it ends.
fn split_long_sentence(sentence: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for token in sentence.split_whitespace() {
        if is_conjunction(token) {
            flush(&mut fragments, &mut current);
            continue;
        }

        if let Some(stripped) = token.strip_suffix(',') {
            let stripped = stripped.trim_end_matches(',');
            if !stripped.is_empty() && !is_conjunction(stripped) {
                current.push(stripped);
            }
            flush(&mut fragments, &mut current);
            continue;
        }

        current.push(token);
    }
    flush(&mut fragments, &mut current);

    fragments
}

fn flush(fragments: &mut Vec<String>, current: &mut Vec<&str>) {
    // A fragment can still end with a conjunction when it was written as "and;" or similar.
    while current.last().is_some_and(|t| is_conjunction(t)) {
        current.pop();
    }
    if !current.is_empty() {
        fragments.push(current.join(" "));
    }
    current.clear();
}

fn is_conjunction(token: &str) -> bool {
    let word = token.trim_matches(|c: char| !c.is_alphanumeric());
    CONJUNCTIONS.iter().any(|c| c.eq_ignore_ascii_case(word))
}

fn finish_sentence(sentence: &str, terminator: char) -> Option<String> {
    let mut tokens: Vec<&str> = sentence.split_whitespace().collect();
    while tokens.last().is_some_and(|t| is_conjunction(t)) {
        tokens.pop();
    }
    if tokens.is_empty() {
        return None;
    }
    let joined = tokens.join(" ");
    Some(format!(
        "{}{terminator}",
        joined.trim_end_matches([',', ';', ':'])
    ))
}

fn finish_fragment(fragment: &str, terminator: char) -> String {
    let fragment = fragment.trim().trim_end_matches([',', ';', ':']);
    format!("{}{terminator}", capitalize(fragment))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(text: &str) -> Vec<String> {
        let out = simplify(text);
        split_sentences(&out)
            .into_iter()
            .map(|(s, _)| s.to_string())
            .collect()
    }

    #[test]
    fn empty_and_blank_input() {
        assert_eq!(simplify(""), "");
        assert_eq!(simplify("   \n "), "");
        assert_eq!(simplify("..."), "");
    }

    #[test]
    fn short_sentences_are_kept() {
        assert_eq!(
            simplify("The cat sat on the mat. It was warm!"),
            "The cat sat on the mat. It was warm!"
        );
    }

    #[test]
    fn missing_terminator_gets_a_period() {
        assert_eq!(simplify("no ending here"), "no ending here.");
    }

    #[test]
    fn long_sentence_is_split_at_conjunctions() {
        let text = "The committee reviewed every single proposal in great detail during the long meeting \
                    and the members voted to approve the new community garden project";
        let out = fragments(text);
        assert_eq!(out.len(), 2, "{out:?}");
        assert!(out[0].starts_with("The committee"));
        assert!(out[1].starts_with("The members"));
        assert!(!simplify(text).contains(" and "));
    }

    #[test]
    fn long_sentence_is_split_at_commas() {
        let text = "When the rain finally stopped after many long days of storms over the valley, \
                    the farmers returned to their fields to inspect what was left of the crops.";
        let out = fragments(text);
        assert_eq!(
            out,
            vec![
                "When the rain finally stopped after many long days of storms over the valley",
                "The farmers returned to their fields to inspect what was left of the crops",
            ]
        );
    }

    #[test]
    fn twenty_words_are_not_split() {
        let text = vec!["word,"; 19].join(" ") + " word.";
        assert_eq!(simplify(&text), text);
    }

    #[test]
    fn trailing_conjunction_is_dropped_from_short_sentences() {
        assert_eq!(simplify("I like tea, and"), "I like tea.");
        assert_eq!(simplify("and or but."), "");
    }

    #[test]
    fn no_fragment_ends_in_a_conjunction() {
        let inputs = [
            "one two three four five six seven eight nine ten eleven twelve thirteen fourteen \
             fifteen sixteen seventeen eighteen nineteen twenty and, but or because",
            "and and and and and and and and and and and and and and and and and and and and and",
            "We went out but, because it rained, or so they said, and, we came back home again \
             before the evening bus left the station near the old mill or the bakery.",
            "A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P, Q, R, S, T, U, V, W or",
        ];
        for input in inputs {
            for fragment in fragments(input) {
                let last = fragment.split_whitespace().last().unwrap_or_default();
                assert!(
                    !is_conjunction(last),
                    "fragment {fragment:?} from {input:?} ends in a conjunction"
                );
            }
        }
    }

    #[test]
    fn keeps_question_and_exclamation_terminators() {
        let text = vec!["very"; 12].join(" ")
            + " long question, "
            + &vec!["really"; 12].join(" ")
            + " long?";
        let out = simplify(&text);
        assert!(out.ends_with("long?"));
        assert_eq!(out.matches('?').count(), 2);
    }

    #[test]
    fn handles_unicode_without_panicking() {
        let text = "Ünïcödé wörds — ça va? Ja, natürlich. 日本語のテキスト。";
        let out = simplify(text);
        assert!(out.starts_with("Ünïcödé"));
    }
}
