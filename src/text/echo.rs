//! Removes input text that a sequence-to-sequence model echoed back before its answer.

/// Default share of the input that must be echoed before it is stripped.
pub const DEFAULT_ECHO_THRESHOLD: f32 = 0.9;

/// Strips an echoed copy of the input from the start of model output.
#[derive(Debug, Clone, Copy)]
pub struct EchoFilter {
    /// The shared prefix must cover more than this fraction of the input.
    pub threshold: f32,
}

impl Default for EchoFilter {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ECHO_THRESHOLD,
        }
    }
}

impl EchoFilter {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Return `output` with the echoed part of `input` removed.
    ///
    /// The echo is the longest run that starts at position 0 of both strings. It is only
    /// stripped when it covers more than `threshold` of the input and the output continues
    /// past it; the remainder is trimmed of leading whitespace and punctuation. Otherwise
    /// `output` is returned unchanged.
    pub fn apply<'a>(&self, input: &str, output: &'a str) -> &'a str {
        let input_len = input.chars().count();
        if input_len == 0 {
            return output;
        }

        let (shared_chars, shared_bytes) = common_prefix(input, output);
        let coverage = shared_chars as f32 / input_len as f32;

        if coverage > self.threshold && output.len() > shared_bytes {
            let rest = output[shared_bytes..]
                .trim_start_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation());
            log::debug!(
                "Stripped echoed input ({shared_chars} chars, {:.0}% of input) from model output",
                coverage * 100.0
            );
            return rest;
        }

        output
    }
}

/// Length of the common prefix of `a` and `b`, in chars and in bytes of `b`.
fn common_prefix(a: &str, b: &str) -> (usize, usize) {
    let mut chars = 0;
    let mut bytes = 0;
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            break;
        }
        chars += 1;
        bytes += cb.len_utf8();
    }
    (chars, bytes)
}
