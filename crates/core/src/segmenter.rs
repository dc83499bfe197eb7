//! Incremental sentence detection over streamed text, used to feed the
//! speech queue while a response is still arriving.

/// Sentence terminators used when none are configured.
pub const DEFAULT_TERMINATORS: &str = "。！？.!?:";

/// Splits streamed text into speakable sentences, skipping fenced code.
///
/// Code fences are detected by counting consecutive backticks: every run of
/// three toggles the inside-code state. Stray triple backticks therefore
/// invert the state for the rest of the response.
#[derive(Clone, Debug)]
pub struct SentenceSegmenter {
    buf: String,
    backticks: u8,
    in_code: bool,
    terminators: Vec<char>,
}

impl SentenceSegmenter {
    /// Creates a segmenter with [`DEFAULT_TERMINATORS`].
    pub fn new() -> Self {
        Self::with_terminators(DEFAULT_TERMINATORS)
    }

    /// Creates a segmenter ending sentences at any char of `terminators`.
    pub fn with_terminators(terminators: &str) -> Self {
        Self {
            buf: String::new(),
            backticks: 0,
            in_code: false,
            terminators: terminators.chars().collect(),
        }
    }

    /// Returns `true` while inside a fenced code block.
    #[inline]
    pub fn is_in_code(&self) -> bool {
        self.in_code
    }

    /// Feeds one character, returning a sentence if it completed one.
    pub fn push_char(&mut self, ch: char) -> Option<String> {
        self.buf.push(ch);

        if ch == '`' {
            self.backticks += 1;
            if self.backticks == 3 {
                self.in_code = !self.in_code;
                self.backticks = 0;
                self.buf.clear();
            }
            return None;
        }
        self.backticks = 0;

        if !self.terminators.contains(&ch) {
            return None;
        }
        let sentence = (!self.in_code).then(|| self.buf.trim().to_owned());
        self.buf.clear();
        sentence.filter(|s| !s.is_empty())
    }

    /// Feeds a streamed fragment, returning the sentences it completed.
    pub fn push_str(&mut self, fragment: &str) -> Vec<String> {
        fragment.chars().filter_map(|ch| self.push_char(ch)).collect()
    }

    /// Flushes the trailing partial sentence and resets the state.
    pub fn finish(&mut self) -> Option<String> {
        let sentence = (!self.in_code)
            .then(|| self.buf.trim().to_owned())
            .filter(|s| !s.is_empty());
        self.buf.clear();
        self.backticks = 0;
        self.in_code = false;
        sentence
    }
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}
