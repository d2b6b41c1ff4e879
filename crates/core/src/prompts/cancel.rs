pub const DEFAULT_CANCEL_PHRASES: [&str; 6] =
    ["cancel", "nevermind", "never mind", "back", "stop", "forget it"];

/// Prefix check run on every reply before interpretation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancellationDetector {
    phrases: Vec<String>,
}

impl Default for CancellationDetector {
    fn default() -> Self {
        Self::new(DEFAULT_CANCEL_PHRASES)
    }
}

impl CancellationDetector {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|phrase| phrase.as_ref().trim().to_lowercase())
            .filter(|phrase| !phrase.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Prefix match, so "stop it" and "cancelled" both cancel.
    pub fn is_cancel(&self, utterance: &str) -> bool {
        let normalized = utterance.trim().to_lowercase();
        self.phrases.iter().any(|phrase| normalized.starts_with(phrase.as_str()))
    }
}
