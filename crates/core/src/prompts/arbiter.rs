use async_trait::async_trait;
use tracing::debug;

use crate::errors::RecognitionError;
use crate::prompts::interpreter::Interpretation;
use crate::prompts::recognizer::{RecognitionOutcome, ResumeReason};
use crate::prompts::types::PromptKind;

/// Supplied by the hosting conversation. Returning `true` claims the utterance: the prompt
/// takes no action for this turn and the claimant owns what happens next.
#[async_trait]
pub trait Arbiter: Send + Sync {
    async fn compare_confidence(&self, language: Option<&str>, utterance: &str, score: f64)
        -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NeverClaim;

#[async_trait]
impl Arbiter for NeverClaim {
    async fn compare_confidence(
        &self,
        _language: Option<&str>,
        _utterance: &str,
        _score: f64,
    ) -> bool {
        false
    }
}

/// Global commands ("help", "menu") that outrank any prompt that is not fully certain.
#[derive(Clone, Debug, Default)]
pub struct KeywordArbiter {
    keywords: Vec<String>,
}

impl KeywordArbiter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.as_ref().trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl Arbiter for KeywordArbiter {
    async fn compare_confidence(
        &self,
        _language: Option<&str>,
        utterance: &str,
        score: f64,
    ) -> bool {
        let normalized = utterance.trim().to_lowercase();
        self.keywords.iter().any(|keyword| *keyword == normalized) && score < 1.0
    }
}

/// Offers every interpreted turn to the outer [`Arbiter`] exactly once, then settles the
/// turn's outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfidenceArbiter;

impl ConfidenceArbiter {
    pub async fn settle(
        &self,
        arbiter: &dyn Arbiter,
        language: Option<&str>,
        utterance: &str,
        kind: PromptKind,
        interpreted: Result<Interpretation, RecognitionError>,
    ) -> RecognitionOutcome {
        let score = interpreted.as_ref().map(|interpretation| interpretation.score).unwrap_or(0.0);
        let claimed = arbiter.compare_confidence(language, utterance, score).await;

        if claimed {
            debug!(
                event_name = "prompt.arbitration.claimed",
                prompt_kind = kind.as_str(),
                score,
                "outer conversation claimed the utterance"
            );
            return RecognitionOutcome::handled(kind, score);
        }

        match interpreted {
            Ok(interpretation) if interpretation.is_recognized() => RecognitionOutcome {
                kind,
                resumed: ResumeReason::Completed,
                value: interpretation.value,
                score: interpretation.score,
                error: None,
                handled: false,
            },
            Ok(_) => RecognitionOutcome::not_completed(kind),
            Err(error) => RecognitionOutcome::failed(kind, error),
        }
    }
}
