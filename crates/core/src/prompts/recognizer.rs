use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{BasicEntityRecognizer, EntityRecognizer};
use crate::errors::RecognitionError;
use crate::prompts::arbiter::{Arbiter, ConfidenceArbiter};
use crate::prompts::cancel::CancellationDetector;
use crate::prompts::interpreter::{InterpretRequest, Interpretation, InterpreterRegistry};
use crate::prompts::types::{PromptKind, PromptValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeReason {
    Completed,
    NotCompleted,
    Canceled,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecognitionOutcome {
    pub kind: PromptKind,
    pub resumed: ResumeReason,
    pub value: Option<PromptValue>,
    pub score: f64,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<RecognitionError>,
    /// An outer claimant consumed the utterance; the prompt must not act on this turn.
    pub handled: bool,
}

impl RecognitionOutcome {
    pub fn canceled(kind: PromptKind) -> Self {
        Self {
            kind,
            resumed: ResumeReason::Canceled,
            value: None,
            score: 0.0,
            error: None,
            handled: false,
        }
    }

    pub fn not_completed(kind: PromptKind) -> Self {
        Self {
            kind,
            resumed: ResumeReason::NotCompleted,
            value: None,
            score: 0.0,
            error: None,
            handled: false,
        }
    }

    pub fn failed(kind: PromptKind, error: RecognitionError) -> Self {
        Self { error: Some(error), ..Self::not_completed(kind) }
    }

    pub fn handled(kind: PromptKind, score: f64) -> Self {
        Self { handled: true, score, ..Self::not_completed(kind) }
    }

    /// Whether the dialog must end on this outcome regardless of remaining retries.
    pub fn is_final(&self) -> bool {
        !self.handled && (self.resumed != ResumeReason::NotCompleted || self.error.is_some())
    }
}

fn serialize_error<S>(error: &Option<RecognitionError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

#[derive(Clone, Copy)]
pub struct RecognitionRequest<'a> {
    pub kind: PromptKind,
    pub language: Option<&'a str>,
    pub utterance: &'a str,
    pub choices: &'a [String],
    pub reference_date: Option<DateTime<Utc>>,
    pub arbiter: &'a dyn Arbiter,
}

/// Turns one raw reply into exactly one [`RecognitionOutcome`]. Implementations never fail;
/// faults are reported inside the outcome.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, request: RecognitionRequest<'_>) -> RecognitionOutcome;
}

/// Cancellation check, per-kind interpretation, then arbitration.
#[derive(Clone)]
pub struct PromptRecognizer {
    cancellation: CancellationDetector,
    interpreters: InterpreterRegistry,
    entities: Arc<dyn EntityRecognizer>,
    arbitration: ConfidenceArbiter,
}

impl Default for PromptRecognizer {
    fn default() -> Self {
        Self::new(
            CancellationDetector::default(),
            InterpreterRegistry::default(),
            Arc::new(BasicEntityRecognizer::default()),
        )
    }
}

impl PromptRecognizer {
    pub fn new(
        cancellation: CancellationDetector,
        interpreters: InterpreterRegistry,
        entities: Arc<dyn EntityRecognizer>,
    ) -> Self {
        Self { cancellation, interpreters, entities, arbitration: ConfidenceArbiter }
    }

    pub fn interpreters_mut(&mut self) -> &mut InterpreterRegistry {
        &mut self.interpreters
    }

    fn interpret(&self, request: &InterpretRequest<'_>) -> Result<Interpretation, RecognitionError> {
        let entities = self.entities.as_ref();
        catch_unwind(AssertUnwindSafe(|| self.interpreters.interpret(request, entities)))
            .unwrap_or_else(|panic| {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|message| (*message).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "interpreter panicked".to_string());
                Err(RecognitionError::Interpreter { kind: request.kind, detail })
            })
    }
}

#[async_trait]
impl Recognizer for PromptRecognizer {
    async fn recognize(&self, request: RecognitionRequest<'_>) -> RecognitionOutcome {
        let utterance = request.utterance.trim();
        if self.cancellation.is_cancel(utterance) {
            return RecognitionOutcome::canceled(request.kind);
        }

        let interpreted = self.interpret(&InterpretRequest {
            kind: request.kind,
            utterance,
            choices: request.choices,
            reference_date: request.reference_date,
        });

        self.arbitration
            .settle(request.arbiter, request.language, utterance, request.kind, interpreted)
            .await
    }
}
