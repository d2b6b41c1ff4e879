pub mod arbiter;
pub mod cancel;
pub mod dialog;
pub mod interpreter;
pub mod recognizer;
pub mod render;
pub mod types;

pub use arbiter::{Arbiter, ConfidenceArbiter, KeywordArbiter, NeverClaim};
pub use cancel::{CancellationDetector, DEFAULT_CANCEL_PHRASES};
pub use dialog::{DialogStart, DialogState, PromptDialog, PromptPhase, TurnContext, TurnOutcome};
pub use interpreter::{
    InterpretRequest, Interpretation, InterpreterRegistry, UtteranceInterpreter, TEXT_SCORE,
};
pub use recognizer::{
    PromptRecognizer, RecognitionOutcome, RecognitionRequest, Recognizer, ResumeReason,
};
pub use render::{
    FixedSelector, PromptRenderer, RandomSelector, VariantSelector, DEFAULT_RETRY_APOLOGY,
};
pub use types::{
    expand_choices, ChoiceSource, FoundChoice, ListStyle, OutboundMessage, PromptContent,
    PromptKind, PromptOptions, PromptSpec, PromptValue, ResolvedDateTime, SuggestedAction,
    DEFAULT_MAX_RETRIES,
};
