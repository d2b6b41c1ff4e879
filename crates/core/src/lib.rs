//! Typed prompt recognition for multi-turn conversations.
//!
//! A prompt declares the kind of answer it expects (text, number, yes/no, one of a list of
//! choices, or a date/time). Each reply is checked for cancellation, interpreted into a typed
//! value with a confidence score, offered to the hosting conversation for arbitration, and
//! then either completes the prompt, ends it, or triggers a re-prompt from a bounded retry
//! budget.
//!
//! ```text
//! reply → CancellationDetector → InterpreterRegistry → ConfidenceArbiter → PromptDialog
//!                                                                             ↓
//!                                                  PromptRenderer ← retry / end / yield
//! ```

pub mod audit;
pub mod channel;
pub mod config;
pub mod entities;
pub mod errors;
pub mod prompts;
pub mod store;

pub use channel::{ChannelCapabilities, StaticCapabilities};
pub use entities::{BasicEntityRecognizer, EntityRecognizer};
pub use errors::{ApplicationError, ConfigurationError, DialogError, InterfaceError, RecognitionError};
pub use prompts::{
    DialogState, PromptDialog, PromptKind, PromptPhase, PromptSpec, RecognitionOutcome,
    ResumeReason, TurnContext, TurnOutcome,
};
pub use store::{DialogStore, InMemoryDialogStore};
