use thiserror::Error;

use crate::prompts::{PromptKind, PromptPhase};

/// A prompt that cannot be run as declared. Raised when the dialog begins, never mid-turn.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("choice prompt requires at least one candidate label")]
    EmptyChoices,
    #[error("choice label at position {position} is blank")]
    BlankChoiceLabel { position: usize },
    #[error("`{field}` declares an empty set of phrasing variants")]
    EmptyVariants { field: &'static str },
    #[error("unsupported value `{value}` for `{field}`")]
    UnsupportedValue { field: &'static str, value: String },
    #[error("invalid prompt options: {0}")]
    InvalidOptions(String),
    #[error("reference date {0} is not a representable epoch timestamp")]
    InvalidReferenceDate(i64),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("no interpreter registered for {0:?} prompts")]
    MissingInterpreter(PromptKind),
    #[error("{kind:?} interpreter failed: {detail}")]
    Interpreter { kind: PromptKind, detail: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("prompt dialog already ended in {phase:?}")]
    AlreadyEnded { phase: PromptPhase },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Dialog(#[from] DialogError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<ConfigurationError> for ApplicationError {
    fn from(value: ConfigurationError) -> Self {
        Self::Dialog(DialogError::Configuration(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "That prompt could not be started. Check its options and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The conversation store is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Dialog(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
