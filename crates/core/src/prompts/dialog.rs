use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::channel::ChannelCapabilities;
use crate::errors::DialogError;
use crate::prompts::arbiter::Arbiter;
use crate::prompts::recognizer::{
    PromptRecognizer, RecognitionOutcome, RecognitionRequest, Recognizer, ResumeReason,
};
use crate::prompts::render::PromptRenderer;
use crate::prompts::types::{OutboundMessage, PromptSpec, DEFAULT_MAX_RETRIES};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptPhase {
    Prompting,
    WaitingForReply,
    Completed,
    Canceled,
    Failed,
    NotCompletedExhausted,
}

impl PromptPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed | Self::NotCompletedExhausted)
    }

    fn ended_by(outcome: &RecognitionOutcome) -> Self {
        match (outcome.resumed, outcome.error.is_some()) {
            (ResumeReason::Completed, _) => Self::Completed,
            (ResumeReason::Canceled, _) => Self::Canceled,
            (ResumeReason::NotCompleted, true) => Self::Failed,
            (ResumeReason::NotCompleted, false) => Self::NotCompletedExhausted,
        }
    }
}

/// Everything that survives between turns. Hosts persist it by key between replies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogState {
    pub spec: PromptSpec,
    pub remaining_retries: u32,
    pub phase: PromptPhase,
}

/// Per-turn collaborators supplied by the hosting conversation.
#[derive(Clone, Copy)]
pub struct TurnContext<'a> {
    pub language: Option<&'a str>,
    pub channel: &'a dyn ChannelCapabilities,
    pub arbiter: &'a dyn Arbiter,
    pub audit: Option<&'a AuditContext>,
}

impl<'a> TurnContext<'a> {
    pub fn new(channel: &'a dyn ChannelCapabilities, arbiter: &'a dyn Arbiter) -> Self {
        Self { language: None, channel, arbiter, audit: None }
    }

    pub fn language(mut self, language: &'a str) -> Self {
        self.language = Some(language);
        self
    }

    pub fn audit(mut self, audit: &'a AuditContext) -> Self {
        self.audit = Some(audit);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DialogStart {
    pub state: DialogState,
    pub message: OutboundMessage,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// An outer claimant took the utterance. Nothing is sent and the state is untouched.
    Yielded,
    Retry { message: OutboundMessage, remaining_retries: u32 },
    Ended { phase: PromptPhase, outcome: RecognitionOutcome },
}

/// Drives one prompt across turns: render, recognize, then retry or end.
#[derive(Clone)]
pub struct PromptDialog {
    recognizer: Arc<dyn Recognizer>,
    renderer: PromptRenderer,
    default_max_retries: u32,
    audit_sink: Option<Arc<dyn AuditSink>>,
}

impl Default for PromptDialog {
    fn default() -> Self {
        Self::new(Arc::new(PromptRecognizer::default()), PromptRenderer::default())
    }
}

impl PromptDialog {
    pub fn new(recognizer: Arc<dyn Recognizer>, renderer: PromptRenderer) -> Self {
        Self { recognizer, renderer, default_max_retries: DEFAULT_MAX_RETRIES, audit_sink: None }
    }

    pub fn with_default_max_retries(mut self, default_max_retries: u32) -> Self {
        self.default_max_retries = default_max_retries;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn renderer(&self) -> &PromptRenderer {
        &self.renderer
    }

    pub fn begin(&self, spec: PromptSpec, ctx: &TurnContext<'_>) -> Result<DialogStart, DialogError> {
        let kind = spec.kind;
        let spec = match spec.normalize(self.default_max_retries) {
            Ok(spec) => spec,
            Err(error) => {
                self.audit(ctx, "prompt.rejected", AuditCategory::Prompt, AuditOutcome::Rejected, |event| {
                    event.with_metadata("prompt_kind", kind.as_str()).with_metadata("error", error.to_string())
                });
                return Err(error.into());
            }
        };

        let mut state = DialogState {
            remaining_retries: spec.effective_max_retries(),
            spec,
            phase: PromptPhase::Prompting,
        };
        let message = self.renderer.render(&state.spec, false, ctx.channel, ctx.language);
        state.phase = PromptPhase::WaitingForReply;

        info!(
            event_name = "prompt.started",
            prompt_kind = kind.as_str(),
            max_retries = state.remaining_retries,
            choice_count = state.spec.choices.len(),
            "prompt dialog started"
        );
        self.audit(ctx, "prompt.started", AuditCategory::Prompt, AuditOutcome::Success, |event| {
            event
                .with_metadata("prompt_kind", kind.as_str())
                .with_metadata("max_retries", state.remaining_retries.to_string())
        });

        Ok(DialogStart { state, message })
    }

    pub async fn on_reply(
        &self,
        state: &mut DialogState,
        utterance: &str,
        ctx: &TurnContext<'_>,
    ) -> Result<TurnOutcome, DialogError> {
        if state.phase.is_terminal() {
            return Err(DialogError::AlreadyEnded { phase: state.phase });
        }

        let kind = state.spec.kind;
        let outcome = self
            .recognizer
            .recognize(RecognitionRequest {
                kind,
                language: ctx.language,
                utterance,
                choices: &state.spec.choices,
                reference_date: state.spec.reference_date,
                arbiter: ctx.arbiter,
            })
            .await;

        if outcome.handled {
            debug!(
                event_name = "prompt.yielded",
                prompt_kind = kind.as_str(),
                remaining_retries = state.remaining_retries,
                "reply claimed by outer conversation"
            );
            self.audit(ctx, "prompt.yielded", AuditCategory::Arbitration, AuditOutcome::Success, |event| {
                event.with_metadata("prompt_kind", kind.as_str())
            });
            return Ok(TurnOutcome::Yielded);
        }

        if outcome.is_final() || state.remaining_retries == 0 {
            let phase = PromptPhase::ended_by(&outcome);
            state.phase = phase;

            info!(
                event_name = "prompt.ended",
                prompt_kind = kind.as_str(),
                phase = ?phase,
                score = outcome.score,
                "prompt dialog ended"
            );
            let (category, audit_outcome) = match phase {
                PromptPhase::Completed => (AuditCategory::Prompt, AuditOutcome::Success),
                PromptPhase::Failed => (AuditCategory::Recognition, AuditOutcome::Failed),
                _ => (AuditCategory::Prompt, AuditOutcome::Rejected),
            };
            self.audit(ctx, "prompt.ended", category, audit_outcome, |event| {
                let event = event
                    .with_metadata("prompt_kind", kind.as_str())
                    .with_metadata("phase", format!("{phase:?}"));
                match &outcome.error {
                    Some(error) => event.with_metadata("error", error.to_string()),
                    None => event,
                }
            });

            return Ok(TurnOutcome::Ended { phase, outcome });
        }

        state.remaining_retries -= 1;
        let message = self.renderer.render(&state.spec, true, ctx.channel, ctx.language);

        info!(
            event_name = "prompt.retried",
            prompt_kind = kind.as_str(),
            remaining_retries = state.remaining_retries,
            "reply not recognized, prompting again"
        );
        self.audit(ctx, "prompt.retried", AuditCategory::Recognition, AuditOutcome::Rejected, |event| {
            event
                .with_metadata("prompt_kind", kind.as_str())
                .with_metadata("remaining_retries", state.remaining_retries.to_string())
        });

        Ok(TurnOutcome::Retry { message, remaining_retries: state.remaining_retries })
    }

    fn audit<F>(
        &self,
        ctx: &TurnContext<'_>,
        event_type: &str,
        category: AuditCategory,
        outcome: AuditOutcome,
        decorate: F,
    ) where
        F: FnOnce(crate::audit::AuditEvent) -> crate::audit::AuditEvent,
    {
        let (Some(sink), Some(context)) = (&self.audit_sink, ctx.audit) else {
            return;
        };
        sink.emit(decorate(context.event(event_type, category, outcome)));
    }
}
