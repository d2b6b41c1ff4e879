use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::audit::AuditContext;
use parley_core::channel::ChannelCapabilities;
use parley_core::config::{SlackConfig, SLACK_MAX_BUTTONS_LIMIT};
use parley_core::errors::ApplicationError;
use parley_core::prompts::{
    Arbiter, NeverClaim, PromptDialog, PromptPhase, PromptSpec, RecognitionOutcome, TurnContext,
    TurnOutcome,
};
use parley_core::store::DialogStore;
use tracing::{debug, info};

use crate::blocks::{is_prompt_choice_action, prompt_closed_message, prompt_message, MessageTemplate};
use crate::events::{
    BlockActionEvent, BlockActionService, EventContext, EventHandlerError, ThreadMessageEvent,
    ThreadMessageService,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlackCapabilities {
    pub max_buttons: usize,
}

impl SlackCapabilities {
    pub fn from_config(config: &SlackConfig) -> Self {
        Self { max_buttons: config.max_buttons }
    }
}

impl Default for SlackCapabilities {
    fn default() -> Self {
        Self { max_buttons: 5 }
    }
}

impl ChannelCapabilities for SlackCapabilities {
    fn max_selectable_actions(&self) -> usize {
        self.max_buttons.min(SLACK_MAX_BUTTONS_LIMIT)
    }
}

/// A Slack thread hosts at most one active prompt.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThreadKey {
    pub channel_id: String,
    pub thread_ts: String,
}

impl ThreadKey {
    pub fn new(channel_id: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), thread_ts: thread_ts.into() }
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel_id, self.thread_ts)
    }
}

/// Receives the outcome of every prompt that ends. The returned message, if any, is posted
/// to the thread.
#[async_trait]
pub trait PromptCompletionHandler: Send + Sync {
    async fn prompt_ended(
        &self,
        thread: &ThreadKey,
        phase: PromptPhase,
        outcome: &RecognitionOutcome,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

/// Posts the stock acknowledgement for canceled, exhausted and failed prompts.
pub struct AcknowledgeCompletion;

#[async_trait]
impl PromptCompletionHandler for AcknowledgeCompletion {
    async fn prompt_ended(
        &self,
        _thread: &ThreadKey,
        phase: PromptPhase,
        _outcome: &RecognitionOutcome,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        Ok(prompt_closed_message(phase))
    }
}

pub struct PromptThreadService {
    dialog: PromptDialog,
    store: Arc<dyn DialogStore>,
    capabilities: SlackCapabilities,
    arbiter: Arc<dyn Arbiter>,
    completion: Arc<dyn PromptCompletionHandler>,
}

impl PromptThreadService {
    pub fn new(dialog: PromptDialog, store: Arc<dyn DialogStore>) -> Self {
        Self {
            dialog,
            store,
            capabilities: SlackCapabilities::default(),
            arbiter: Arc::new(NeverClaim),
            completion: Arc::new(AcknowledgeCompletion),
        }
    }

    pub fn with_capabilities(mut self, capabilities: SlackCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// The conversation layer that may claim replies before the prompt commits to them.
    pub fn with_arbiter(mut self, arbiter: Arc<dyn Arbiter>) -> Self {
        self.arbiter = arbiter;
        self
    }

    pub fn with_completion_handler(mut self, completion: Arc<dyn PromptCompletionHandler>) -> Self {
        self.completion = completion;
        self
    }

    /// Begins a prompt in the thread, replacing any prompt already waiting there.
    pub async fn start(
        &self,
        thread: &ThreadKey,
        spec: PromptSpec,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, EventHandlerError> {
        let key = thread.to_string();
        let audit = AuditContext::new(
            Some(key.clone()),
            Some(thread.thread_ts.clone()),
            ctx.correlation_id.clone(),
            "slack-thread",
        );
        let turn = TurnContext::new(&self.capabilities, self.arbiter.as_ref()).audit(&audit);

        let start = self.dialog.begin(spec, &turn).map_err(ApplicationError::from)?;
        self.store.save(&key, &start.state).await?;

        info!(
            event_name = "slack.prompt.started",
            thread = %key,
            correlation_id = %ctx.correlation_id,
            "prompt posted to thread"
        );
        Ok(prompt_message(&start.message))
    }

    pub async fn handle_reply(
        &self,
        thread: &ThreadKey,
        user_id: &str,
        utterance: &str,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        let key = thread.to_string();
        let Some(mut state) = self.store.load(&key).await? else {
            debug!(event_name = "slack.prompt.no_active", thread = %key, "no prompt waiting in thread");
            return Ok(None);
        };

        let audit = AuditContext::new(
            Some(key.clone()),
            Some(thread.thread_ts.clone()),
            ctx.correlation_id.clone(),
            user_id,
        );
        let turn = TurnContext::new(&self.capabilities, self.arbiter.as_ref()).audit(&audit);

        let outcome =
            self.dialog.on_reply(&mut state, utterance, &turn).await.map_err(ApplicationError::from)?;

        match outcome {
            TurnOutcome::Yielded => Ok(None),
            TurnOutcome::Retry { message, .. } => {
                self.store.save(&key, &state).await?;
                Ok(Some(prompt_message(&message)))
            }
            TurnOutcome::Ended { phase, outcome } => {
                self.store.remove(&key).await?;
                info!(
                    event_name = "slack.prompt.ended",
                    thread = %key,
                    phase = ?phase,
                    correlation_id = %ctx.correlation_id,
                    "prompt finished in thread"
                );
                self.completion.prompt_ended(thread, phase, &outcome).await
            }
        }
    }
}

#[async_trait]
impl ThreadMessageService for PromptThreadService {
    async fn handle_thread_message(
        &self,
        event: &ThreadMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        let thread = ThreadKey::new(event.channel_id.clone(), event.thread_ts.clone());
        self.handle_reply(&thread, &event.user_id, &event.text, ctx).await
    }
}

#[async_trait]
impl BlockActionService for PromptThreadService {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        if !is_prompt_choice_action(&event.action_id) {
            return Ok(None);
        }
        let Some(value) = event.value.as_deref() else {
            return Ok(None);
        };

        let thread = ThreadKey::new(event.channel_id.clone(), event.thread_ts());
        self.handle_reply(&thread, &event.user_id, value, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use parley_core::channel::ChannelCapabilities;
    use parley_core::prompts::{
        ChoiceSource, PromptDialog, PromptPhase, PromptSpec, PromptValue, RecognitionOutcome,
        ResumeReason,
    };
    use parley_core::store::InMemoryDialogStore;

    use super::{
        PromptCompletionHandler, PromptThreadService, SlackCapabilities, ThreadKey,
    };
    use crate::blocks::{Block, MessageTemplate};
    use crate::events::{
        BlockActionEvent, BlockActionService, EventContext, EventHandlerError, ThreadMessageEvent,
        ThreadMessageService,
    };

    #[derive(Default)]
    struct RecordingCompletion {
        ended: Mutex<Vec<(ThreadKey, PromptPhase, RecognitionOutcome)>>,
    }

    #[async_trait]
    impl PromptCompletionHandler for RecordingCompletion {
        async fn prompt_ended(
            &self,
            thread: &ThreadKey,
            phase: PromptPhase,
            outcome: &RecognitionOutcome,
        ) -> Result<Option<MessageTemplate>, EventHandlerError> {
            self.ended.lock().expect("lock").push((thread.clone(), phase, outcome.clone()));
            Ok(None)
        }
    }

    fn service(
        store: InMemoryDialogStore,
        completion: Arc<RecordingCompletion>,
    ) -> PromptThreadService {
        PromptThreadService::new(PromptDialog::default(), Arc::new(store))
            .with_completion_handler(completion)
    }

    fn reply(text: &str) -> ThreadMessageEvent {
        ThreadMessageEvent {
            channel_id: "C1".to_owned(),
            thread_ts: "T1".to_owned(),
            user_id: "U1".to_owned(),
            text: text.to_owned(),
        }
    }

    #[test]
    fn capabilities_never_exceed_slack_limit() {
        assert_eq!(SlackCapabilities { max_buttons: 40 }.max_selectable_actions(), 25);
        assert_eq!(SlackCapabilities::default().max_selectable_actions(), 5);
    }

    #[tokio::test]
    async fn number_prompt_retries_then_completes() {
        let store = InMemoryDialogStore::default();
        let completion = Arc::new(RecordingCompletion::default());
        let service = service(store.clone(), completion.clone());
        let thread = ThreadKey::new("C1", "T1");
        let ctx = EventContext::default();

        let first = service
            .start(&thread, PromptSpec::number("How many seats?").max_retries(1), &ctx)
            .await
            .expect("start");
        assert_eq!(first.fallback_text, "How many seats?");
        assert_eq!(store.len(), 1);

        let retry = service.handle_thread_message(&reply("lots"), &ctx).await.expect("reply");
        assert_eq!(
            retry.map(|message| message.fallback_text),
            Some("I didn't understand. How many seats?".to_owned())
        );

        let done = service.handle_thread_message(&reply("12"), &ctx).await.expect("reply");
        assert!(done.is_none());
        assert!(store.is_empty());

        let ended = completion.ended.lock().expect("lock");
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].0, thread);
        assert_eq!(ended[0].1, PromptPhase::Completed);
        assert_eq!(ended[0].2.resumed, ResumeReason::Completed);
        assert_eq!(ended[0].2.value, Some(PromptValue::Number(12.0)));
    }

    #[tokio::test]
    async fn choice_buttons_feed_their_value_back_as_the_reply() {
        let store = InMemoryDialogStore::default();
        let completion = Arc::new(RecordingCompletion::default());
        let service = service(store.clone(), completion.clone());
        let thread = ThreadKey::new("C1", "T1");
        let ctx = EventContext::default();

        let first = service
            .start(
                &thread,
                PromptSpec::choice("Pick a color.", ChoiceSource::from("Red|Green|Blue")),
                &ctx,
            )
            .await
            .expect("start");
        let Some(Block::Actions { elements, .. }) = first.blocks.get(1) else {
            panic!("expected buttons for a short choice list");
        };
        let clicked = &elements[1];

        let click = BlockActionEvent {
            channel_id: "C1".to_owned(),
            message_ts: "M9".to_owned(),
            thread_ts: Some("T1".to_owned()),
            user_id: "U1".to_owned(),
            action_id: clicked.action_id.clone(),
            value: clicked.value.clone(),
        };
        service.handle_block_action(&click, &ctx).await.expect("click");

        let ended = completion.ended.lock().expect("lock");
        assert_eq!(ended.len(), 1);
        let Some(PromptValue::Choice(choice)) = &ended[0].2.value else {
            panic!("expected a choice value");
        };
        assert_eq!(choice.label, "Green");
        assert_eq!(choice.ordinal(), 2);
    }

    #[tokio::test]
    async fn button_labelled_with_a_cancel_phrase_cancels() {
        let store = InMemoryDialogStore::default();
        let completion = Arc::new(RecordingCompletion::default());
        let service = service(store.clone(), completion.clone());
        let ctx = EventContext::default();

        let first = service
            .start(
                &ThreadKey::new("C1", "T1"),
                PromptSpec::choice("Which team?", ChoiceSource::from("Front desk|Back office")),
                &ctx,
            )
            .await
            .expect("start");
        let Some(Block::Actions { elements, .. }) = first.blocks.get(1) else {
            panic!("expected buttons for a short choice list");
        };

        let click = BlockActionEvent {
            channel_id: "C1".to_owned(),
            message_ts: "M9".to_owned(),
            thread_ts: Some("T1".to_owned()),
            user_id: "U1".to_owned(),
            action_id: elements[1].action_id.clone(),
            value: elements[1].value.clone(),
        };
        service.handle_block_action(&click, &ctx).await.expect("click");

        let ended = completion.ended.lock().expect("lock");
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].1, PromptPhase::Canceled);
        assert_eq!(ended[0].2.resumed, ResumeReason::Canceled);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn messages_without_an_active_prompt_are_ignored() {
        let store = InMemoryDialogStore::default();
        let service = service(store, Arc::new(RecordingCompletion::default()));

        let result =
            service.handle_thread_message(&reply("hello"), &EventContext::default()).await.expect("reply");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unrelated_block_actions_are_ignored() {
        let store = InMemoryDialogStore::default();
        let completion = Arc::new(RecordingCompletion::default());
        let service = service(store.clone(), completion.clone());
        let ctx = EventContext::default();
        service
            .start(&ThreadKey::new("C1", "T1"), PromptSpec::confirm("Ship it?"), &ctx)
            .await
            .expect("start");

        let click = BlockActionEvent {
            channel_id: "C1".to_owned(),
            message_ts: "T1".to_owned(),
            thread_ts: None,
            user_id: "U1".to_owned(),
            action_id: "release.approve.v1".to_owned(),
            value: Some("yes".to_owned()),
        };
        assert!(service.handle_block_action(&click, &ctx).await.expect("click").is_none());
        assert_eq!(store.len(), 1);
        assert!(completion.ended.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn invalid_prompt_is_rejected_before_anything_is_stored() {
        let store = InMemoryDialogStore::default();
        let service = service(store.clone(), Arc::new(RecordingCompletion::default()));

        let error = service
            .start(
                &ThreadKey::new("C1", "T1"),
                PromptSpec::choice("Pick one.", ChoiceSource::List(Vec::new())),
                &EventContext::default(),
            )
            .await
            .expect_err("empty choices");

        assert!(matches!(error, EventHandlerError::Application(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn cancel_phrase_ends_the_prompt_with_acknowledgement() {
        let store = InMemoryDialogStore::default();
        let service = PromptThreadService::new(PromptDialog::default(), Arc::new(store.clone()));
        let ctx = EventContext::default();
        service
            .start(&ThreadKey::new("C1", "T1"), PromptSpec::text("What's the project name?"), &ctx)
            .await
            .expect("start");

        let message =
            service.handle_thread_message(&reply("never mind"), &ctx).await.expect("reply");
        assert_eq!(
            message.map(|message| message.fallback_text),
            Some("Okay, I've stopped asking.".to_owned())
        );
        assert!(store.is_empty());
    }
}
