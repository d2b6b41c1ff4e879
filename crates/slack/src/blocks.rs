use parley_core::prompts::{OutboundMessage, PromptPhase};
use serde::Serialize;

/// Slack rejects actions blocks with more elements than this.
pub const ACTIONS_BLOCK_LIMIT: usize = 25;

pub const PROMPT_CHOICE_ACTION_PREFIX: &str = "prompt.choice.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), value: None }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        let elements = builder.build();
        if !elements.is_empty() {
            self.blocks.push(Block::Actions { block_id: block_id.into(), elements });
        }
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    /// Buttons past the actions block limit are dropped.
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        if self.elements.len() < ACTIONS_BLOCK_LIMIT {
            self.elements.push(button);
        }
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub fn prompt_choice_action_id(ordinal: usize) -> String {
    format!("{PROMPT_CHOICE_ACTION_PREFIX}{ordinal}.v1")
}

pub fn is_prompt_choice_action(action_id: &str) -> bool {
    action_id.starts_with(PROMPT_CHOICE_ACTION_PREFIX)
}

/// Renders an outbound prompt. Suggested actions become buttons whose value is sent back
/// as the reply when clicked.
///
/// A clicked value goes through cancellation like typed text, so a label that starts with a
/// cancel phrase (`"Back office"` against the default `back`) cancels the prompt instead of
/// selecting that choice. Keep such labels out of choice prompts or trim the phrase list.
pub fn prompt_message(message: &OutboundMessage) -> MessageTemplate {
    MessageBuilder::new(message.text.clone())
        .section("prompt.text.v1", |section| {
            section.plain(message.text.clone());
        })
        .actions("prompt.choices.v1", |actions| {
            for (position, action) in message.actions.iter().enumerate() {
                actions.button(
                    ButtonElement::new(prompt_choice_action_id(position + 1), action.title.clone())
                        .value(action.value.clone()),
                );
            }
        })
        .build()
}

/// Acknowledgement posted when a prompt ends without a completed answer.
pub fn prompt_closed_message(phase: PromptPhase) -> Option<MessageTemplate> {
    let text = match phase {
        PromptPhase::Canceled => "Okay, I've stopped asking.",
        PromptPhase::NotCompletedExhausted => "I still couldn't understand that, so let's move on.",
        PromptPhase::Failed => "Something went wrong while reading your answer.",
        PromptPhase::Completed | PromptPhase::Prompting | PromptPhase::WaitingForReply => {
            return None
        }
    };

    Some(
        MessageBuilder::new(text)
            .section("prompt.closed.v1", |section| {
                section.plain(text);
            })
            .build(),
    )
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("prompt.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("prompt.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}
