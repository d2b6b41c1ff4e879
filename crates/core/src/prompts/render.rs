use std::sync::Arc;

use rand::Rng;

use crate::channel::ChannelCapabilities;
use crate::prompts::types::{
    ListStyle, OutboundMessage, PromptContent, PromptKind, PromptSpec, SuggestedAction,
};

pub const DEFAULT_RETRY_APOLOGY: &str = "I didn't understand.";

/// Below this many choices an auto-styled prompt renders inline rather than as a list.
const INLINE_LIMIT: usize = 4;

/// Picks which phrasing variant to send.
pub trait VariantSelector: Send + Sync {
    /// Returns an index below `count`; `count` is never zero.
    fn select(&self, count: usize) -> usize;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSelector;

impl VariantSelector for RandomSelector {
    fn select(&self, count: usize) -> usize {
        rand::thread_rng().gen_range(0..count)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FixedSelector(pub usize);

impl VariantSelector for FixedSelector {
    fn select(&self, count: usize) -> usize {
        self.0 % count
    }
}

#[derive(Clone)]
pub struct PromptRenderer {
    selector: Arc<dyn VariantSelector>,
    retry_apology: String,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new(Arc::new(RandomSelector), DEFAULT_RETRY_APOLOGY)
    }
}

impl PromptRenderer {
    pub fn new(selector: Arc<dyn VariantSelector>, retry_apology: impl Into<String>) -> Self {
        Self { selector, retry_apology: retry_apology.into() }
    }

    pub fn render(
        &self,
        spec: &PromptSpec,
        is_retry: bool,
        channel: &dyn ChannelCapabilities,
        language: Option<&str>,
    ) -> OutboundMessage {
        let dedicated_retry = if is_retry { spec.retry_prompt.as_ref() } else { None };
        let content = dedicated_retry.unwrap_or(&spec.prompt);

        // Variants go out as picked; only plain text takes the apology.
        let text = match content {
            PromptContent::Message(message) => return message.clone(),
            PromptContent::Text(text) if is_retry && dedicated_retry.is_none() => {
                join_text(&self.retry_apology, text, " ")
            }
            PromptContent::Text(text) => text.clone(),
            PromptContent::Variants(variants) => self.pick(variants),
        };

        let mut message = OutboundMessage::text(text);
        message.language = language.map(str::to_string);

        if spec.kind != PromptKind::Choice {
            return message;
        }

        match self.presentation(spec, channel) {
            ListStyle::Button => {
                message.actions =
                    spec.choices.iter().map(|label| SuggestedAction::im_back(label.as_str())).collect();
            }
            ListStyle::Inline => {
                message.text = join_text(&message.text, &inline_list(&spec.choices), " ");
            }
            ListStyle::List => {
                message.text = join_text(&message.text, &numbered_lines(&spec.choices), "\n");
            }
            ListStyle::None | ListStyle::Auto => {}
        }
        message
    }

    /// Resolves `Auto` against the channel's button capacity. Never returns `Auto`.
    pub fn presentation(&self, spec: &PromptSpec, channel: &dyn ChannelCapabilities) -> ListStyle {
        match spec.list_style.unwrap_or(ListStyle::Auto) {
            ListStyle::Auto => {
                let capacity = channel.max_selectable_actions();
                let count = spec.choices.len();
                if capacity > 0 && count <= capacity {
                    ListStyle::Button
                } else if count < INLINE_LIMIT {
                    ListStyle::Inline
                } else {
                    ListStyle::List
                }
            }
            explicit => explicit,
        }
    }

    fn pick(&self, variants: &[String]) -> String {
        if variants.is_empty() {
            return String::new();
        }
        let index = self.selector.select(variants.len());
        variants.get(index).or_else(|| variants.first()).cloned().unwrap_or_default()
    }
}

fn join_text(head: &str, tail: &str, separator: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head}{separator}{tail}"),
    }
}

/// `1. Red, 2. Green, or 3. Blue`
fn inline_list(choices: &[String]) -> String {
    let entries = numbered(choices);
    match entries.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} or {second}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}

fn numbered_lines(choices: &[String]) -> String {
    numbered(choices).join("\n")
}

fn numbered(choices: &[String]) -> Vec<String> {
    choices.iter().enumerate().map(|(index, label)| format!("{}. {label}", index + 1)).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{FixedSelector, PromptRenderer, DEFAULT_RETRY_APOLOGY};
    use crate::channel::StaticCapabilities;
    use crate::prompts::types::{
        ChoiceSource, ListStyle, OutboundMessage, PromptContent, PromptSpec, SuggestedAction,
    };

    fn renderer() -> PromptRenderer {
        PromptRenderer::new(Arc::new(FixedSelector(0)), DEFAULT_RETRY_APOLOGY)
    }

    fn colors() -> PromptSpec {
        PromptSpec::choice("Pick a color.", ChoiceSource::from("Red|Green|Blue"))
    }

    #[test]
    fn auto_uses_buttons_when_channel_has_room() {
        let message = renderer().render(&colors(), false, &StaticCapabilities(5), None);

        assert_eq!(message.text, "Pick a color.");
        assert_eq!(message.actions.len(), 3);
        assert_eq!(message.actions[1], SuggestedAction::im_back("Green"));
    }

    #[test]
    fn auto_falls_back_to_inline_for_short_lists() {
        let message = renderer().render(&colors(), false, &StaticCapabilities(0), None);

        assert!(message.actions.is_empty());
        assert_eq!(message.text, "Pick a color. 1. Red, 2. Green, or 3. Blue");
    }

    #[test]
    fn auto_falls_back_to_numbered_list_for_long_lists() {
        let spec = PromptSpec::choice("Size?", ChoiceSource::from("XS|S|M|L|XL"));
        let message = renderer().render(&spec, false, &StaticCapabilities(0), None);

        let lines: Vec<&str> = message.text.lines().collect();
        assert_eq!(lines, vec!["Size?", "1. XS", "2. S", "3. M", "4. L", "5. XL"]);
    }

    #[test]
    fn capacity_smaller_than_choice_count_skips_buttons() {
        let spec = PromptSpec::choice("Size?", ChoiceSource::from("XS|S|M|L|XL"));
        let message = renderer().render(&spec, false, &StaticCapabilities(3), None);

        assert!(message.actions.is_empty());
        assert_eq!(message.text.lines().count(), 6);
    }

    #[test]
    fn inline_connector_for_two_and_one_choices() {
        let two = PromptSpec::choice("Ok?", ChoiceSource::from("Yes|No")).list_style(ListStyle::Inline);
        let message = renderer().render(&two, false, &StaticCapabilities(10), None);
        assert_eq!(message.text, "Ok? 1. Yes or 2. No");

        let one = PromptSpec::choice("Ok?", ChoiceSource::from("Fine")).list_style(ListStyle::Inline);
        let message = renderer().render(&one, false, &StaticCapabilities(0), None);
        assert_eq!(message.text, "Ok? 1. Fine");
    }

    #[test]
    fn explicit_styles_override_capacity() {
        let none = colors().list_style(ListStyle::None);
        let message = renderer().render(&none, false, &StaticCapabilities(5), None);
        assert_eq!(message, OutboundMessage::text("Pick a color."));

        let buttons = colors().list_style(ListStyle::Button);
        let message = renderer().render(&buttons, false, &StaticCapabilities(0), None);
        assert_eq!(message.actions.len(), 3);
    }

    #[test]
    fn retry_prepends_apology_without_dedicated_retry_prompt() {
        let spec = PromptSpec::number("How many seats?");
        let message = renderer().render(&spec, true, &StaticCapabilities(0), Some("en"));

        assert_eq!(message.text, "I didn't understand. How many seats?");
        assert_eq!(message.language.as_deref(), Some("en"));
    }

    #[test]
    fn retry_prefers_dedicated_variants() {
        let spec = PromptSpec::number("How many seats?").retry_prompt(PromptContent::Variants(vec![
            "Please give a number.".to_string(),
            "A number, like 10.".to_string(),
        ]));
        let renderer = PromptRenderer::new(Arc::new(FixedSelector(1)), DEFAULT_RETRY_APOLOGY);

        let message = renderer.render(&spec, true, &StaticCapabilities(0), None);
        assert_eq!(message.text, "A number, like 10.");
    }

    #[test]
    fn composed_messages_pass_through_untouched() {
        let composed = OutboundMessage::text("Choose a plan").with_actions(vec![SuggestedAction {
            title: "Pro".to_string(),
            value: "plan-pro".to_string(),
        }]);
        let spec = PromptSpec::choice(composed.clone(), ChoiceSource::from("Pro|Team"));

        assert_eq!(renderer().render(&spec, false, &StaticCapabilities(5), Some("fr")), composed);
        assert_eq!(renderer().render(&spec, true, &StaticCapabilities(0), None), composed);
    }

    #[test]
    fn rendering_is_deterministic_with_fixed_selector() {
        let spec = colors();
        let first = renderer().render(&spec, false, &StaticCapabilities(2), None);
        let second = renderer().render(&spec, false, &StaticCapabilities(2), None);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("serialize"),
            serde_json::to_string(&second).expect("serialize")
        );
    }

    #[test]
    fn variant_selection_follows_selector() {
        let spec = PromptSpec::text(PromptContent::Variants(vec![
            "What's your name?".to_string(),
            "Who am I talking to?".to_string(),
        ]));
        let renderer = PromptRenderer::new(Arc::new(FixedSelector(3)), DEFAULT_RETRY_APOLOGY);

        let message = renderer.render(&spec, false, &StaticCapabilities(0), None);
        assert_eq!(message.text, "Who am I talking to?");
    }

    #[test]
    fn variant_retry_is_sent_without_apology() {
        let spec = PromptSpec::text(PromptContent::Variants(vec![
            "What's your name?".to_string(),
            "Who am I talking to?".to_string(),
        ]));

        let message = renderer().render(&spec, true, &StaticCapabilities(0), None);
        assert_eq!(message.text, "What's your name?");
    }
}
