use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

pub const DEFAULT_MAX_RETRIES: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Text,
    Number,
    Confirm,
    Choice,
    DateTime,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Confirm => "confirm",
            Self::Choice => "choice",
            Self::DateTime => "date_time",
        }
    }
}

impl std::str::FromStr for PromptKind {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "confirm" => Ok(Self::Confirm),
            "choice" => Ok(Self::Choice),
            "date_time" | "datetime" | "time" => Ok(Self::DateTime),
            other => Err(ConfigurationError::UnsupportedValue {
                field: "prompt_kind",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStyle {
    None,
    Inline,
    List,
    Button,
    Auto,
}

impl std::str::FromStr for ListStyle {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "inline" => Ok(Self::Inline),
            "list" => Ok(Self::List),
            "button" | "buttons" => Ok(Self::Button),
            "auto" => Ok(Self::Auto),
            other => Err(ConfigurationError::UnsupportedValue {
                field: "list_style",
                value: other.to_string(),
            }),
        }
    }
}

/// A selectable action attached to an outbound message (a quick-reply button).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub title: String,
    pub value: String,
}

impl SuggestedAction {
    pub fn im_back(label: impl Into<String>) -> Self {
        let label = label.into();
        Self { title: label.clone(), value: label }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<SuggestedAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), actions: Vec::new(), language: None }
    }

    pub fn with_actions(mut self, actions: Vec<SuggestedAction>) -> Self {
        self.actions = actions;
        self
    }
}

/// Prompt wording. `Variants` holds equivalent phrasings of which one is picked per render;
/// `Message` is sent as composed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PromptContent {
    Text(String),
    Variants(Vec<String>),
    Message(OutboundMessage),
}

impl From<&str> for PromptContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PromptContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for PromptContent {
    fn from(value: Vec<String>) -> Self {
        Self::Variants(value)
    }
}

impl From<OutboundMessage> for PromptContent {
    fn from(value: OutboundMessage) -> Self {
        Self::Message(value)
    }
}

/// The recognized option keys for a prompt. Anything else is rejected at parse time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PromptOptions {
    #[serde(default)]
    pub retry_prompt: Option<PromptContent>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Epoch timestamp in milliseconds.
    #[serde(default)]
    pub reference_date: Option<i64>,
    #[serde(default)]
    pub list_style: Option<ListStyle>,
}

impl PromptOptions {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigurationError> {
        serde_json::from_value(value)
            .map_err(|error| ConfigurationError::InvalidOptions(error.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub kind: PromptKind,
    pub prompt: PromptContent,
    #[serde(default)]
    pub retry_prompt: Option<PromptContent>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub reference_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub list_style: Option<ListStyle>,
    #[serde(default)]
    pub choices: Vec<String>,
}

impl PromptSpec {
    pub fn new(kind: PromptKind, prompt: impl Into<PromptContent>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            retry_prompt: None,
            max_retries: None,
            reference_date: None,
            list_style: None,
            choices: Vec::new(),
        }
    }

    pub fn text(prompt: impl Into<PromptContent>) -> Self {
        Self::new(PromptKind::Text, prompt)
    }

    pub fn number(prompt: impl Into<PromptContent>) -> Self {
        Self::new(PromptKind::Number, prompt)
    }

    pub fn confirm(prompt: impl Into<PromptContent>) -> Self {
        Self::new(PromptKind::Confirm, prompt)
    }

    pub fn date_time(prompt: impl Into<PromptContent>) -> Self {
        Self::new(PromptKind::DateTime, prompt)
    }

    pub fn choice(prompt: impl Into<PromptContent>, source: ChoiceSource) -> Self {
        let mut spec = Self::new(PromptKind::Choice, prompt);
        spec.choices = expand_choices(source);
        spec
    }

    pub fn retry_prompt(mut self, retry_prompt: impl Into<PromptContent>) -> Self {
        self.retry_prompt = Some(retry_prompt.into());
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn reference_date(mut self, reference_date: DateTime<Utc>) -> Self {
        self.reference_date = Some(reference_date);
        self
    }

    pub fn list_style(mut self, list_style: ListStyle) -> Self {
        self.list_style = Some(list_style);
        self
    }

    pub fn with_options(mut self, options: PromptOptions) -> Result<Self, ConfigurationError> {
        if let Some(retry_prompt) = options.retry_prompt {
            self.retry_prompt = Some(retry_prompt);
        }
        if let Some(max_retries) = options.max_retries {
            self.max_retries = Some(max_retries);
        }
        if let Some(millis) = options.reference_date {
            let reference = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or(ConfigurationError::InvalidReferenceDate(millis))?;
            self.reference_date = Some(reference);
        }
        if let Some(list_style) = options.list_style {
            self.list_style = Some(list_style);
        }
        Ok(self)
    }

    /// Applies defaults and checks the prompt can be run. Called once when a dialog begins.
    pub fn normalize(mut self, default_max_retries: u32) -> Result<Self, ConfigurationError> {
        self.validate()?;
        if self.max_retries.is_none() {
            self.max_retries = Some(default_max_retries);
        }
        if self.kind == PromptKind::Choice && self.list_style.is_none() {
            self.list_style = Some(ListStyle::Auto);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_content("prompt", &self.prompt)?;
        if let Some(retry_prompt) = &self.retry_prompt {
            validate_content("retry_prompt", retry_prompt)?;
        }

        if self.kind == PromptKind::Choice {
            if self.choices.is_empty() {
                return Err(ConfigurationError::EmptyChoices);
            }
            if let Some(position) = self.choices.iter().position(|label| label.trim().is_empty()) {
                return Err(ConfigurationError::BlankChoiceLabel { position });
            }
        }

        Ok(())
    }

    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }
}

fn validate_content(field: &'static str, content: &PromptContent) -> Result<(), ConfigurationError> {
    match content {
        PromptContent::Variants(variants) if variants.is_empty() => {
            Err(ConfigurationError::EmptyVariants { field })
        }
        _ => Ok(()),
    }
}

/// Where a choice prompt's labels come from.
#[derive(Clone, Debug, PartialEq)]
pub enum ChoiceSource {
    /// `"red|green|blue"`
    Delimited(String),
    /// The keys of a JSON object, in document order.
    Keys(serde_json::Map<String, serde_json::Value>),
    List(Vec<String>),
}

impl From<&str> for ChoiceSource {
    fn from(value: &str) -> Self {
        Self::Delimited(value.to_string())
    }
}

impl From<Vec<String>> for ChoiceSource {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for ChoiceSource {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

pub fn expand_choices(source: ChoiceSource) -> Vec<String> {
    match source {
        ChoiceSource::Delimited(raw) => raw
            .split('|')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect(),
        ChoiceSource::Keys(map) => map.keys().cloned().collect(),
        ChoiceSource::List(labels) => labels,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoundChoice {
    /// Zero-based position in the candidate list.
    pub index: usize,
    pub label: String,
    pub score: f64,
}

impl FoundChoice {
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDateTime {
    pub resolved: DateTime<Utc>,
    pub matched: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PromptValue {
    Text(String),
    Number(f64),
    Confirm(bool),
    Choice(FoundChoice),
    DateTime(ResolvedDateTime),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        expand_choices, ChoiceSource, ListStyle, PromptContent, PromptKind, PromptOptions,
        PromptSpec,
    };
    use crate::errors::ConfigurationError;

    #[test]
    fn delimited_choices_are_trimmed_and_ordered() {
        let labels = expand_choices(ChoiceSource::from(" Red | Green ||Blue "));
        assert_eq!(labels, vec!["Red", "Green", "Blue"]);
    }

    #[test]
    fn object_keys_expand_in_document_order() {
        let map = json!({ "small": 1, "medium": 2, "large": 3 });
        let labels = expand_choices(ChoiceSource::Keys(
            map.as_object().cloned().expect("object literal"),
        ));
        assert_eq!(labels, vec!["small", "medium", "large"]);
    }

    #[test]
    fn normalize_applies_defaults() {
        let spec = PromptSpec::choice("Pick one", ChoiceSource::from("a|b"))
            .normalize(1)
            .expect("valid spec");

        assert_eq!(spec.max_retries, Some(1));
        assert_eq!(spec.list_style, Some(ListStyle::Auto));
    }

    #[test]
    fn normalize_keeps_explicit_zero_retries() {
        let spec = PromptSpec::number("How many?").max_retries(0).normalize(3).expect("valid");
        assert_eq!(spec.effective_max_retries(), 0);
        assert_eq!(spec.list_style, None);
    }

    #[test]
    fn empty_choice_list_is_a_configuration_error() {
        let error = PromptSpec::choice("Pick one", ChoiceSource::List(Vec::new()))
            .normalize(1)
            .expect_err("empty choices must be rejected");
        assert_eq!(error, ConfigurationError::EmptyChoices);
    }

    #[test]
    fn blank_choice_label_reports_its_position() {
        let error = PromptSpec::choice("Pick one", ChoiceSource::List(vec!["Red".into(), " ".into()]))
            .normalize(1)
            .expect_err("blank label must be rejected");
        assert_eq!(error, ConfigurationError::BlankChoiceLabel { position: 1 });
    }

    #[test]
    fn empty_variant_set_is_rejected() {
        let error = PromptSpec::text(PromptContent::Variants(Vec::new()))
            .validate()
            .expect_err("empty variants must be rejected");
        assert!(matches!(error, ConfigurationError::EmptyVariants { field: "prompt" }));
    }

    #[test]
    fn options_reject_unknown_keys() {
        let error = PromptOptions::from_json(json!({ "maxRetries": 2, "colour": "blue" }))
            .expect_err("unknown key must be rejected");
        assert!(matches!(error, ConfigurationError::InvalidOptions(ref message) if message.contains("colour")));
    }

    #[test]
    fn options_apply_reference_date_and_style() {
        let options = PromptOptions::from_json(json!({
            "retryPrompt": { "type": "text", "value": "Try again" },
            "maxRetries": 3,
            "referenceDate": 1_700_000_000_000_i64,
            "listStyle": "inline"
        }))
        .expect("options parse");

        let spec = PromptSpec::date_time("When?").with_options(options).expect("options apply");
        assert_eq!(spec.max_retries, Some(3));
        assert_eq!(spec.list_style, Some(ListStyle::Inline));
        assert_eq!(spec.retry_prompt, Some(PromptContent::Text("Try again".to_string())));
        assert_eq!(
            spec.reference_date.map(|date| date.timestamp_millis()),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn out_of_range_reference_date_is_rejected() {
        let error = PromptSpec::date_time("When?")
            .with_options(PromptOptions { reference_date: Some(i64::MAX), ..Default::default() })
            .expect_err("reference date beyond the calendar must be rejected");
        assert_eq!(error, ConfigurationError::InvalidReferenceDate(i64::MAX));
    }

    #[test]
    fn prompt_kind_parses_case_insensitively() {
        assert_eq!("Choice".parse::<PromptKind>(), Ok(PromptKind::Choice));
        assert_eq!("datetime".parse::<PromptKind>(), Ok(PromptKind::DateTime));
        assert!("colour".parse::<PromptKind>().is_err());
    }
}
