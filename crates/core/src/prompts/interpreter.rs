use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::entities::EntityRecognizer;
use crate::errors::RecognitionError;
use crate::prompts::types::{FoundChoice, PromptKind, PromptValue};

pub const TEXT_SCORE: f64 = 0.1;

#[derive(Clone, Copy, Debug)]
pub struct InterpretRequest<'a> {
    pub kind: PromptKind,
    /// Already trimmed.
    pub utterance: &'a str,
    pub choices: &'a [String],
    pub reference_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Interpretation {
    pub value: Option<PromptValue>,
    /// In `[0, 1]`; zero means nothing was recognized.
    pub score: f64,
}

impl Interpretation {
    pub fn unrecognized() -> Self {
        Self { value: None, score: 0.0 }
    }

    pub fn recognized(value: PromptValue, score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        if score == 0.0 {
            return Self::unrecognized();
        }
        Self { value: Some(value), score }
    }

    pub fn is_recognized(&self) -> bool {
        self.score > 0.0
    }
}

pub trait UtteranceInterpreter: Send + Sync {
    fn interpret(
        &self,
        request: &InterpretRequest<'_>,
        entities: &dyn EntityRecognizer,
    ) -> Result<Interpretation, RecognitionError>;
}

/// Open-ended answers: always captured, with a deliberately weak score so any outer
/// claimant with real confidence wins arbitration.
#[derive(Clone, Debug, Default)]
pub struct TextInterpreter;

impl UtteranceInterpreter for TextInterpreter {
    fn interpret(
        &self,
        request: &InterpretRequest<'_>,
        _entities: &dyn EntityRecognizer,
    ) -> Result<Interpretation, RecognitionError> {
        Ok(Interpretation::recognized(PromptValue::Text(request.utterance.to_string()), TEXT_SCORE))
    }
}

#[derive(Clone, Debug, Default)]
pub struct NumberInterpreter;

impl UtteranceInterpreter for NumberInterpreter {
    fn interpret(
        &self,
        request: &InterpretRequest<'_>,
        entities: &dyn EntityRecognizer,
    ) -> Result<Interpretation, RecognitionError> {
        let Some(entity) = entities.parse_number(request.utterance) else {
            return Ok(Interpretation::unrecognized());
        };
        if !entity.value.is_finite() {
            return Ok(Interpretation::unrecognized());
        }

        let score = coverage(&entity.matched, request.utterance);
        Ok(Interpretation::recognized(PromptValue::Number(entity.value), score))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfirmInterpreter;

impl UtteranceInterpreter for ConfirmInterpreter {
    fn interpret(
        &self,
        request: &InterpretRequest<'_>,
        entities: &dyn EntityRecognizer,
    ) -> Result<Interpretation, RecognitionError> {
        Ok(match entities.parse_boolean(request.utterance) {
            Some(answer) => Interpretation::recognized(PromptValue::Confirm(answer), 1.0),
            None => Interpretation::unrecognized(),
        })
    }
}

/// Fuzzy label match first, then a 1-based ordinal ("2" picks the second choice).
#[derive(Clone, Debug, Default)]
pub struct ChoiceInterpreter;

impl UtteranceInterpreter for ChoiceInterpreter {
    fn interpret(
        &self,
        request: &InterpretRequest<'_>,
        entities: &dyn EntityRecognizer,
    ) -> Result<Interpretation, RecognitionError> {
        if let Some(found) = entities.find_best_match(request.choices, request.utterance) {
            let score = found.score;
            return Ok(Interpretation::recognized(PromptValue::Choice(found), score));
        }

        let ordinal = request.utterance.parse::<usize>().ok();
        let found = ordinal
            .filter(|ordinal| (1..=request.choices.len()).contains(ordinal))
            .map(|ordinal| FoundChoice {
                index: ordinal - 1,
                label: request.choices[ordinal - 1].clone(),
                score: 1.0,
            });

        Ok(match found {
            Some(found) => Interpretation::recognized(PromptValue::Choice(found), 1.0),
            None => Interpretation::unrecognized(),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct DateTimeInterpreter;

impl UtteranceInterpreter for DateTimeInterpreter {
    fn interpret(
        &self,
        request: &InterpretRequest<'_>,
        entities: &dyn EntityRecognizer,
    ) -> Result<Interpretation, RecognitionError> {
        let Some(entity) = entities.recognize_date_time(request.utterance, request.reference_date)
        else {
            return Ok(Interpretation::unrecognized());
        };

        let score = coverage(&entity.matched, request.utterance);
        Ok(Interpretation::recognized(PromptValue::DateTime(entity), score))
    }
}

/// Share of the utterance covered by the recognized span, in characters.
fn coverage(matched: &str, utterance: &str) -> f64 {
    let total = utterance.chars().count();
    if total == 0 {
        return 0.0;
    }
    matched.chars().count() as f64 / total as f64
}

/// Interpreter lookup keyed by prompt kind.
#[derive(Clone)]
pub struct InterpreterRegistry {
    interpreters: HashMap<PromptKind, Arc<dyn UtteranceInterpreter>>,
}

impl Default for InterpreterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(PromptKind::Text, TextInterpreter);
        registry.register(PromptKind::Number, NumberInterpreter);
        registry.register(PromptKind::Confirm, ConfirmInterpreter);
        registry.register(PromptKind::Choice, ChoiceInterpreter);
        registry.register(PromptKind::DateTime, DateTimeInterpreter);
        registry
    }
}

impl InterpreterRegistry {
    pub fn empty() -> Self {
        Self { interpreters: HashMap::new() }
    }

    pub fn register<I>(&mut self, kind: PromptKind, interpreter: I)
    where
        I: UtteranceInterpreter + 'static,
    {
        self.interpreters.insert(kind, Arc::new(interpreter));
    }

    pub fn get(&self, kind: PromptKind) -> Option<&Arc<dyn UtteranceInterpreter>> {
        self.interpreters.get(&kind)
    }

    pub fn interpret(
        &self,
        request: &InterpretRequest<'_>,
        entities: &dyn EntityRecognizer,
    ) -> Result<Interpretation, RecognitionError> {
        let interpreter =
            self.get(request.kind).ok_or(RecognitionError::MissingInterpreter(request.kind))?;
        interpreter.interpret(request, entities)
    }

    pub fn len(&self) -> usize {
        self.interpreters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interpreters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{InterpretRequest, Interpretation, InterpreterRegistry, TEXT_SCORE};
    use crate::entities::BasicEntityRecognizer;
    use crate::errors::RecognitionError;
    use crate::prompts::types::{PromptKind, PromptValue};

    fn interpret(kind: PromptKind, utterance: &str, choices: &[String]) -> Interpretation {
        InterpreterRegistry::default()
            .interpret(
                &InterpretRequest { kind, utterance, choices, reference_date: None },
                &BasicEntityRecognizer::default(),
            )
            .expect("default interpreters do not fail")
    }

    fn colors() -> Vec<String> {
        vec!["Red".to_string(), "Green".to_string(), "Blue".to_string()]
    }

    #[test]
    fn text_is_always_a_weak_capture() {
        let result = interpret(PromptKind::Text, "anything at all", &[]);
        assert_eq!(result.score, TEXT_SCORE);
        assert_eq!(result.value, Some(PromptValue::Text("anything at all".to_string())));
    }

    #[test]
    fn number_score_is_token_coverage() {
        let result = interpret(PromptKind::Number, "12345", &[]);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.value, Some(PromptValue::Number(12345.0)));

        let partial = interpret(PromptKind::Number, "I want 42 please", &[]);
        assert_eq!(partial.score, 2.0 / 16.0);
        assert_eq!(partial.value, Some(PromptValue::Number(42.0)));

        let miss = interpret(PromptKind::Number, "lots", &[]);
        assert_eq!(miss, Interpretation::unrecognized());
    }

    #[test]
    fn confirm_is_all_or_nothing() {
        for (utterance, expected) in
            [("yes", true), ("Y", true), ("true", true), ("no", false), ("N", false), ("FALSE", false)]
        {
            let result = interpret(PromptKind::Confirm, utterance, &[]);
            assert_eq!(result.score, 1.0, "{utterance}");
            assert_eq!(result.value, Some(PromptValue::Confirm(expected)), "{utterance}");
        }

        assert_eq!(interpret(PromptKind::Confirm, "perhaps", &[]).score, 0.0);
    }

    #[test]
    fn choice_ordinal_fallback() {
        let result = interpret(PromptKind::Choice, "2", &colors());
        let Some(PromptValue::Choice(found)) = result.value else {
            panic!("expected a choice value");
        };
        assert_eq!(found.ordinal(), 2);
        assert_eq!(found.index, 1);
        assert_eq!(found.label, "Green");
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn choice_fuzzy_match_is_case_insensitive() {
        let result = interpret(PromptKind::Choice, "gReEn", &colors());
        assert!(result.score > 0.0);
        assert!(matches!(result.value, Some(PromptValue::Choice(ref found)) if found.label == "Green"));
    }

    #[test]
    fn choice_out_of_range_ordinal_is_unrecognized() {
        assert!(!interpret(PromptKind::Choice, "4", &colors()).is_recognized());
        assert!(!interpret(PromptKind::Choice, "0", &colors()).is_recognized());
    }

    #[test]
    fn date_time_score_is_span_coverage() {
        let reference = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).single().expect("reference");
        let result = InterpreterRegistry::default()
            .interpret(
                &InterpretRequest {
                    kind: PromptKind::DateTime,
                    utterance: "tomorrow",
                    choices: &[],
                    reference_date: Some(reference),
                },
                &BasicEntityRecognizer::default(),
            )
            .expect("interpret");
        assert_eq!(result.score, 1.0);

        let partial = interpret(PromptKind::DateTime, "maybe tomorrow", &[]);
        assert_eq!(partial.score, 8.0 / 14.0);
    }

    #[test]
    fn missing_interpreter_is_an_error() {
        let error = InterpreterRegistry::empty()
            .interpret(
                &InterpretRequest {
                    kind: PromptKind::Number,
                    utterance: "1",
                    choices: &[],
                    reference_date: None,
                },
                &BasicEntityRecognizer::default(),
            )
            .expect_err("empty registry has no interpreters");
        assert_eq!(error, RecognitionError::MissingInterpreter(PromptKind::Number));
        assert_eq!(InterpreterRegistry::default().len(), 5);
    }
}
