use std::env;
use std::io::Cursor;
use std::sync::{Mutex, OnceLock};

use parley_cli::commands::ask::{self, AskArgs};
use parley_cli::commands::config;
use parley_core::prompts::PromptKind;
use serde_json::Value;

#[test]
fn config_reports_defaults_without_overrides() {
    with_env(&[], || {
        let output = config::run();

        assert!(output.starts_with("effective config"));
        assert!(output.contains("- prompts.default_max_retries = 1 (source: default)"));
        assert!(output.contains("- slack.max_buttons = 5 (source: default)"));
    });
}

#[test]
fn config_attributes_env_overrides_including_aliases() {
    with_env(&[("PARLEY_SLACK_MAX_BUTTONS", "10"), ("PARLEY_LOG_LEVEL", "debug")], || {
        let output = config::run();

        assert!(output.contains("- slack.max_buttons = 10 (source: env (PARLEY_SLACK_MAX_BUTTONS))"));
        assert!(output.contains("- logging.level = debug (source: env (PARLEY_LOG_LEVEL))"));
    });
}

#[test]
fn config_surfaces_validation_failures() {
    with_env(&[("PARLEY_PROMPTS_MATCH_THRESHOLD", "1.5")], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"));
        assert!(output.contains("match_threshold"));
    });
}

#[test]
fn ask_honors_configured_retry_budget() {
    with_env(&[("PARLEY_PROMPTS_DEFAULT_MAX_RETRIES", "2")], || {
        let mut transcript = Vec::new();
        let result = ask::run(
            ask_args(PromptKind::Number, "How many seats?"),
            Cursor::new("lots\nmany\n40\n".to_string()),
            &mut transcript,
        );

        assert_eq!(result.exit_code, 0, "third reply should still be accepted");
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["outcome"]["value"]["value"], 40.0);

        let transcript = String::from_utf8(transcript).expect("utf8 transcript");
        assert_eq!(transcript.lines().count(), 3);
    });
}

#[test]
fn ask_uses_configured_cancel_phrases() {
    with_env(&[("PARLEY_PROMPTS_CANCEL_PHRASES", "quit, exit")], || {
        let mut transcript = Vec::new();
        let result = ask::run(
            ask_args(PromptKind::Text, "Project name?"),
            Cursor::new("quit\n".to_string()),
            &mut transcript,
        );

        let payload = parse_payload(&result.output);
        assert_eq!(result.exit_code, 1);
        assert_eq!(payload["status"], "canceled");
    });
}

#[test]
fn ask_fails_fast_on_invalid_config() {
    with_env(&[("PARLEY_SLACK_MAX_BUTTONS", "99")], || {
        let mut transcript = Vec::new();
        let result = ask::run(
            ask_args(PromptKind::Text, "Project name?"),
            Cursor::new("Apollo\n".to_string()),
            &mut transcript,
        );

        let payload = parse_payload(&result.output);
        assert_eq!(result.exit_code, 2);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(transcript.is_empty());
    });
}

fn ask_args(kind: PromptKind, prompt: &str) -> AskArgs {
    AskArgs {
        kind,
        prompt: prompt.to_string(),
        choices: None,
        retry_prompt: None,
        max_retries: None,
        list_style: None,
        reference_date: None,
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PARLEY_PROMPTS_DEFAULT_MAX_RETRIES",
        "PARLEY_PROMPTS_RETRY_APOLOGY",
        "PARLEY_PROMPTS_MATCH_THRESHOLD",
        "PARLEY_PROMPTS_CANCEL_PHRASES",
        "PARLEY_SLACK_MAX_BUTTONS",
        "PARLEY_LOGGING_LEVEL",
        "PARLEY_LOGGING_FORMAT",
        "PARLEY_LOG_LEVEL",
        "PARLEY_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
