use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use parley_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct ConfigSources {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let path = detect_config_path();
    let doc = load_config_file_doc(path.as_deref());
    let sources = ConfigSources { path, doc };

    let prompts = &config.prompts;
    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        sources.line(
            "prompts.default_max_retries",
            &prompts.default_max_retries.to_string(),
            &["PARLEY_PROMPTS_DEFAULT_MAX_RETRIES"],
        ),
        sources.line(
            "prompts.retry_apology",
            &format!("{:?}", prompts.retry_apology),
            &["PARLEY_PROMPTS_RETRY_APOLOGY"],
        ),
        sources.line(
            "prompts.match_threshold",
            &prompts.match_threshold.to_string(),
            &["PARLEY_PROMPTS_MATCH_THRESHOLD"],
        ),
        sources.line(
            "prompts.cancel_phrases",
            &format!("[{}]", prompts.cancel_phrases.join(", ")),
            &["PARLEY_PROMPTS_CANCEL_PHRASES"],
        ),
        sources.line(
            "slack.max_buttons",
            &config.slack.max_buttons.to_string(),
            &["PARLEY_SLACK_MAX_BUTTONS"],
        ),
        sources.line(
            "logging.level",
            &config.logging.level,
            &["PARLEY_LOGGING_LEVEL", "PARLEY_LOG_LEVEL"],
        ),
        sources.line(
            "logging.format",
            &format!("{:?}", config.logging.format),
            &["PARLEY_LOGGING_FORMAT", "PARLEY_LOG_FORMAT"],
        ),
    ];

    lines.join("\n")
}

impl ConfigSources {
    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        format!("- {key_path} = {value} (source: {})", self.source(key_path, env_keys))
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        let from_env = env_keys
            .iter()
            .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
        if let Some(env_key) = from_env {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("parley.toml"), PathBuf::from("config/parley.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
