use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::{BasicEntityRecognizer, DEFAULT_MATCH_THRESHOLD};
use crate::prompts::{
    CancellationDetector, InterpreterRegistry, PromptDialog, PromptRecognizer, PromptRenderer,
    VariantSelector, DEFAULT_CANCEL_PHRASES, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_APOLOGY,
};

/// Slack caps an actions block at 25 elements.
pub const SLACK_MAX_BUTTONS_LIMIT: usize = 25;
const MAX_RETRIES_LIMIT: u32 = 20;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub prompts: PromptsConfig,
    pub slack: SlackConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct PromptsConfig {
    pub default_max_retries: u32,
    pub retry_apology: String,
    pub match_threshold: f64,
    pub cancel_phrases: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub max_buttons: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub default_max_retries: Option<u32>,
    pub retry_apology: Option<String>,
    pub slack_max_buttons: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prompts: PromptsConfig {
                default_max_retries: DEFAULT_MAX_RETRIES,
                retry_apology: DEFAULT_RETRY_APOLOGY.to_string(),
                match_threshold: DEFAULT_MATCH_THRESHOLD,
                cancel_phrases: DEFAULT_CANCEL_PHRASES.iter().map(|phrase| phrase.to_string()).collect(),
            },
            slack: SlackConfig { max_buttons: 5 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl PromptsConfig {
    pub fn cancellation_detector(&self) -> CancellationDetector {
        CancellationDetector::new(&self.cancel_phrases)
    }

    pub fn recognizer(&self) -> PromptRecognizer {
        PromptRecognizer::new(
            self.cancellation_detector(),
            InterpreterRegistry::default(),
            Arc::new(BasicEntityRecognizer::new(self.match_threshold)),
        )
    }

    pub fn dialog(&self, selector: Arc<dyn VariantSelector>) -> PromptDialog {
        PromptDialog::new(
            Arc::new(self.recognizer()),
            PromptRenderer::new(selector, self.retry_apology.clone()),
        )
        .with_default_max_retries(self.default_max_retries)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("parley.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(prompts) = patch.prompts {
            if let Some(default_max_retries) = prompts.default_max_retries {
                self.prompts.default_max_retries = default_max_retries;
            }
            if let Some(retry_apology) = prompts.retry_apology {
                self.prompts.retry_apology = retry_apology;
            }
            if let Some(match_threshold) = prompts.match_threshold {
                self.prompts.match_threshold = match_threshold;
            }
            if let Some(cancel_phrases) = prompts.cancel_phrases {
                self.prompts.cancel_phrases = cancel_phrases;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(max_buttons) = slack.max_buttons {
                self.slack.max_buttons = max_buttons;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PARLEY_PROMPTS_DEFAULT_MAX_RETRIES") {
            self.prompts.default_max_retries =
                parse_u32("PARLEY_PROMPTS_DEFAULT_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("PARLEY_PROMPTS_RETRY_APOLOGY") {
            self.prompts.retry_apology = value;
        }
        if let Some(value) = read_env("PARLEY_PROMPTS_MATCH_THRESHOLD") {
            self.prompts.match_threshold = parse_f64("PARLEY_PROMPTS_MATCH_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("PARLEY_PROMPTS_CANCEL_PHRASES") {
            self.prompts.cancel_phrases = value
                .split(',')
                .map(str::trim)
                .filter(|phrase| !phrase.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(value) = read_env("PARLEY_SLACK_MAX_BUTTONS") {
            self.slack.max_buttons = parse_usize("PARLEY_SLACK_MAX_BUTTONS", &value)?;
        }

        let log_level = read_env("PARLEY_LOGGING_LEVEL").or_else(|| read_env("PARLEY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PARLEY_LOGGING_FORMAT").or_else(|| read_env("PARLEY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(default_max_retries) = overrides.default_max_retries {
            self.prompts.default_max_retries = default_max_retries;
        }
        if let Some(retry_apology) = overrides.retry_apology {
            self.prompts.retry_apology = retry_apology;
        }
        if let Some(max_buttons) = overrides.slack_max_buttons {
            self.slack.max_buttons = max_buttons;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_prompts(&self.prompts)?;
        validate_slack(&self.slack)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("parley.toml"), PathBuf::from("config/parley.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_prompts(prompts: &PromptsConfig) -> Result<(), ConfigError> {
    if prompts.default_max_retries > MAX_RETRIES_LIMIT {
        return Err(ConfigError::Validation(format!(
            "prompts.default_max_retries must be in range 0..={MAX_RETRIES_LIMIT}"
        )));
    }

    if !(prompts.match_threshold > 0.0 && prompts.match_threshold <= 1.0) {
        return Err(ConfigError::Validation(
            "prompts.match_threshold must be greater than 0 and at most 1".to_string(),
        ));
    }

    if prompts.cancel_phrases.iter().any(|phrase| phrase.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "prompts.cancel_phrases must not contain blank phrases".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.max_buttons > SLACK_MAX_BUTTONS_LIMIT {
        return Err(ConfigError::Validation(format!(
            "slack.max_buttons must be in range 0..={SLACK_MAX_BUTTONS_LIMIT} (Slack actions block limit)"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    prompts: Option<PromptsPatch>,
    slack: Option<SlackPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptsPatch {
    default_max_retries: Option<u32>,
    retry_apology: Option<String>,
    match_threshold: Option<f64>,
    cancel_phrases: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    max_buttons: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
