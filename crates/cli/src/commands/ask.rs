use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use parley_core::channel::StaticCapabilities;
use parley_core::config::{AppConfig, LoadOptions};
use parley_core::errors::ConfigurationError;
use parley_core::prompts::{
    expand_choices, ChoiceSource, ListStyle, NeverClaim, OutboundMessage, PromptContent,
    PromptDialog, PromptKind, PromptOptions, PromptPhase, PromptSpec, RandomSelector,
    RecognitionOutcome, TurnContext, TurnOutcome,
};
use serde::Serialize;
use tracing::info;

use crate::commands::CommandResult;

/// A terminal has no buttons.
const TERMINAL: StaticCapabilities = StaticCapabilities(0);

#[derive(Debug, Clone, Args)]
pub struct AskArgs {
    #[arg(long, help = "Expected answer: text|number|confirm|choice|date_time")]
    pub kind: PromptKind,
    #[arg(long, help = "Prompt text shown to the user")]
    pub prompt: String,
    #[arg(long, help = "Choice labels separated by `|`, e.g. \"Red|Green|Blue\"")]
    pub choices: Option<String>,
    #[arg(long, help = "Text shown instead of the prompt when re-asking")]
    pub retry_prompt: Option<String>,
    #[arg(long, help = "Re-prompts allowed before giving up")]
    pub max_retries: Option<u32>,
    #[arg(long, help = "Choice layout: none|inline|list|button|auto")]
    pub list_style: Option<ListStyle>,
    #[arg(long, help = "Reference instant for relative dates, epoch milliseconds")]
    pub reference_date: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AskReport<'a> {
    command: &'static str,
    status: &'static str,
    phase: PromptPhase,
    outcome: &'a RecognitionOutcome,
}

pub fn run<R: BufRead, W: Write>(args: AskArgs, input: R, output: &mut W) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    crate::init_logging(&config);

    let spec = match build_spec(args) {
        Ok(spec) => spec,
        Err(error) => return CommandResult::failure("ask", "invalid_prompt", error.to_string(), 2),
    };

    let dialog = config.prompts.dialog(Arc::new(RandomSelector));
    run_dialog(&dialog, spec, input, output)
}

/// Drives one dialog to its end over a line-oriented transcript.
pub fn run_dialog<R: BufRead, W: Write>(
    dialog: &PromptDialog,
    spec: PromptSpec,
    input: R,
    output: &mut W,
) -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    runtime.block_on(converse(dialog, spec, input, output))
}

pub fn build_spec(args: AskArgs) -> Result<PromptSpec, ConfigurationError> {
    let mut spec = PromptSpec::new(args.kind, args.prompt);
    if let Some(choices) = args.choices {
        spec.choices = expand_choices(ChoiceSource::Delimited(choices));
    }

    spec.with_options(PromptOptions {
        retry_prompt: args.retry_prompt.map(PromptContent::from),
        max_retries: args.max_retries,
        reference_date: args.reference_date,
        list_style: args.list_style,
    })
}

async fn converse<R: BufRead, W: Write>(
    dialog: &PromptDialog,
    spec: PromptSpec,
    mut input: R,
    output: &mut W,
) -> CommandResult {
    let arbiter = NeverClaim;
    let turn = TurnContext::new(&TERMINAL, &arbiter);

    let start = match dialog.begin(spec, &turn) {
        Ok(start) => start,
        Err(error) => return CommandResult::failure("ask", "invalid_prompt", error.to_string(), 2),
    };
    let mut state = start.state;
    if let Err(error) = say(output, &start.message) {
        return CommandResult::failure("ask", "io", format!("{error:#}"), 3);
    }

    loop {
        let reply = match read_reply(&mut input) {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                return CommandResult::failure(
                    "ask",
                    "input_closed",
                    "input ended before the prompt finished",
                    4,
                );
            }
            Err(error) => return CommandResult::failure("ask", "io", format!("{error:#}"), 3),
        };

        match dialog.on_reply(&mut state, &reply, &turn).await {
            Ok(TurnOutcome::Yielded) => {}
            Ok(TurnOutcome::Retry { message, .. }) => {
                if let Err(error) = say(output, &message) {
                    return CommandResult::failure("ask", "io", format!("{error:#}"), 3);
                }
            }
            Ok(TurnOutcome::Ended { phase, outcome }) => return report(phase, &outcome),
            Err(error) => return CommandResult::failure("ask", "dialog", error.to_string(), 5),
        }
    }
}

fn report(phase: PromptPhase, outcome: &RecognitionOutcome) -> CommandResult {
    let (status, exit_code) = match phase {
        PromptPhase::Completed => ("ok", 0),
        PromptPhase::Canceled => ("canceled", 1),
        PromptPhase::NotCompletedExhausted => ("not_completed", 1),
        PromptPhase::Failed => ("failed", 5),
        PromptPhase::Prompting | PromptPhase::WaitingForReply => ("pending", 5),
    };
    info!(event_name = "cli.ask.finished", status, kind = outcome.kind.as_str(), "prompt finished");

    CommandResult::report(exit_code, &AskReport { command: "ask", status, phase, outcome })
}

fn say<W: Write>(output: &mut W, message: &OutboundMessage) -> anyhow::Result<()> {
    writeln!(output, "{}", message.text).context("writing prompt")?;
    for action in &message.actions {
        writeln!(output, "  [{}]", action.title).context("writing prompt actions")?;
    }
    output.flush().context("flushing prompt")
}

fn read_reply<R: BufRead>(input: &mut R) -> anyhow::Result<Option<String>> {
    let mut line = String::new();
    let read = input.read_line(&mut line).context("reading reply")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string()))
}
