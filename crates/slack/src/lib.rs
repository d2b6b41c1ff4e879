//! Slack Integration - prompt dialogs in Slack threads
//!
//! This crate hosts `parley-core` prompt dialogs inside Slack threads:
//! - **Block Kit** (`blocks`) - renders outbound prompts as sections with choice buttons
//! - **Events** (`events`) - thread messages and button clicks, routed by `EventDispatcher`
//! - **Session** (`session`) - `PromptThreadService` keeps one prompt per thread in a
//!   `DialogStore` and reports finished prompts to a `PromptCompletionHandler`
//!
//! # Architecture
//!
//! ```text
//! Slack Events → EventDispatcher → PromptThreadService → PromptDialog
//!                    ↓                     ↓
//!              Block Kit UI ←      DialogStore / PromptCompletionHandler
//! ```
//!
//! Button clicks are replies: a choice button's value is fed to the dialog exactly as if the
//! user had typed the label.

pub mod blocks;
pub mod events;
pub mod session;

pub use events::{prompt_dispatcher, EventContext, EventDispatcher, HandlerResult};
pub use session::{
    AcknowledgeCompletion, PromptCompletionHandler, PromptThreadService, SlackCapabilities,
    ThreadKey,
};
