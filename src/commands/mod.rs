//! Command dispatch module.
//!
//! The chat gateway delivers already-parsed slash-command events; this module
//! owns the envelope types, the immutable name-to-handler map, and the
//! declarative command catalog the gateway registers with the platform.

mod deck;

pub use deck::DECK_COMMAND_NAME;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::Repository;
use crate::models::Platform;

/// The user behind an inbound command event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    #[serde(default)]
    pub platform: Platform,
    pub id: String,
}

/// A single parsed slash-command invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEvent {
    pub command: String,
    #[serde(default)]
    pub subcommand: String,
    pub caller: Caller,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

impl CommandEvent {
    /// Positional string option accessor.
    pub fn str_option(&self, index: usize) -> Option<&str> {
        self.options.get(index).and_then(|o| o.value.as_str())
    }

    /// Positional integer option accessor.
    pub fn int_option(&self, index: usize) -> Option<i64> {
        self.options.get(index).and_then(|o| o.value.as_int())
    }
}

/// A named, typed option value as the gateway parsed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    pub value: OptionValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Str(String),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            OptionValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            OptionValue::Str(_) => None,
        }
    }
}

/// Outbound payload: plain text plus structured display cards. Exactly one
/// response is produced per handled inbound event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    pub text: String,
    #[serde(default)]
    pub cards: Vec<DisplayCard>,
}

impl CommandResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cards: Vec::new(),
        }
    }

    pub fn with_cards(text: impl Into<String>, cards: Vec<DisplayCard>) -> Self {
        Self {
            text: text.into(),
            cards,
        }
    }
}

/// A structured display card (rendered as a rich embed on Discord).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayCard {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<CardField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

// ==================== COMMAND CATALOG ====================

/// Declarative description of a registered command, consumed by the gateway
/// for platform-side registration.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub subcommands: Vec<SubcommandSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub options: Vec<OptionSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    String,
    Integer,
}

// ==================== ROUTER ====================

type HandlerFuture = Pin<Box<dyn Future<Output = CommandResponse> + Send>>;
type Handler = Box<dyn Fn(Arc<Repository>, CommandEvent) -> HandlerFuture + Send + Sync>;

/// Immutable mapping from top-level command name to handler, built once at
/// startup with the repository injected.
pub struct CommandRouter {
    repo: Arc<Repository>,
    handlers: HashMap<&'static str, Handler>,
}

impl CommandRouter {
    pub fn new(repo: Arc<Repository>) -> Self {
        let mut handlers: HashMap<&'static str, Handler> = HashMap::new();
        handlers.insert(
            DECK_COMMAND_NAME,
            Box::new(|repo, event| Box::pin(deck::handle(repo, event))),
        );
        Self { repo, handlers }
    }

    /// Dispatch one inbound event. Unknown top-level commands can only come
    /// from a stale platform registration, not from user input: they are
    /// logged and dropped without a user-visible response. Unknown
    /// subcommands are the handler's concern and do produce one.
    pub async fn dispatch(&self, event: CommandEvent) -> Option<CommandResponse> {
        tracing::info!(command = %event.command, subcommand = %event.subcommand, "received command");

        match self.handlers.get(event.command.as_str()) {
            Some(handler) => Some(handler(Arc::clone(&self.repo), event).await),
            None => {
                tracing::warn!(command = %event.command, "undefined slash command");
                None
            }
        }
    }

    /// The registration grammar for every command this router handles.
    pub fn command_catalog(&self) -> Vec<CommandSpec> {
        vec![deck::catalog()]
    }
}
