//! Deck command handlers.

use std::sync::Arc;

use super::{
    CardField, CommandEvent, CommandResponse, CommandSpec, DisplayCard, OptionKind, OptionSpec,
    SubcommandSpec,
};
use crate::db::Repository;
use crate::models::{order_chain, CreateDeckRequest, Deck, Owner, Platform, UpdateDeckRequest};

pub const DECK_COMMAND_NAME: &str = "deck";

/// Embed color for publicly visible deck cards.
const DECK_CARD_COLOR: u32 = 0x00ff00;

/// Top-level handler for the `deck` command.
pub async fn handle(repo: Arc<Repository>, event: CommandEvent) -> CommandResponse {
    match event.subcommand.as_str() {
        "create" => create(&repo, &event).await,
        "list" => list(&repo, &event).await,
        "show" => show(&repo, &event).await,
        "update" => update(&repo, &event).await,
        "delete" => delete(&repo, &event).await,
        other => CommandResponse::text(format!("unknown subcommand {}", other)),
    }
}

/// `/deck create <deck-name> [deck-description]`
async fn create(repo: &Repository, event: &CommandEvent) -> CommandResponse {
    let Some(name) = event.str_option(0) else {
        return CommandResponse::text("deck-name is required");
    };
    let description = event.str_option(1).unwrap_or_default();

    let mut request = CreateDeckRequest {
        name: name.to_string(),
        description: Some(description.to_string()),
        discord_id: None,
        telegram_id: None,
    };
    match event.caller.platform {
        Platform::Discord => request.discord_id = Some(event.caller.id.clone()),
        Platform::Telegram => request.telegram_id = Some(event.caller.id.clone()),
    }

    match repo.create_deck(&request).await {
        Ok(deck) => CommandResponse::with_cards(
            format!("deck {} created", deck.name),
            vec![deck_card(&deck)],
        ),
        Err(err) => CommandResponse::text(err.user_message()),
    }
}

/// `/deck list`
async fn list(repo: &Repository, event: &CommandEvent) -> CommandResponse {
    let owner = Owner::new(event.caller.platform, event.caller.id.clone());

    match repo.list_decks_by_owner(&owner).await {
        Ok(decks) if decks.is_empty() => CommandResponse::text("you have no decks yet"),
        Ok(decks) => {
            let cards = decks.iter().map(deck_card).collect();
            CommandResponse::with_cards("", cards)
        }
        Err(err) => CommandResponse::text(err.user_message()),
    }
}

/// `/deck show <deck-id>`
async fn show(repo: &Repository, event: &CommandEvent) -> CommandResponse {
    let Some(id) = event.int_option(0) else {
        return CommandResponse::text("deck-id is required");
    };

    match repo.get_deck(id).await {
        Ok(Some(deck)) => CommandResponse::with_cards("", vec![deck_card(&deck)]),
        Ok(None) => CommandResponse::text(format!("deck {} not found", id)),
        Err(err) => CommandResponse::text(err.user_message()),
    }
}

/// `/deck update <deck-id> [deck-name] [deck-description]`
async fn update(repo: &Repository, event: &CommandEvent) -> CommandResponse {
    let Some(id) = event.int_option(0) else {
        return CommandResponse::text("deck-id is required");
    };

    let request = UpdateDeckRequest {
        name: event.str_option(1).map(str::to_string),
        description: event.str_option(2).map(str::to_string),
    };
    if request.is_empty() {
        return CommandResponse::text("nothing to update");
    }

    match repo.update_deck(id, &request).await {
        Ok(deck) => CommandResponse::with_cards(
            format!("deck {} updated", deck.name),
            vec![deck_card(&deck)],
        ),
        Err(err) => CommandResponse::text(err.user_message()),
    }
}

/// `/deck delete <deck-id>`
async fn delete(repo: &Repository, event: &CommandEvent) -> CommandResponse {
    let Some(id) = event.int_option(0) else {
        return CommandResponse::text("deck-id is required");
    };

    let deck = match repo.get_deck(id).await {
        Ok(Some(deck)) => deck,
        Ok(None) => return CommandResponse::text(format!("deck {} not found", id)),
        Err(err) => return CommandResponse::text(err.user_message()),
    };

    match repo.delete_deck(id).await {
        Ok(()) => CommandResponse::text(format!("deck {} deleted", deck.name)),
        Err(err) => CommandResponse::text(err.user_message()),
    }
}

/// Render a deck as a display card: title = name, description = description,
/// ID field plus quiz/tag summaries when present. Quizzes are listed in
/// chain order.
fn deck_card(deck: &Deck) -> DisplayCard {
    let mut fields = vec![CardField {
        name: "ID".to_string(),
        value: deck.id.to_string(),
        inline: true,
    }];

    if !deck.quizzes.is_empty() {
        let ordered = order_chain(&deck.quizzes);
        let subjects: Vec<&str> = ordered.iter().map(|q| q.subject.as_str()).collect();
        fields.push(CardField {
            name: "Quizzes".to_string(),
            value: subjects.join(", "),
            inline: false,
        });
    }

    if !deck.tags.is_empty() {
        let names: Vec<&str> = deck.tags.iter().map(|t| t.name.as_str()).collect();
        fields.push(CardField {
            name: "Tags".to_string(),
            value: names.join(", "),
            inline: false,
        });
    }

    DisplayCard {
        title: deck.name.clone(),
        description: deck.description.clone(),
        color: DECK_CARD_COLOR,
        fields,
    }
}

/// Registration grammar for the `deck` command.
pub fn catalog() -> CommandSpec {
    CommandSpec {
        name: DECK_COMMAND_NAME,
        description: "commands for using deck",
        subcommands: vec![
            SubcommandSpec {
                name: "create",
                description: "create new deck",
                options: vec![
                    OptionSpec {
                        name: "deck-name",
                        kind: OptionKind::String,
                        description: "name for the new deck",
                        required: true,
                    },
                    OptionSpec {
                        name: "deck-description",
                        kind: OptionKind::String,
                        description: "description for the new deck",
                        required: false,
                    },
                ],
            },
            SubcommandSpec {
                name: "list",
                description: "list your decks",
                options: vec![],
            },
            SubcommandSpec {
                name: "show",
                description: "show exist deck",
                options: vec![OptionSpec {
                    name: "deck-id",
                    kind: OptionKind::Integer,
                    description: "the id of target deck",
                    required: true,
                }],
            },
            SubcommandSpec {
                name: "update",
                description: "update exist deck",
                options: vec![
                    OptionSpec {
                        name: "deck-id",
                        kind: OptionKind::Integer,
                        description: "the id of target deck",
                        required: true,
                    },
                    OptionSpec {
                        name: "deck-name",
                        kind: OptionKind::String,
                        description: "new name for the deck",
                        required: false,
                    },
                    OptionSpec {
                        name: "deck-description",
                        kind: OptionKind::String,
                        description: "new description for the deck",
                        required: false,
                    },
                ],
            },
            SubcommandSpec {
                name: "delete",
                description: "delete exist deck",
                options: vec![OptionSpec {
                    name: "deck-id",
                    kind: OptionKind::Integer,
                    description: "the id of target deck",
                    required: true,
                }],
            },
        ],
    }
}
