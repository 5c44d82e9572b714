//! Integration tests for the quizdeck backend.

use std::sync::Arc;

use tempfile::TempDir;

use crate::commands::{
    Caller, CommandEvent, CommandOption, CommandResponse, CommandRouter, OptionValue,
};
use crate::db::{init_database, Repository};
use crate::errors::codes;
use crate::models::{order_chain, CreateDeckRequest, Owner, Platform, UpdateDeckRequest};

/// Test fixture: repository and router over a throwaway SQLite database.
struct TestFixture {
    repo: Arc<Repository>,
    router: CommandRouter,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));
        let router = CommandRouter::new(Arc::clone(&repo));

        TestFixture {
            repo,
            router,
            _temp_dir: temp_dir,
        }
    }
}

fn create_request(name: &str, description: &str, discord_id: &str) -> CreateDeckRequest {
    CreateDeckRequest {
        name: name.to_string(),
        description: Some(description.to_string()),
        discord_id: (!discord_id.is_empty()).then(|| discord_id.to_string()),
        telegram_id: None,
    }
}

fn deck_event(subcommand: &str, caller_id: &str, options: Vec<OptionValue>) -> CommandEvent {
    CommandEvent {
        command: "deck".to_string(),
        subcommand: subcommand.to_string(),
        caller: Caller {
            platform: Platform::Discord,
            id: caller_id.to_string(),
        },
        options: options
            .into_iter()
            .enumerate()
            .map(|(i, value)| CommandOption {
                name: format!("opt{}", i),
                value,
            })
            .collect(),
    }
}

async fn dispatch(fixture: &TestFixture, event: CommandEvent) -> CommandResponse {
    fixture
        .router
        .dispatch(event)
        .await
        .expect("expected a response")
}

// ==================== REPOSITORY ====================

#[tokio::test]
async fn test_create_get_round_trip() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .repo
        .create_deck(&create_request("Math", "Algebra basics", "u1"))
        .await
        .unwrap();

    let fetched = fixture.repo.get_deck(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "Math");
    assert_eq!(fetched.description, "Algebra basics");
    assert_eq!(fetched.owner, Owner::new(Platform::Discord, "u1"));
    assert!(fetched.quizzes.is_empty());
    assert!(fetched.tags.is_empty());
}

#[tokio::test]
async fn test_create_requires_owner() {
    let fixture = TestFixture::new().await;

    // Owner identity is checked before anything else
    let err = fixture
        .repo
        .create_deck(&create_request("", "", ""))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), codes::INVALID_OWNER);
}

#[tokio::test]
async fn test_create_requires_name() {
    let fixture = TestFixture::new().await;

    let err = fixture
        .repo
        .create_deck(&create_request("  ", "", "u1"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn test_create_telegram_owner() {
    let fixture = TestFixture::new().await;

    let request = CreateDeckRequest {
        name: "Geo".to_string(),
        description: None,
        discord_id: None,
        telegram_id: Some("t9".to_string()),
    };
    let deck = fixture.repo.create_deck(&request).await.unwrap();
    assert_eq!(deck.owner, Owner::new(Platform::Telegram, "t9"));
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let fixture = TestFixture::new().await;

    let deck = fixture
        .repo
        .create_deck(&create_request("Math", "Algebra basics", "u1"))
        .await
        .unwrap();

    let patch = UpdateDeckRequest {
        name: None,
        description: Some("x".to_string()),
    };
    let updated = fixture.repo.update_deck(deck.id, &patch).await.unwrap();
    assert_eq!(updated.name, "Math");
    assert_eq!(updated.description, "x");
}

#[tokio::test]
async fn test_update_missing_deck() {
    let fixture = TestFixture::new().await;

    let patch = UpdateDeckRequest {
        name: Some("x".to_string()),
        description: None,
    };
    let err = fixture.repo.update_deck(42, &patch).await.unwrap_err();
    assert_eq!(err.error_code(), codes::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_hides_deck() {
    let fixture = TestFixture::new().await;
    let owner = Owner::new(Platform::Discord, "u1");

    let deck = fixture
        .repo
        .create_deck(&create_request("Math", "", "u1"))
        .await
        .unwrap();

    fixture.repo.delete_deck(deck.id).await.unwrap();

    assert!(fixture.repo.get_deck(deck.id).await.unwrap().is_none());
    assert!(fixture
        .repo
        .list_decks_by_owner(&owner)
        .await
        .unwrap()
        .is_empty());

    // Never resurrected, and a second delete no longer resolves the id
    let err = fixture.repo.delete_deck(deck.id).await.unwrap_err();
    assert_eq!(err.error_code(), codes::NOT_FOUND);
}

#[tokio::test]
async fn test_list_scoped_to_owner() {
    let fixture = TestFixture::new().await;

    fixture
        .repo
        .create_deck(&create_request("A1", "", "userA"))
        .await
        .unwrap();
    fixture
        .repo
        .create_deck(&create_request("A2", "", "userA"))
        .await
        .unwrap();
    fixture
        .repo
        .create_deck(&create_request("B1", "", "userB"))
        .await
        .unwrap();

    let decks = fixture
        .repo
        .list_decks_by_owner(&Owner::new(Platform::Discord, "userA"))
        .await
        .unwrap();
    assert_eq!(decks.len(), 2);
    assert!(decks.iter().all(|d| d.owner.id == "userA"));
}

#[tokio::test]
async fn test_deck_lifecycle_scenario() {
    let fixture = TestFixture::new().await;

    let deck = fixture
        .repo
        .create_deck(&create_request("Math", "Algebra basics", "u1"))
        .await
        .unwrap();

    let patch = UpdateDeckRequest {
        name: Some("Math II".to_string()),
        description: None,
    };
    fixture.repo.update_deck(deck.id, &patch).await.unwrap();

    let fetched = fixture.repo.get_deck(deck.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "Math II");
    assert_eq!(fetched.description, "Algebra basics");

    fixture.repo.delete_deck(deck.id).await.unwrap();
    assert!(fixture.repo.get_deck(deck.id).await.unwrap().is_none());
}

// ==================== QUIZ CHAIN ====================

#[tokio::test]
async fn test_quiz_chain_append_and_order() {
    let fixture = TestFixture::new().await;

    let deck = fixture
        .repo
        .create_deck(&create_request("Math", "", "u1"))
        .await
        .unwrap();

    let q1 = fixture.repo.add_quiz(deck.id, "one", 0).await.unwrap();
    let q2 = fixture.repo.add_quiz(deck.id, "two", q1.id).await.unwrap();
    let q3 = fixture.repo.add_quiz(deck.id, "three", q2.id).await.unwrap();

    let fetched = fixture.repo.get_deck(deck.id).await.unwrap().unwrap();
    assert_eq!(fetched.quizzes.len(), 3);

    // Every walk terminates at a root within the quiz count
    let ordered = order_chain(&fetched.quizzes);
    let subjects: Vec<&str> = ordered.iter().map(|q| q.subject.as_str()).collect();
    assert_eq!(subjects, vec!["one", "two", "three"]);
    assert_eq!(ordered[0].previous, 0);
    assert_eq!(ordered[2].id, q3.id);
}

#[tokio::test]
async fn test_quiz_chain_rejects_fork() {
    let fixture = TestFixture::new().await;

    let deck = fixture
        .repo
        .create_deck(&create_request("Math", "", "u1"))
        .await
        .unwrap();

    let q1 = fixture.repo.add_quiz(deck.id, "one", 0).await.unwrap();
    fixture.repo.add_quiz(deck.id, "two", q1.id).await.unwrap();

    let err = fixture
        .repo
        .add_quiz(deck.id, "fork", q1.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn test_quiz_chain_rejects_dangling_predecessor() {
    let fixture = TestFixture::new().await;

    let deck = fixture
        .repo
        .create_deck(&create_request("Math", "", "u1"))
        .await
        .unwrap();

    let err = fixture
        .repo
        .add_quiz(deck.id, "orphan", 99)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn test_quiz_predecessor_must_be_in_same_deck() {
    let fixture = TestFixture::new().await;

    let deck_a = fixture
        .repo
        .create_deck(&create_request("A", "", "u1"))
        .await
        .unwrap();
    let deck_b = fixture
        .repo
        .create_deck(&create_request("B", "", "u1"))
        .await
        .unwrap();

    let q1 = fixture.repo.add_quiz(deck_a.id, "one", 0).await.unwrap();
    let err = fixture
        .repo
        .add_quiz(deck_b.id, "cross", q1.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), codes::VALIDATION_ERROR);
}

// ==================== TAG COUNTER ====================

#[tokio::test]
async fn test_tag_counter_attach_detach() {
    let fixture = TestFixture::new().await;

    let deck_a = fixture
        .repo
        .create_deck(&create_request("A", "", "u1"))
        .await
        .unwrap();
    let deck_b = fixture
        .repo
        .create_deck(&create_request("B", "", "u1"))
        .await
        .unwrap();
    let tag = fixture.repo.create_tag("algebra").await.unwrap();
    assert_eq!(tag.count, 0);

    fixture.repo.attach_tag(deck_a.id, tag.id).await.unwrap();
    fixture.repo.attach_tag(deck_b.id, tag.id).await.unwrap();
    assert_eq!(fixture.repo.get_tag(tag.id).await.unwrap().unwrap().count, 2);

    // Tags resolve eagerly on get
    let fetched = fixture.repo.get_deck(deck_a.id).await.unwrap().unwrap();
    assert_eq!(fetched.tags.len(), 1);
    assert_eq!(fetched.tags[0].name, "algebra");

    fixture.repo.detach_tag(deck_a.id, tag.id).await.unwrap();
    assert_eq!(fixture.repo.get_tag(tag.id).await.unwrap().unwrap().count, 1);

    // Detaching an unattached tag is NotFound and never drives count negative
    let err = fixture
        .repo
        .detach_tag(deck_a.id, tag.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), codes::NOT_FOUND);

    fixture.repo.detach_tag(deck_b.id, tag.id).await.unwrap();
    assert_eq!(fixture.repo.get_tag(tag.id).await.unwrap().unwrap().count, 0);
}

#[tokio::test]
async fn test_tag_duplicate_attach_rejected() {
    let fixture = TestFixture::new().await;

    let deck = fixture
        .repo
        .create_deck(&create_request("A", "", "u1"))
        .await
        .unwrap();
    let tag = fixture.repo.create_tag("algebra").await.unwrap();

    fixture.repo.attach_tag(deck.id, tag.id).await.unwrap();
    let err = fixture.repo.attach_tag(deck.id, tag.id).await.unwrap_err();
    assert_eq!(err.error_code(), codes::VALIDATION_ERROR);
    assert_eq!(fixture.repo.get_tag(tag.id).await.unwrap().unwrap().count, 1);
}

// ==================== ROUTER ====================

#[tokio::test]
async fn test_router_create_and_show() {
    let fixture = TestFixture::new().await;

    let response = dispatch(
        &fixture,
        deck_event(
            "create",
            "u1",
            vec![
                OptionValue::Str("Math".to_string()),
                OptionValue::Str("Algebra basics".to_string()),
            ],
        ),
    )
    .await;

    assert_eq!(response.text, "deck Math created");
    assert_eq!(response.cards.len(), 1);
    assert_eq!(response.cards[0].title, "Math");
    assert_eq!(response.cards[0].description, "Algebra basics");
    assert_eq!(response.cards[0].fields[0].name, "ID");

    let id: i64 = response.cards[0].fields[0].value.parse().unwrap();
    let shown = dispatch(&fixture, deck_event("show", "u1", vec![OptionValue::Int(id)])).await;
    assert_eq!(shown.cards[0].title, "Math");
}

#[tokio::test]
async fn test_router_show_missing_deck_renders_error_text() {
    let fixture = TestFixture::new().await;

    let response = dispatch(&fixture, deck_event("show", "u1", vec![OptionValue::Int(42)])).await;
    assert_eq!(response.text, "deck 42 not found");
    assert!(response.cards.is_empty());
}

#[tokio::test]
async fn test_router_create_without_owner_renders_error_text() {
    let fixture = TestFixture::new().await;

    let event = deck_event("create", "", vec![OptionValue::Str("Math".to_string())]);

    let response = dispatch(&fixture, event).await;
    assert_eq!(response.text, "no user id specified");
    assert!(response.cards.is_empty());
}

#[tokio::test]
async fn test_router_list_scoped_to_caller() {
    let fixture = TestFixture::new().await;

    dispatch(
        &fixture,
        deck_event("create", "userA", vec![OptionValue::Str("Math".to_string())]),
    )
    .await;

    let listed = dispatch(&fixture, deck_event("list", "userA", vec![])).await;
    assert_eq!(listed.cards.len(), 1);

    let other = dispatch(&fixture, deck_event("list", "userB", vec![])).await;
    assert!(other.cards.is_empty());
    assert_eq!(other.text, "you have no decks yet");
}

#[tokio::test]
async fn test_router_update_and_delete() {
    let fixture = TestFixture::new().await;

    let created = dispatch(
        &fixture,
        deck_event(
            "create",
            "u1",
            vec![
                OptionValue::Str("Math".to_string()),
                OptionValue::Str("Algebra basics".to_string()),
            ],
        ),
    )
    .await;
    let id: i64 = created.cards[0].fields[0].value.parse().unwrap();

    let updated = dispatch(
        &fixture,
        deck_event(
            "update",
            "u1",
            vec![
                OptionValue::Int(id),
                OptionValue::Str("Math II".to_string()),
            ],
        ),
    )
    .await;
    assert_eq!(updated.text, "deck Math II updated");
    assert_eq!(updated.cards[0].description, "Algebra basics");

    let deleted = dispatch(&fixture, deck_event("delete", "u1", vec![OptionValue::Int(id)])).await;
    assert_eq!(deleted.text, "deck Math II deleted");

    let shown = dispatch(&fixture, deck_event("show", "u1", vec![OptionValue::Int(id)])).await;
    assert_eq!(shown.text, format!("deck {} not found", id));
}

#[tokio::test]
async fn test_router_show_renders_quizzes_in_chain_order() {
    let fixture = TestFixture::new().await;

    let deck = fixture
        .repo
        .create_deck(&create_request("Math", "", "u1"))
        .await
        .unwrap();
    let q1 = fixture.repo.add_quiz(deck.id, "one", 0).await.unwrap();
    fixture.repo.add_quiz(deck.id, "two", q1.id).await.unwrap();

    let shown = dispatch(
        &fixture,
        deck_event("show", "u1", vec![OptionValue::Int(deck.id)]),
    )
    .await;

    let quizzes = shown
        .cards[0]
        .fields
        .iter()
        .find(|f| f.name == "Quizzes")
        .expect("quizzes field");
    assert_eq!(quizzes.value, "one, two");
}

#[tokio::test]
async fn test_router_unknown_subcommand_is_visible() {
    let fixture = TestFixture::new().await;

    let response = dispatch(&fixture, deck_event("archive", "u1", vec![])).await;
    assert_eq!(response.text, "unknown subcommand archive");
}

#[tokio::test]
async fn test_router_unknown_command_is_silent() {
    let fixture = TestFixture::new().await;

    let mut event = deck_event("create", "u1", vec![]);
    event.command = "cards".to_string();

    assert!(fixture.router.dispatch(event).await.is_none());
}

#[tokio::test]
async fn test_command_catalog_grammar() {
    let fixture = TestFixture::new().await;

    let catalog = fixture.router.command_catalog();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].name, "deck");

    let names: Vec<&str> = catalog[0].subcommands.iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["create", "list", "show", "update", "delete"]);

    let create = &catalog[0].subcommands[0];
    assert!(create.options[0].required);
    assert!(!create.options[1].required);
}
