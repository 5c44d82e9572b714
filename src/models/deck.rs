//! Deck aggregate and its owner identity.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Quiz, Tag};

/// Chat platform a deck owner authenticated through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Discord,
    Telegram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Discord => "discord",
            Platform::Telegram => "telegram",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "discord" => Some(Platform::Discord),
            "telegram" => Some(Platform::Telegram),
            _ => None,
        }
    }
}

/// Tagged owner identity: the platform-specific external user id that created
/// a deck. Exactly one platform per deck.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Owner {
    pub platform: Platform,
    pub id: String,
}

impl Owner {
    pub fn new(platform: Platform, id: impl Into<String>) -> Self {
        Self {
            platform,
            id: id.into(),
        }
    }

    /// Resolve an owner from the dual-platform id pair of a create request.
    /// Discord wins when both are supplied; both empty is invalid.
    pub fn from_platform_ids(
        discord_id: Option<&str>,
        telegram_id: Option<&str>,
    ) -> Result<Self, AppError> {
        let discord_id = discord_id.unwrap_or_default();
        let telegram_id = telegram_id.unwrap_or_default();
        if !discord_id.is_empty() {
            Ok(Owner::new(Platform::Discord, discord_id))
        } else if !telegram_id.is_empty() {
            Ok(Owner::new(Platform::Telegram, telegram_id))
        } else {
            Err(AppError::InvalidOwner("no user id specified".to_string()))
        }
    }
}

/// A named, owned collection of quiz items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub owner: Owner,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating a new deck.
///
/// Carries the wire shape of the platform commands: either platform id may be
/// present, and the repository derives the tagged owner from the pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeckRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub discord_id: Option<String>,
    #[serde(default)]
    pub telegram_id: Option<String>,
}

/// Typed patch for updating an existing deck. Only `name` and `description`
/// are updatable; unknown keys are rejected at deserialization time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateDeckRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UpdateDeckRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_prefers_discord() {
        let owner = Owner::from_platform_ids(Some("d1"), Some("t1")).unwrap();
        assert_eq!(owner, Owner::new(Platform::Discord, "d1"));
    }

    #[test]
    fn test_owner_falls_back_to_telegram() {
        let owner = Owner::from_platform_ids(None, Some("t1")).unwrap();
        assert_eq!(owner, Owner::new(Platform::Telegram, "t1"));
    }

    #[test]
    fn test_owner_requires_an_id() {
        let err = Owner::from_platform_ids(Some(""), Some("")).unwrap_err();
        assert_eq!(err.error_code(), crate::errors::codes::INVALID_OWNER);
    }

    #[test]
    fn test_update_request_rejects_unknown_fields() {
        let result: Result<UpdateDeckRequest, _> =
            serde_json::from_str(r#"{"name":"x","owner":"y"}"#);
        assert!(result.is_err());
    }
}
