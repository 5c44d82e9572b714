//! Tag model: a labeled classifier attachable to decks.

use serde::{Deserialize, Serialize};

/// A reusable tag for categorizing decks, with a denormalized usage counter.
///
/// `count` tracks how many live decks the tag is attached to. It is owned by
/// the repository's attach/detach operations and never goes below zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub count: i64,
    pub created_at: String,
}
