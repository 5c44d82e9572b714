//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. Mutations are
//! single conditional writes scoped to live rows, so two in-flight commands
//! touching the same deck cannot interleave into a lost update.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    validate_chain, CreateDeckRequest, Deck, Owner, Platform, Quiz, Tag, UpdateDeckRequest,
};

/// Bounded retry/timeout policy for calls into the backing store.
const STORE_ATTEMPTS: u32 = 3;
const STORE_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== DECK OPERATIONS ====================

    /// Create a new deck. Fails with `InvalidOwner` when neither platform id
    /// is supplied; the Discord identity wins when both are.
    pub async fn create_deck(&self, request: &CreateDeckRequest) -> Result<Deck, AppError> {
        let owner = Owner::from_platform_ids(
            request.discord_id.as_deref(),
            request.telegram_id.as_deref(),
        )?;
        if request.name.trim().is_empty() {
            return Err(AppError::Validation("deck name is required".to_string()));
        }

        with_store_guard(|| self.insert_deck(request, &owner)).await
    }

    async fn insert_deck(
        &self,
        request: &CreateDeckRequest,
        owner: &Owner,
    ) -> Result<Deck, AppError> {
        let now = Utc::now().to_rfc3339();
        let description = request.description.clone().unwrap_or_default();

        let result = sqlx::query(
            "INSERT INTO decks (name, description, owner_platform, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(&request.name)
        .bind(&description)
        .bind(owner.platform.as_str())
        .bind(&owner.id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Deck {
            id: result.last_insert_rowid(),
            name: request.name.clone(),
            description,
            owner: owner.clone(),
            quizzes: Vec::new(),
            tags: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a live deck by id, with its tags and quizzes eagerly resolved.
    /// Quizzes come back in storage order; chain ordering is left to the
    /// presentation layer.
    pub async fn get_deck(&self, id: i64) -> Result<Option<Deck>, AppError> {
        with_store_guard(|| self.fetch_deck(id)).await
    }

    async fn fetch_deck(&self, id: i64) -> Result<Option<Deck>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, description, owner_platform, owner_id, created_at, updated_at FROM decks WHERE id = ? AND deleted_at IS NULL"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags = self.fetch_deck_tags(id).await?;
        let quizzes = self.fetch_quizzes(id).await?;
        Ok(Some(deck_from_row(&row, tags, quizzes)))
    }

    /// Update a live deck through the typed patch. A single conditional
    /// UPDATE does the write; zero affected rows means the deck is missing
    /// or deleted.
    pub async fn update_deck(
        &self,
        id: i64,
        request: &UpdateDeckRequest,
    ) -> Result<Deck, AppError> {
        with_store_guard(|| self.apply_deck_patch(id, request)).await
    }

    async fn apply_deck_patch(
        &self,
        id: i64,
        request: &UpdateDeckRequest,
    ) -> Result<Deck, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE decks SET name = COALESCE(?, name), description = COALESCE(?, description), updated_at = ? WHERE id = ? AND deleted_at IS NULL"
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("deck {} not found", id)));
        }

        self.fetch_deck(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("deck {} not found", id)))
    }

    /// List the live decks belonging to an owner. Storage order; empty when
    /// none match.
    pub async fn list_decks_by_owner(&self, owner: &Owner) -> Result<Vec<Deck>, AppError> {
        with_store_guard(|| self.fetch_decks_by_owner(owner)).await
    }

    async fn fetch_decks_by_owner(&self, owner: &Owner) -> Result<Vec<Deck>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, description, owner_platform, owner_id, created_at, updated_at FROM decks WHERE owner_platform = ? AND owner_id = ? AND deleted_at IS NULL"
        )
        .bind(owner.platform.as_str())
        .bind(&owner.id)
        .fetch_all(&self.pool)
        .await?;

        let mut decks = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let tags = self.fetch_deck_tags(id).await?;
            let quizzes = self.fetch_quizzes(id).await?;
            decks.push(deck_from_row(&row, tags, quizzes));
        }
        Ok(decks)
    }

    /// Soft-delete a deck. The row keeps its data; `deleted_at` hides it from
    /// every subsequent read.
    pub async fn delete_deck(&self, id: i64) -> Result<(), AppError> {
        with_store_guard(|| self.mark_deck_deleted(id)).await
    }

    async fn mark_deck_deleted(&self, id: i64) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE decks SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("deck {} not found", id)));
        }

        Ok(())
    }

    // ==================== TAG OPERATIONS ====================

    /// Create a new tag with a zero usage counter.
    pub async fn create_tag(&self, name: &str) -> Result<Tag, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("tag name is required".to_string()));
        }

        with_store_guard(|| self.insert_tag(name)).await
    }

    async fn insert_tag(&self, name: &str) -> Result<Tag, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query("INSERT INTO tags (name, count, created_at) VALUES (?, 0, ?)")
            .bind(name)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        Ok(Tag {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            count: 0,
            created_at: now,
        })
    }

    /// Get a live tag by id.
    pub async fn get_tag(&self, id: i64) -> Result<Option<Tag>, AppError> {
        with_store_guard(|| self.fetch_tag(id)).await
    }

    async fn fetch_tag(&self, id: i64) -> Result<Option<Tag>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, count, created_at FROM tags WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(tag_from_row))
    }

    /// Attach a tag to a deck. The join-table insert and the counter bump
    /// commit together, so `count` always matches the live attachments.
    pub async fn attach_tag(&self, deck_id: i64, tag_id: i64) -> Result<(), AppError> {
        with_store_guard(|| self.attach_tag_tx(deck_id, tag_id)).await
    }

    async fn attach_tag_tx(&self, deck_id: i64, tag_id: i64) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let deck = sqlx::query("SELECT id FROM decks WHERE id = ? AND deleted_at IS NULL")
            .bind(deck_id)
            .fetch_optional(&mut *tx)
            .await?;
        if deck.is_none() {
            return Err(AppError::NotFound(format!("deck {} not found", deck_id)));
        }

        let tag = sqlx::query("SELECT id FROM tags WHERE id = ? AND deleted_at IS NULL")
            .bind(tag_id)
            .fetch_optional(&mut *tx)
            .await?;
        if tag.is_none() {
            return Err(AppError::NotFound(format!("tag {} not found", tag_id)));
        }

        let attached = sqlx::query(
            "SELECT deck_id FROM deck_tags WHERE deck_id = ? AND tag_id = ? AND deleted_at IS NULL",
        )
        .bind(deck_id)
        .bind(tag_id)
        .fetch_optional(&mut *tx)
        .await?;
        if attached.is_some() {
            return Err(AppError::Validation(format!(
                "tag {} is already attached to deck {}",
                tag_id, deck_id
            )));
        }

        sqlx::query("INSERT INTO deck_tags (deck_id, tag_id, created_at) VALUES (?, ?, ?)")
            .bind(deck_id)
            .bind(tag_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE tags SET count = count + 1 WHERE id = ?")
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Detach a tag from a deck, decrementing the usage counter. The counter
    /// is floored at zero.
    pub async fn detach_tag(&self, deck_id: i64, tag_id: i64) -> Result<(), AppError> {
        with_store_guard(|| self.detach_tag_tx(deck_id, tag_id)).await
    }

    async fn detach_tag_tx(&self, deck_id: i64, tag_id: i64) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE deck_tags SET deleted_at = ? WHERE deck_id = ? AND tag_id = ? AND deleted_at IS NULL"
        )
        .bind(&now)
        .bind(deck_id)
        .bind(tag_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "tag {} is not attached to deck {}",
                tag_id, deck_id
            )));
        }

        sqlx::query("UPDATE tags SET count = count - 1 WHERE id = ? AND count > 0")
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ==================== QUIZ OPERATIONS ====================

    /// Append a quiz to a deck's chain. `previous` must be 0 or reference a
    /// live quiz in the same deck that no other quiz already claims; a fresh
    /// id pointing at an existing node cannot introduce a cycle.
    pub async fn add_quiz(
        &self,
        deck_id: i64,
        subject: &str,
        previous: i64,
    ) -> Result<Quiz, AppError> {
        if subject.trim().is_empty() {
            return Err(AppError::Validation("quiz subject is required".to_string()));
        }

        with_store_guard(|| self.insert_quiz(deck_id, subject, previous)).await
    }

    async fn insert_quiz(
        &self,
        deck_id: i64,
        subject: &str,
        previous: i64,
    ) -> Result<Quiz, AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let deck = sqlx::query("SELECT id FROM decks WHERE id = ? AND deleted_at IS NULL")
            .bind(deck_id)
            .fetch_optional(&mut *tx)
            .await?;
        if deck.is_none() {
            return Err(AppError::NotFound(format!("deck {} not found", deck_id)));
        }

        if previous != 0 {
            let predecessor = sqlx::query(
                "SELECT id FROM quizzes WHERE id = ? AND deck_id = ? AND deleted_at IS NULL",
            )
            .bind(previous)
            .bind(deck_id)
            .fetch_optional(&mut *tx)
            .await?;
            if predecessor.is_none() {
                return Err(AppError::Validation(format!(
                    "predecessor quiz {} not found in deck {}",
                    previous, deck_id
                )));
            }

            let claimed = sqlx::query(
                "SELECT id FROM quizzes WHERE deck_id = ? AND previous = ? AND deleted_at IS NULL",
            )
            .bind(deck_id)
            .bind(previous)
            .fetch_optional(&mut *tx)
            .await?;
            if claimed.is_some() {
                return Err(AppError::Validation(format!(
                    "quiz chain forks at predecessor {}",
                    previous
                )));
            }
        }

        let result = sqlx::query(
            "INSERT INTO quizzes (deck_id, subject, previous, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(deck_id)
        .bind(subject)
        .bind(previous)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Quiz {
            id: result.last_insert_rowid(),
            deck_id,
            subject: subject.to_string(),
            previous,
            created_at: now,
        })
    }

    /// List the live quizzes of a deck in storage order.
    pub async fn list_quizzes(&self, deck_id: i64) -> Result<Vec<Quiz>, AppError> {
        with_store_guard(|| self.fetch_quizzes(deck_id)).await
    }

    async fn fetch_quizzes(&self, deck_id: i64) -> Result<Vec<Quiz>, AppError> {
        let rows = sqlx::query(
            "SELECT id, deck_id, subject, previous, created_at FROM quizzes WHERE deck_id = ? AND deleted_at IS NULL"
        )
        .bind(deck_id)
        .fetch_all(&self.pool)
        .await?;

        let quizzes: Vec<Quiz> = rows.iter().map(quiz_from_row).collect();
        if let Err(err) = validate_chain(&quizzes) {
            tracing::warn!(deck_id, "stored quiz chain violates ordering: {}", err);
        }
        Ok(quizzes)
    }

    async fn fetch_deck_tags(&self, deck_id: i64) -> Result<Vec<Tag>, AppError> {
        let rows = sqlx::query(
            r#"SELECT t.id, t.name, t.count, t.created_at
               FROM tags t
               JOIN deck_tags dt ON dt.tag_id = t.id
               WHERE dt.deck_id = ? AND dt.deleted_at IS NULL AND t.deleted_at IS NULL"#,
        )
        .bind(deck_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }
}

/// Run a store operation under the bounded timeout, retrying transport-level
/// failures with exponential backoff before surfacing them.
async fn with_store_guard<T, F, Fut>(mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match tokio::time::timeout(STORE_TIMEOUT, op()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::StoreUnavailable(
                "store call timed out".to_string(),
            )),
        };

        match result {
            Err(err) if err.is_retryable() && attempt < STORE_ATTEMPTS => {
                tracing::warn!(attempt, "store unavailable, retrying: {}", err);
                tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
            }
            other => return other,
        }
    }
}

// Helper functions for row conversion

fn deck_from_row(row: &sqlx::sqlite::SqliteRow, tags: Vec<Tag>, quizzes: Vec<Quiz>) -> Deck {
    let platform_str: String = row.get("owner_platform");
    Deck {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        owner: Owner {
            platform: Platform::from_str(&platform_str).unwrap_or_default(),
            id: row.get("owner_id"),
        },
        quizzes,
        tags,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn tag_from_row(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        count: row.get("count"),
        created_at: row.get("created_at"),
    }
}

fn quiz_from_row(row: &sqlx::sqlite::SqliteRow) -> Quiz {
    Quiz {
        id: row.get("id"),
        deck_id: row.get("deck_id"),
        subject: row.get("subject"),
        previous: row.get("previous"),
        created_at: row.get("created_at"),
    }
}
