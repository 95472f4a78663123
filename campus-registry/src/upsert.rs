//! Shared find-or-update-or-create discipline
//!
//! Both owned entities follow the same pattern: a natural composite key must
//! be unique, and a write either updates the record under that key in place
//! or creates it. Storage carries a uniqueness constraint on the key; a
//! losing concurrent creator sees a unique violation on insert and is retried
//! as an update exactly once. A second failure surfaces as `Conflict`.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{RegistryError, Result};

/// Whether an upsert created a record or updated an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
}

/// Acknowledgment returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub id: String,
    pub outcome: Outcome,
}

/// Result of a resolved upsert
#[derive(Debug, Clone)]
pub struct Upserted<R> {
    pub record: R,
    pub outcome: Outcome,
    /// State of the record before an update; `None` when created
    pub previous: Option<R>,
}

/// Storage operations an entity provides to the resolver
#[async_trait]
pub trait UpsertTarget: Send + Sync {
    type Key: fmt::Debug + Send + Sync;
    type Patch: Send + Sync;
    /// Fully validated new record ready for insertion
    type Draft: Send + Sync;
    type Record: Send;

    /// Entity name used in logs and conflict messages
    fn entity(&self) -> &'static str;

    async fn find(&self, pool: &SqlitePool, key: &Self::Key) -> Result<Option<Self::Record>>;

    /// Validate that a new record can be built from `patch`
    ///
    /// Called only when no record exists under `key`.
    async fn prepare_insert(
        &self,
        pool: &SqlitePool,
        key: &Self::Key,
        patch: &Self::Patch,
    ) -> Result<Self::Draft>;

    /// Plain insert; a unique violation means another writer got there first
    async fn insert(
        &self,
        pool: &SqlitePool,
        draft: &Self::Draft,
    ) -> std::result::Result<Self::Record, sqlx::Error>;

    /// Apply `patch` to `existing` in place; `None` when the row is gone
    async fn update(
        &self,
        pool: &SqlitePool,
        existing: &Self::Record,
        patch: &Self::Patch,
    ) -> Result<Option<Self::Record>>;
}

/// Update the record under `key`, or create it when absent
pub async fn upsert<T: UpsertTarget>(
    target: &T,
    pool: &SqlitePool,
    key: &T::Key,
    patch: &T::Patch,
) -> Result<Upserted<T::Record>> {
    if let Some(existing) = target.find(pool, key).await? {
        return update_existing(target, pool, key, existing, patch).await;
    }

    let draft = target.prepare_insert(pool, key, patch).await?;

    match target.insert(pool, &draft).await {
        Ok(record) => {
            debug!("Created {} for {:?}", target.entity(), key);
            Ok(Upserted {
                record,
                outcome: Outcome::Created,
                previous: None,
            })
        }
        Err(e) if is_unique_violation(&e) => {
            warn!(
                "Concurrent create of {} for {:?}; retrying as update",
                target.entity(),
                key
            );
            let existing = target
                .find(pool, key)
                .await?
                .ok_or_else(|| conflict(target, key))?;
            update_existing(target, pool, key, existing, patch).await
        }
        Err(e) if is_foreign_key_violation(&e) => Err(RegistryError::NotFound(format!(
            "{} references a record that does not exist",
            target.entity()
        ))),
        Err(e) => Err(RegistryError::Storage(e)),
    }
}

async fn update_existing<T: UpsertTarget>(
    target: &T,
    pool: &SqlitePool,
    key: &T::Key,
    existing: T::Record,
    patch: &T::Patch,
) -> Result<Upserted<T::Record>> {
    let record = target
        .update(pool, &existing, patch)
        .await?
        .ok_or_else(|| conflict(target, key))?;

    debug!("Updated {} for {:?}", target.entity(), key);
    Ok(Upserted {
        record,
        outcome: Outcome::Updated,
        previous: Some(existing),
    })
}

fn conflict<T: UpsertTarget>(target: &T, key: &T::Key) -> RegistryError {
    RegistryError::Conflict(format!("{} {:?}", target.entity(), key))
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_foreign_key_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Row;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Minimal keyed table: `name` is the uniqueness key
    struct Tags {
        /// Simulates a stale read: the first `find` reports nothing
        blind_first_find: AtomicBool,
    }

    impl Tags {
        fn new() -> Self {
            Self {
                blind_first_find: AtomicBool::new(false),
            }
        }

        fn racing() -> Self {
            Self {
                blind_first_find: AtomicBool::new(true),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tag {
        id: String,
        name: String,
        colour: String,
    }

    #[async_trait]
    impl UpsertTarget for Tags {
        type Key = String;
        type Patch = String;
        type Draft = Tag;
        type Record = Tag;

        fn entity(&self) -> &'static str {
            "tag"
        }

        async fn find(&self, pool: &SqlitePool, key: &String) -> Result<Option<Tag>> {
            if self.blind_first_find.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            let row = sqlx::query("SELECT id, name, colour FROM tags WHERE name = ?")
                .bind(key)
                .fetch_optional(pool)
                .await?;
            Ok(row.map(|r| Tag {
                id: r.get("id"),
                name: r.get("name"),
                colour: r.get("colour"),
            }))
        }

        async fn prepare_insert(&self, _pool: &SqlitePool, key: &String, patch: &String) -> Result<Tag> {
            if patch.is_empty() {
                return Err(RegistryError::Validation("colour is required".to_string()));
            }
            Ok(Tag {
                id: format!("id-{}", key),
                name: key.clone(),
                colour: patch.clone(),
            })
        }

        async fn insert(&self, pool: &SqlitePool, draft: &Tag) -> std::result::Result<Tag, sqlx::Error> {
            sqlx::query("INSERT INTO tags (id, name, colour) VALUES (?, ?, ?)")
                .bind(&draft.id)
                .bind(&draft.name)
                .bind(&draft.colour)
                .execute(pool)
                .await?;
            Ok(draft.clone())
        }

        async fn update(&self, pool: &SqlitePool, existing: &Tag, patch: &String) -> Result<Option<Tag>> {
            let done = sqlx::query("UPDATE tags SET colour = ? WHERE id = ?")
                .bind(patch)
                .bind(&existing.id)
                .execute(pool)
                .await?;
            if done.rows_affected() == 0 {
                return Ok(None);
            }
            Ok(Some(Tag {
                colour: patch.clone(),
                ..existing.clone()
            }))
        }
    }

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE tags (id TEXT PRIMARY KEY, name TEXT NOT NULL UNIQUE, colour TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_write_creates_second_updates() {
        let pool = setup_pool().await;
        let tags = Tags::new();
        let key = "urgent".to_string();

        let first = upsert(&tags, &pool, &key, &"red".to_string()).await.unwrap();
        assert_eq!(first.outcome, Outcome::Created);
        assert!(first.previous.is_none());

        let second = upsert(&tags, &pool, &key, &"blue".to_string()).await.unwrap();
        assert_eq!(second.outcome, Outcome::Updated);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.colour, "blue");
        assert_eq!(second.previous.unwrap().colour, "red");

        assert_eq!(count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_lost_create_race_is_retried_as_update() {
        let pool = setup_pool().await;
        let key = "urgent".to_string();
        upsert(&Tags::new(), &pool, &key, &"red".to_string()).await.unwrap();

        // The racing target does not see the existing row on its first read,
        // so its insert hits the unique constraint
        let racing = Tags::racing();
        let result = upsert(&racing, &pool, &key, &"green".to_string()).await.unwrap();

        assert_eq!(result.outcome, Outcome::Updated);
        assert_eq!(result.record.colour, "green");
        assert_eq!(count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_validation_failure_persists_nothing() {
        let pool = setup_pool().await;
        let result = upsert(&Tags::new(), &pool, &"urgent".to_string(), &String::new()).await;

        assert!(matches!(result, Err(RegistryError::Validation(_))));
        assert_eq!(count(&pool).await, 0);
    }
}
