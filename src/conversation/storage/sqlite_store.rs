//! `SQLite` conversation store: one JSON document per conversation.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::conversation::core::config::{StorageConfig, validate_table_name};
use crate::conversation::core::errors::{ConversationError, ConversationResult};
use crate::conversation::core::ids::{ConversationId, UserId};
use crate::conversation::model::conversation::Conversation;
use crate::conversation::storage::conversation_store::{
    ConversationStore, ConversationSummary, StoreFuture,
};

/// `SQLite` implementation of the conversation store.
///
/// The full aggregate lives in the `document` column. The other columns are
/// copies used for listing and for the revision check.
pub struct SqliteConversationStore {
    conn: Arc<Connection>,
    table: String,
}

impl SqliteConversationStore {
    /// Open the database from config and create the table if needed.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an unsafe table name, or an error if the
    /// database cannot be opened.
    pub async fn new(config: &StorageConfig) -> ConversationResult<Self> {
        validate_table_name(&config.conversation_table)?;
        let conn = Connection::open(&config.sqlite_path).await?;
        Self::with_connection(Arc::new(conn), &config.conversation_table).await
    }

    /// Use an existing connection and create the table if needed.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an unsafe table name, or an error if the
    /// schema cannot be created.
    pub async fn with_connection(conn: Arc<Connection>, table: &str) -> ConversationResult<Self> {
        validate_table_name(table)?;
        let table = table.to_string();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    title TEXT NOT NULL DEFAULT '',
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    message_count INTEGER NOT NULL DEFAULT 0,
                    revision INTEGER NOT NULL,
                    document TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_user_updated
                    ON {table_name} (user_id, is_archived, updated_at DESC);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }
}

fn to_i64(value: u64, what: &str) -> ConversationResult<i64> {
    i64::try_from(value).map_err(|_| ConversationError::CorruptDocument(format!("{what} exceeds i64")))
}

fn from_millis(millis: i64) -> ConversationResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| ConversationError::CorruptDocument("invalid timestamp".to_string()))
}

impl ConversationStore for SqliteConversationStore {
    fn load(&self, id: ConversationId) -> StoreFuture<'_, ConversationResult<Conversation>> {
        Box::pin(async move {
            let table = self.table.clone();
            let id_str = id.to_string();
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!("SELECT document, revision FROM {table} WHERE id = ?1"),
                            rusqlite::params![id_str],
                            |row| {
                                let document: String = row.get(0)?;
                                let revision: i64 = row.get(1)?;
                                Ok((document, revision))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            let Some((document, revision)) = row else {
                return Err(ConversationError::ConversationNotFound(id));
            };
            let revision = u64::try_from(revision).map_err(|_| {
                ConversationError::CorruptDocument("negative revision".to_string())
            })?;

            let mut conversation: Conversation = serde_json::from_str(&document)?;
            conversation.assign_identity(id, revision);
            Ok(conversation)
        })
    }

    fn save<'a>(
        &'a self,
        conversation: &'a mut Conversation,
    ) -> StoreFuture<'a, ConversationResult<ConversationId>> {
        Box::pin(async move {
            let table = self.table.clone();
            let is_new = conversation.id().is_none();
            let id = conversation.id().unwrap_or_default();
            let expected = conversation.revision();
            let next = expected + 1;

            let mut staged = conversation.clone();
            staged.assign_identity(id, next);
            let document = serde_json::to_string(&staged)?;

            let id_str = id.to_string();
            let user_id = staged.user_id().to_string();
            let title = staged.title().to_string();
            let is_archived = staged.is_archived();
            let created_at = staged.created_at().timestamp_millis();
            let updated_at = staged.updated_at().timestamp_millis();
            let message_count = i64::try_from(staged.messages().len()).map_err(|_| {
                ConversationError::CorruptDocument("message count exceeds i64".to_string())
            })?;
            let expected_db = to_i64(expected, "revision")?;
            let next_db = to_i64(next, "revision")?;

            let written = self
                .conn
                .call(move |conn| {
                    let written = if is_new {
                        conn.execute(
                            &format!(
                                "INSERT INTO {table}
                                 (id, user_id, title, is_archived, created_at, updated_at,
                                  message_count, revision, document)
                                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                            ),
                            rusqlite::params![
                                id_str,
                                user_id,
                                title,
                                is_archived,
                                created_at,
                                updated_at,
                                message_count,
                                next_db,
                                document
                            ],
                        )?
                    } else {
                        conn.execute(
                            &format!(
                                "UPDATE {table}
                                 SET title = ?2, is_archived = ?3, updated_at = ?4,
                                     message_count = ?5, revision = ?6, document = ?7
                                 WHERE id = ?1 AND revision = ?8"
                            ),
                            rusqlite::params![
                                id_str,
                                title,
                                is_archived,
                                updated_at,
                                message_count,
                                next_db,
                                document,
                                expected_db
                            ],
                        )?
                    };
                    Ok(written)
                })
                .await?;

            if written == 0 {
                return Err(ConversationError::ConcurrentModification {
                    conversation_id: id,
                    expected_revision: expected,
                });
            }

            conversation.assign_identity(id, next);
            Ok(id)
        })
    }

    fn delete(&self, id: ConversationId) -> StoreFuture<'_, ConversationResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            let id_str = id.to_string();
            let deleted = self
                .conn
                .call(move |conn| {
                    let deleted = conn.execute(
                        &format!("DELETE FROM {table} WHERE id = ?1"),
                        rusqlite::params![id_str],
                    )?;
                    Ok(deleted)
                })
                .await?;

            if deleted == 0 {
                return Err(ConversationError::ConversationNotFound(id));
            }
            Ok(())
        })
    }

    fn list_for_user(
        &self,
        user_id: UserId,
        include_archived: bool,
    ) -> StoreFuture<'_, ConversationResult<Vec<ConversationSummary>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let user = user_id.to_string();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, title, created_at, updated_at, message_count, is_archived
                         FROM {table}
                         WHERE user_id = ?1 AND (?2 OR is_archived = 0)
                         ORDER BY updated_at DESC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![user, include_archived], |row| {
                            let id: String = row.get(0)?;
                            let title: String = row.get(1)?;
                            let created_at: i64 = row.get(2)?;
                            let updated_at: i64 = row.get(3)?;
                            let message_count: i64 = row.get(4)?;
                            let is_archived: bool = row.get(5)?;
                            Ok((id, title, created_at, updated_at, message_count, is_archived))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            let mut summaries = Vec::with_capacity(rows.len());
            for (id, title, created_at, updated_at, message_count, is_archived) in rows {
                summaries.push(ConversationSummary {
                    id: id.parse().map_err(|err| {
                        ConversationError::CorruptDocument(format!("invalid conversation id: {err}"))
                    })?,
                    title,
                    created_at: from_millis(created_at)?,
                    updated_at: from_millis(updated_at)?,
                    message_count: usize::try_from(message_count).map_err(|_| {
                        ConversationError::CorruptDocument("invalid message count".to_string())
                    })?,
                    is_archived,
                });
            }

            Ok(summaries)
        })
    }
}
