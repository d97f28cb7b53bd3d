//! DB Repository abstractions

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::{
    AnalyticsEvent, Assistant, Category, ChatMessage, ChatSession, Faq,
};
use crate::infrastructure::traits::{
    AnalyticsRepository, AssistantRepository, CategoryRepository, ChatSessionRepository,
    FaqRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use di::{Ref, injectable};
use log::error;
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

fn db_error(e: sqlx::Error) -> AppError {
    error!("{e}");
    AppError::Persistence(e)
}

#[injectable(FaqRepository)]
pub struct DbFaqRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbFaqRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        DbFaqRepository { connection }
    }
}

#[async_trait]
impl FaqRepository for DbFaqRepository {
    async fn list_faqs(
        &self,
        user_id: Uuid,
        assistant_id: Option<Uuid>,
        only_visible: bool,
    ) -> AppResult<Vec<Faq>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM faqs WHERE user_id = ");
        query.push_bind(user_id);
        if let Some(assistant_id) = assistant_id {
            query
                .push(" AND (assistant_id IS NULL OR assistant_id = ")
                .push_bind(assistant_id)
                .push(")");
        }
        if only_visible {
            query.push(" AND is_visible = 1");
        }
        query.push(
            " ORDER BY category_id IS NULL, category_id, sort_position ASC, created_at ASC, rowid ASC",
        );

        query
            .build_query_as::<Faq>()
            .fetch_all(&**self.connection)
            .await
            .map_err(db_error)
    }

    async fn find_faq(&self, faq_id: Uuid) -> AppResult<Option<Faq>> {
        sqlx::query_as("SELECT * FROM faqs WHERE id = ?")
            .bind(faq_id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(db_error)
    }

    async fn next_sort_position(
        &self,
        user_id: Uuid,
        category_id: Option<Uuid>,
    ) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(sort_position) + 1, 0) FROM faqs WHERE user_id = ? AND category_id IS ?",
        )
        .bind(user_id)
        .bind(category_id)
        .fetch_one(&**self.connection)
        .await
        .map_err(db_error)
    }

    async fn insert_faq(&self, faq: Faq) -> AppResult<Faq> {
        sqlx::query_as(
            "INSERT INTO faqs (id, user_id, assistant_id, question, answer, category_id, tags, is_visible, sort_position, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(faq.id)
        .bind(faq.user_id)
        .bind(faq.assistant_id)
        .bind(faq.question)
        .bind(faq.answer)
        .bind(faq.category_id)
        .bind(faq.tags)
        .bind(faq.is_visible)
        .bind(faq.sort_position)
        .bind(faq.created_at)
        .bind(faq.updated_at)
        .fetch_one(&**self.connection)
        .await
        .map_err(db_error)
    }

    async fn update_faq(&self, faq: Faq) -> AppResult<Option<Faq>> {
        sqlx::query_as(
            "UPDATE faqs SET question = ?, answer = ?, category_id = ?, tags = ?, is_visible = ?, sort_position = ?, updated_at = ? WHERE id = ? AND user_id = ? RETURNING *",
        )
        .bind(faq.question)
        .bind(faq.answer)
        .bind(faq.category_id)
        .bind(faq.tags)
        .bind(faq.is_visible)
        .bind(faq.sort_position)
        .bind(faq.updated_at)
        .bind(faq.id)
        .bind(faq.user_id)
        .fetch_optional(&**self.connection)
        .await
        .map_err(db_error)
    }

    async fn update_positions(
        &self,
        user_id: Uuid,
        positions: Vec<(Uuid, i64)>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Vec<Faq>>> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;
        let mut updated = Vec::with_capacity(positions.len());

        for (faq_id, position) in positions {
            let faq: Option<Faq> = sqlx::query_as(
                "UPDATE faqs SET sort_position = ?, updated_at = ? WHERE id = ? AND user_id = ? RETURNING *",
            )
            .bind(position)
            .bind(updated_at)
            .bind(faq_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;

            match faq {
                Some(faq) => updated.push(faq),
                // Dropping the transaction rolls back the rows already written.
                None => return Ok(None),
            }
        }

        tx.commit().await.map_err(db_error)?;
        Ok(Some(updated))
    }

    async fn delete_faq(&self, user_id: Uuid, faq_id: Uuid) -> AppResult<u64> {
        sqlx::query("DELETE FROM faqs WHERE id = ? AND user_id = ?")
            .bind(faq_id)
            .bind(user_id)
            .execute(&**self.connection)
            .await
            .map(|result| result.rows_affected())
            .map_err(db_error)
    }
}

#[injectable(CategoryRepository)]
pub struct DbCategoryRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbCategoryRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        DbCategoryRepository { connection }
    }
}

#[async_trait]
impl CategoryRepository for DbCategoryRepository {
    async fn list_categories(&self, user_id: Uuid) -> AppResult<Vec<Category>> {
        sqlx::query_as(
            "SELECT * FROM faq_categories WHERE user_id = ? ORDER BY sort_position ASC, created_at ASC, rowid ASC",
        )
        .bind(user_id)
        .fetch_all(&**self.connection)
        .await
        .map_err(db_error)
    }

    async fn find_category(&self, user_id: Uuid, category_id: Uuid) -> AppResult<Option<Category>> {
        sqlx::query_as("SELECT * FROM faq_categories WHERE id = ? AND user_id = ?")
            .bind(category_id)
            .bind(user_id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(db_error)
    }

    async fn insert_category(&self, category: Category) -> AppResult<Category> {
        let name = category.name.clone();
        sqlx::query_as(
            "INSERT INTO faq_categories (id, user_id, name, description, color, sort_position, created_at) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(category.id)
        .bind(category.user_id)
        .bind(category.name)
        .bind(category.description)
        .bind(category.color)
        .bind(category.sort_position)
        .bind(category.created_at)
        .fetch_one(&**self.connection)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("category `{name}` already exists"))
            }
            e => db_error(e),
        })
    }

    async fn insert_defaults_if_empty(
        &self,
        user_id: Uuid,
        defaults: Vec<Category>,
    ) -> AppResult<u64> {
        if defaults.is_empty() {
            return Ok(0);
        }

        // One statement: the emptiness check and the inserts see the same
        // snapshot, and the unique index drops rows a concurrent caller won.
        let mut query = QueryBuilder::<Sqlite>::new(
            "INSERT INTO faq_categories (id, user_id, name, description, color, sort_position, created_at) SELECT column1, column2, column3, column4, column5, column6, column7 FROM (",
        );
        query.push_values(defaults, |mut row, category| {
            row.push_bind(category.id)
                .push_bind(category.user_id)
                .push_bind(category.name)
                .push_bind(category.description)
                .push_bind(category.color)
                .push_bind(category.sort_position)
                .push_bind(category.created_at);
        });
        query
            .push(") WHERE NOT EXISTS (SELECT 1 FROM faq_categories WHERE user_id = ")
            .push_bind(user_id)
            .push(") ON CONFLICT DO NOTHING");

        query
            .build()
            .execute(&**self.connection)
            .await
            .map(|result| result.rows_affected())
            .map_err(db_error)
    }
}

#[injectable(AssistantRepository)]
pub struct DbAssistantRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbAssistantRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        DbAssistantRepository { connection }
    }
}

#[async_trait]
impl AssistantRepository for DbAssistantRepository {
    async fn list_active_assistants(&self, user_id: Uuid) -> AppResult<Vec<Assistant>> {
        sqlx::query_as(
            "SELECT * FROM assistants WHERE user_id = ? AND is_active = 1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&**self.connection)
        .await
        .map_err(db_error)
    }

    async fn find_assistant(
        &self,
        user_id: Uuid,
        assistant_id: Uuid,
    ) -> AppResult<Option<Assistant>> {
        sqlx::query_as("SELECT * FROM assistants WHERE id = ? AND user_id = ?")
            .bind(assistant_id)
            .bind(user_id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(db_error)
    }

    async fn insert_assistant(&self, assistant: Assistant) -> AppResult<Assistant> {
        sqlx::query_as(
            "INSERT INTO assistants (id, user_id, name, description, tone, personality, is_active, history_window, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(assistant.id)
        .bind(assistant.user_id)
        .bind(assistant.name)
        .bind(assistant.description)
        .bind(assistant.tone)
        .bind(assistant.personality)
        .bind(assistant.is_active)
        .bind(assistant.history_window)
        .bind(assistant.created_at)
        .bind(assistant.updated_at)
        .fetch_one(&**self.connection)
        .await
        .map_err(db_error)
    }
}

#[injectable(ChatSessionRepository)]
pub struct DbChatSessionRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbChatSessionRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        DbChatSessionRepository { connection }
    }
}

#[async_trait]
impl ChatSessionRepository for DbChatSessionRepository {
    async fn list_recent_sessions(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<ChatSession>> {
        sqlx::query_as(
            "SELECT * FROM chat_sessions WHERE user_id = ? ORDER BY last_activity DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&**self.connection)
        .await
        .map_err(db_error)
    }

    async fn find_session(&self, user_id: Uuid, session_id: Uuid) -> AppResult<Option<ChatSession>> {
        sqlx::query_as("SELECT * FROM chat_sessions WHERE id = ? AND user_id = ?")
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(db_error)
    }

    async fn create_session(&self, session: ChatSession) -> AppResult<ChatSession> {
        sqlx::query_as(
            "INSERT INTO chat_sessions (id, user_id, assistant_id, is_test_session, started_at, last_activity) VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.assistant_id)
        .bind(session.is_test_session)
        .bind(session.started_at)
        .bind(session.last_activity)
        .fetch_one(&**self.connection)
        .await
        .map_err(db_error)
    }

    async fn list_session_messages(&self, session_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        sqlx::query_as(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(session_id)
        .fetch_all(&**self.connection)
        .await
        .map_err(db_error)
    }

    async fn append_message(
        &self,
        message: ChatMessage,
        activity: DateTime<Utc>,
    ) -> AppResult<ChatMessage> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;

        let stored: ChatMessage = sqlx::query_as(
            "INSERT INTO chat_messages (id, session_id, role, content, created_at) VALUES (?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(message.id)
        .bind(message.session_id)
        .bind(message.role)
        .bind(message.content)
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("UPDATE chat_sessions SET last_activity = ? WHERE id = ?")
            .bind(activity)
            .bind(stored.session_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(stored)
    }
}

#[injectable(AnalyticsRepository)]
pub struct DbAnalyticsRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbAnalyticsRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        DbAnalyticsRepository { connection }
    }
}

#[async_trait]
impl AnalyticsRepository for DbAnalyticsRepository {
    async fn record_event(&self, event: AnalyticsEvent) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO analytics (id, event_type, event_data, assistant_id, user_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id)
        .bind(event.event_type)
        .bind(event.event_data)
        .bind(event.assistant_id)
        .bind(event.user_id)
        .bind(event.created_at)
        .execute(&**self.connection)
        .await
        .map(|_| ())
        .map_err(db_error)
    }

    async fn list_events(&self, user_id: Uuid) -> AppResult<Vec<AnalyticsEvent>> {
        sqlx::query_as("SELECT * FROM analytics WHERE user_id = ? ORDER BY created_at ASC, rowid ASC")
            .bind(user_id)
            .fetch_all(&**self.connection)
            .await
            .map_err(db_error)
    }
}
