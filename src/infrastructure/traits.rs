//! Infrastructure traits, used for DI on higher levels

use crate::error::AppResult;
use crate::infrastructure::entities;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait FaqRepository: Send + Sync {
    /// All FAQs of the owner ordered by category, position and insertion time.
    ///
    /// With `assistant_id` set, only FAQs scoped to that assistant or shared
    /// (no assistant) are returned.
    async fn list_faqs(
        &self,
        user_id: Uuid,
        assistant_id: Option<Uuid>,
        only_visible: bool,
    ) -> AppResult<Vec<entities::Faq>>;

    /// Looks a FAQ up by id alone, without an ownership check.
    async fn find_faq(&self, faq_id: Uuid) -> AppResult<Option<entities::Faq>>;

    async fn next_sort_position(&self, user_id: Uuid, category_id: Option<Uuid>)
    -> AppResult<i64>;

    async fn insert_faq(&self, faq: entities::Faq) -> AppResult<entities::Faq>;

    /// Writes every mutable column, returns `None` when no owned row matched.
    async fn update_faq(&self, faq: entities::Faq) -> AppResult<Option<entities::Faq>>;

    /// Sets the positions of several owned FAQs in one transaction. Returns
    /// `None` and writes nothing when any id is not an owned row.
    async fn update_positions(
        &self,
        user_id: Uuid,
        positions: Vec<(Uuid, i64)>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Vec<entities::Faq>>>;

    async fn delete_faq(&self, user_id: Uuid, faq_id: Uuid) -> AppResult<u64>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_categories(&self, user_id: Uuid) -> AppResult<Vec<entities::Category>>;

    async fn find_category(
        &self,
        user_id: Uuid,
        category_id: Uuid,
    ) -> AppResult<Option<entities::Category>>;

    /// Fails with `Conflict` when the owner already has the name.
    async fn insert_category(&self, category: entities::Category)
    -> AppResult<entities::Category>;

    /// Inserts `defaults` when the owner has no category yet, tolerating
    /// concurrent callers. Returns how many rows were written.
    async fn insert_defaults_if_empty(
        &self,
        user_id: Uuid,
        defaults: Vec<entities::Category>,
    ) -> AppResult<u64>;
}

#[async_trait]
pub trait AssistantRepository: Send + Sync {
    async fn list_active_assistants(&self, user_id: Uuid) -> AppResult<Vec<entities::Assistant>>;

    async fn find_assistant(
        &self,
        user_id: Uuid,
        assistant_id: Uuid,
    ) -> AppResult<Option<entities::Assistant>>;

    async fn insert_assistant(
        &self,
        assistant: entities::Assistant,
    ) -> AppResult<entities::Assistant>;
}

#[async_trait]
pub trait ChatSessionRepository: Send + Sync {
    async fn list_recent_sessions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<entities::ChatSession>>;

    async fn find_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> AppResult<Option<entities::ChatSession>>;

    async fn create_session(
        &self,
        session: entities::ChatSession,
    ) -> AppResult<entities::ChatSession>;

    async fn list_session_messages(
        &self,
        session_id: Uuid,
    ) -> AppResult<Vec<entities::ChatMessage>>;

    /// Stores the message and moves the session's `last_activity` to `activity`.
    async fn append_message(
        &self,
        message: entities::ChatMessage,
        activity: DateTime<Utc>,
    ) -> AppResult<entities::ChatMessage>;
}

/// Append-only usage log.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn record_event(&self, event: entities::AnalyticsEvent) -> AppResult<()>;

    async fn list_events(&self, user_id: Uuid) -> AppResult<Vec<entities::AnalyticsEvent>>;
}
