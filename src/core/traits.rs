//! DI "Interfaces"

use crate::core::assistant::{AssistantReply, ChatTurn};
use crate::core::completion::CompletionRequest;
use crate::error::AppResult;
use crate::infrastructure::entities;
use async_trait::async_trait;
use uuid::Uuid;

/// Restricts `list_faqs` results.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaqFilter {
    /// Only FAQs in this assistant's scope: its own plus the shared ones.
    pub assistant_id: Option<Uuid>,
    pub only_visible: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewFaq {
    pub assistant_id: Option<Uuid>,
    pub question: String,
    pub answer: String,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_visible: Option<bool>,
    /// Appended to the end of its group when omitted.
    pub sort_position: Option<i64>,
}

/// Partial FAQ update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct FaqUpdate {
    pub question: Option<String>,
    pub answer: Option<String>,
    /// `Some(None)` moves the FAQ to the uncategorized group.
    pub category_id: Option<Option<Uuid>>,
    pub tags: Option<Vec<String>>,
    pub is_visible: Option<bool>,
    pub sort_position: Option<i64>,
}

impl FaqUpdate {
    pub fn position(sort_position: i64) -> Self {
        FaqUpdate {
            sort_position: Some(sort_position),
            ..FaqUpdate::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAssistant {
    pub name: String,
    pub description: Option<String>,
    pub tone: Option<String>,
    pub personality: Option<String>,
    pub history_window: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SendMessage {
    pub assistant_id: Uuid,
    /// Continues this session, a new one is started when `None`.
    pub session_id: Option<Uuid>,
    pub message: String,
    pub is_test: bool,
}

/// Outcome of one chat turn.
#[derive(Debug)]
pub struct ChatExchange {
    pub session: entities::ChatSession,
    pub user_message: entities::ChatMessage,
    pub assistant_message: entities::ChatMessage,
    /// Set when the completion failed and the canned reply was stored instead.
    pub fallback: bool,
}

/// Owner-scoped store for FAQs and their categories.
#[async_trait]
pub trait KnowledgeBaseService: Send + Sync {
    async fn list_faqs(&self, user_id: Uuid, filter: FaqFilter) -> AppResult<Vec<entities::Faq>>;

    /// Returns `NotFound` when the FAQ is missing or owned by another user.
    async fn get_faq(&self, user_id: Uuid, faq_id: Uuid) -> AppResult<entities::Faq>;

    /// Returns `Validation` on a blank question or answer and `NotFound` when
    /// the referenced category or assistant is not the caller's.
    async fn create_faq(&self, user_id: Uuid, faq: NewFaq) -> AppResult<entities::Faq>;

    async fn update_faq(
        &self,
        user_id: Uuid,
        faq_id: Uuid,
        update: FaqUpdate,
    ) -> AppResult<entities::Faq>;

    /// Writes several positions at once, all or nothing. Returns `NotFound`
    /// when any FAQ is missing or owned by another user.
    async fn update_positions(
        &self,
        user_id: Uuid,
        positions: Vec<(Uuid, i64)>,
    ) -> AppResult<Vec<entities::Faq>>;

    /// Deleting an unknown id succeeds; deleting someone else's FAQ is `NotFound`.
    async fn delete_faq(&self, user_id: Uuid, faq_id: Uuid) -> AppResult<()>;

    /// Validates every row before creating any of them.
    async fn import_faqs(&self, user_id: Uuid, rows: Vec<NewFaq>) -> AppResult<Vec<entities::Faq>>;

    async fn list_categories(&self, user_id: Uuid) -> AppResult<Vec<entities::Category>>;

    /// Returns `Conflict` when the name exists already, compared case-insensitively.
    async fn create_category(
        &self,
        user_id: Uuid,
        category: NewCategory,
    ) -> AppResult<entities::Category>;

    /// Provisions the starter categories for an owner who has none.
    ///
    /// Safe to call on every load, concurrent calls create one set only.
    async fn ensure_default_categories(&self, user_id: Uuid) -> AppResult<Vec<entities::Category>>;
}

#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn list_assistants(&self, user_id: Uuid) -> AppResult<Vec<entities::Assistant>>;

    async fn get_assistant(&self, user_id: Uuid, assistant_id: Uuid)
    -> AppResult<entities::Assistant>;

    async fn create_assistant(
        &self,
        user_id: Uuid,
        assistant: NewAssistant,
    ) -> AppResult<entities::Assistant>;
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sessions ordered by most recent activity first.
    async fn list_sessions(&self, user_id: Uuid, limit: i64)
    -> AppResult<Vec<entities::ChatSession>>;

    async fn list_messages(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> AppResult<Vec<entities::ChatMessage>>;

    /// Runs one knowledge-base grounded chat turn.
    async fn send_message(&self, user_id: Uuid, message: SendMessage) -> AppResult<ChatExchange>;

    /// Answers a product help question from the dashboard, nothing is stored.
    async fn help(
        &self,
        user_id: Uuid,
        message: String,
        history: Vec<ChatTurn>,
    ) -> AppResult<AssistantReply>;
}

/// External text-completion capability. One attempt per call, no retry.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> AppResult<String>;
}
