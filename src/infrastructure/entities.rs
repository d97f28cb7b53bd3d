//! Database entities

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Faq {
    pub id: Uuid,
    pub user_id: Uuid,
    pub assistant_id: Option<Uuid>,
    pub question: String,
    pub answer: String,
    pub category_id: Option<Uuid>,
    pub tags: Json<Vec<String>>,
    pub is_visible: bool,
    pub sort_position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub color: String,
    pub sort_position: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Assistant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub tone: Option<String>,
    pub personality: Option<String>,
    pub is_active: bool,
    /// Prior session messages forwarded with each turn.
    pub history_window: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub assistant_id: Uuid,
    pub is_test_session: bool,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[repr(u8)]
pub enum MessageRole {
    User = 1,
    Assistant = 2,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub event_type: String,
    pub event_data: Json<Value>,
    pub assistant_id: Option<Uuid>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
