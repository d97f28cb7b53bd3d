//! Chat endpoints

use crate::api::ExtractUser;
use crate::api::chat::schemas::{
    ChatReply, HelpRequest, HelpReply, MessagesList, SendChatMessage, SessionList, SessionsQuery,
};
use crate::core::traits::{ChatService, SendMessage};
use crate::error::AppError;
use axum::extract::{Path, Query};
use axum::routing::{get, post};
use axum::{Json, Router};
use di_axum::Inject;
use uuid::Uuid;

const DEFAULT_SESSION_LIMIT: i64 = 20;

pub fn router() -> Router {
    Router::new()
        .route("/", post(send_message))
        .route("/help", post(help))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id/messages", get(session_messages))
}

async fn send_message(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
    Json(message): Json<SendChatMessage>,
) -> Result<Json<ChatReply>, AppError> {
    let exchange = chat_service
        .send_message(
            current_user,
            SendMessage {
                assistant_id: message.assistant_id,
                session_id: message.session_id,
                message: message.message,
                is_test: message.is_test,
            },
        )
        .await?;

    Ok(Json(ChatReply::from(exchange)))
}

async fn help(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
    Json(request): Json<HelpRequest>,
) -> Result<Json<HelpReply>, AppError> {
    let reply = chat_service
        .help(current_user, request.message, request.history)
        .await?;

    Ok(Json(HelpReply {
        fallback: reply.is_fallback(),
        reply: reply.content,
    }))
}

async fn list_sessions(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<SessionList>, AppError> {
    let sessions = chat_service
        .list_sessions(current_user, query.limit.unwrap_or(DEFAULT_SESSION_LIMIT))
        .await?;

    Ok(Json(SessionList {
        sessions: sessions.into_iter().map(schemas::Session::from).collect(),
    }))
}

async fn session_messages(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<MessagesList>, AppError> {
    let messages = chat_service
        .list_messages(current_user, session_id)
        .await?;

    Ok(Json(MessagesList {
        messages: messages.into_iter().map(schemas::Message::from).collect(),
    }))
}

pub mod schemas {
    use crate::core::assistant::ChatTurn;
    use crate::core::traits::ChatExchange;
    use crate::infrastructure::entities;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Deserialize, Debug)]
    pub struct SendChatMessage {
        pub assistant_id: Uuid,
        pub session_id: Option<Uuid>,
        pub message: String,
        #[serde(default)]
        pub is_test: bool,
    }

    #[derive(Deserialize, Debug)]
    pub struct HelpRequest {
        pub message: String,
        #[serde(default)]
        pub history: Vec<ChatTurn>,
    }

    #[derive(Serialize, Debug)]
    pub struct HelpReply {
        pub reply: String,
        pub fallback: bool,
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct SessionsQuery {
        pub limit: Option<i64>,
    }

    #[derive(Serialize, Debug)]
    pub enum MessageRole {
        User,
        Assistant,
    }

    impl From<entities::MessageRole> for MessageRole {
        fn from(role: entities::MessageRole) -> Self {
            match role {
                entities::MessageRole::User => MessageRole::User,
                entities::MessageRole::Assistant => MessageRole::Assistant,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct Message {
        pub session_id: Uuid,
        pub id: Uuid,
        pub role: MessageRole,
        pub content: String,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::ChatMessage> for Message {
        fn from(message: entities::ChatMessage) -> Self {
            Message {
                session_id: message.session_id,
                id: message.id,
                role: message.role.into(),
                content: message.content,
                created_at: message.created_at,
            }
        }
    }

    #[derive(Serialize, Debug, Default)]
    pub struct MessagesList {
        pub messages: Vec<Message>,
    }

    #[derive(Serialize, Debug)]
    pub struct Session {
        pub id: Uuid,
        pub assistant_id: Uuid,
        pub is_test_session: bool,
        pub started_at: DateTime<Utc>,
        pub last_activity: DateTime<Utc>,
    }

    impl From<entities::ChatSession> for Session {
        fn from(session: entities::ChatSession) -> Self {
            Session {
                id: session.id,
                assistant_id: session.assistant_id,
                is_test_session: session.is_test_session,
                started_at: session.started_at,
                last_activity: session.last_activity,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct SessionList {
        pub sessions: Vec<Session>,
    }

    #[derive(Serialize, Debug)]
    pub struct ChatReply {
        pub session: Session,
        pub user_message: Message,
        pub assistant_message: Message,
        /// The completion failed and `assistant_message` holds the canned reply.
        pub fallback: bool,
    }

    impl From<ChatExchange> for ChatReply {
        fn from(exchange: ChatExchange) -> Self {
            ChatReply {
                session: exchange.session.into(),
                user_message: exchange.user_message.into(),
                assistant_message: exchange.assistant_message.into(),
                fallback: exchange.fallback,
            }
        }
    }
}
