//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use di::Ref;
use faq_assistant_api::core::completion::CompletionRequest;
use faq_assistant_api::core::services::MyKnowledgeBaseService;
use faq_assistant_api::core::traits::{CompletionClient, KnowledgeBaseService};
use faq_assistant_api::error::{AppError, AppResult};
use faq_assistant_api::infrastructure::database::DatabaseConnection;
use faq_assistant_api::infrastructure::entities::{AnalyticsEvent, Assistant};
use faq_assistant_api::infrastructure::repositories::{
    DbAnalyticsRepository, DbAssistantRepository, DbCategoryRepository, DbChatSessionRepository,
    DbFaqRepository,
};
use faq_assistant_api::infrastructure::traits::{
    AnalyticsRepository, AssistantRepository, CategoryRepository, ChatSessionRepository,
    FaqRepository,
};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

/// Fresh in-memory database with migrations applied.
///
/// A single connection keeps every query on the same in-memory database.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

pub struct TestStore {
    pub pool: SqlitePool,
    pub faqs: Ref<dyn FaqRepository>,
    pub categories: Ref<dyn CategoryRepository>,
    pub assistants: Ref<dyn AssistantRepository>,
    pub sessions: Ref<dyn ChatSessionRepository>,
    pub analytics: Ref<dyn AnalyticsRepository>,
}

impl TestStore {
    pub async fn new() -> TestStore {
        let pool = setup_test_db().await;
        let connection = Ref::new(DatabaseConnection::from_pool(pool.clone()));

        TestStore {
            pool,
            faqs: Ref::new(DbFaqRepository::new(connection.clone())),
            categories: Ref::new(DbCategoryRepository::new(connection.clone())),
            assistants: Ref::new(DbAssistantRepository::new(connection.clone())),
            sessions: Ref::new(DbChatSessionRepository::new(connection.clone())),
            analytics: Ref::new(DbAnalyticsRepository::new(connection)),
        }
    }

    pub fn knowledge_base(&self) -> Ref<dyn KnowledgeBaseService> {
        self.knowledge_base_with(self.faqs.clone())
    }

    /// Knowledge base writing FAQs through `faqs` instead of the plain repository.
    pub fn knowledge_base_with(&self, faqs: Ref<dyn FaqRepository>) -> Ref<dyn KnowledgeBaseService> {
        Ref::new(MyKnowledgeBaseService::new(
            faqs,
            self.categories.clone(),
            self.assistants.clone(),
        ))
    }

    pub async fn assistant(&self, user_id: Uuid, name: &str, history_window: i64) -> Assistant {
        let now = Utc::now();
        self.assistants
            .insert_assistant(Assistant {
                id: Uuid::new_v4(),
                user_id,
                name: name.to_owned(),
                description: None,
                tone: Some("friendly".to_owned()),
                personality: Some(format!("You are {name}.")),
                is_active: true,
                history_window,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }
}

/// Completion client answering from a script and remembering every request.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<AppResult<String>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn replying(replies: Vec<AppResult<String>>) -> ScriptedCompletion {
        ScriptedCompletion {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> CompletionRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> AppResult<String> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Upstream("no scripted reply".to_owned())))
    }
}

/// Analytics sink whose writes always fail.
pub struct BrokenAnalytics;

#[async_trait]
impl AnalyticsRepository for BrokenAnalytics {
    async fn record_event(&self, _event: AnalyticsEvent) -> AppResult<()> {
        Err(AppError::Persistence(sqlx::Error::PoolTimedOut))
    }

    async fn list_events(&self, _user_id: Uuid) -> AppResult<Vec<AnalyticsEvent>> {
        Ok(Vec::new())
    }
}
