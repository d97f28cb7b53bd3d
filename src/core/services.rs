//! Implementations for the service the app needs.
//!

use crate::core::assistant::{
    AnalyticsTag, AssistantReply, ChatTurn, Persona, ReplyRequest, ResponseAssembler,
    ResponsePolicy, SessionType,
};
use crate::core::ordering;
use crate::core::traits::{
    AssistantService, ChatExchange, ChatService, FaqFilter, FaqUpdate, KnowledgeBaseService,
    NewAssistant, NewCategory, NewFaq, SendMessage,
};
use crate::error::{AppError, AppResult};
use crate::infrastructure::entities::{
    Assistant, Category, ChatMessage, ChatSession, Faq, MessageRole,
};
use crate::infrastructure::traits::{
    AssistantRepository, CategoryRepository, ChatSessionRepository, FaqRepository,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use di::{Ref, injectable};
use log::{debug, info};
use sqlx::types::Json;
use uuid::Uuid;

/// Starter categories: name, description, color.
pub const DEFAULT_CATEGORIES: [(&str, &str, &str); 4] = [
    ("General", "General questions", "#3b82f6"),
    ("Technical", "Technical questions and troubleshooting", "#10b981"),
    ("Billing", "Payments, invoices and plans", "#f59e0b"),
    ("Getting Started", "First steps and onboarding", "#8b5cf6"),
];

pub const DEFAULT_CATEGORY_COLOR: &str = "#6b7280";

fn required(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::validation(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_owned())
    }
}

fn check_position(position: i64) -> AppResult<i64> {
    if position < 0 {
        Err(AppError::validation("sort position must not be negative"))
    } else {
        Ok(position)
    }
}

/// Trims tags, drops blanks and duplicates, keeps first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !unique.iter().any(|t| t == tag) {
            unique.push(tag.to_owned());
        }
    }
    unique
}

fn check_color(color: &str) -> AppResult<String> {
    let color = color.trim();
    let hex = color.strip_prefix('#').unwrap_or_default();
    if (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(color.to_owned())
    } else {
        Err(AppError::validation(format!("`{color}` is not a hex color")))
    }
}

#[injectable(KnowledgeBaseService)]
pub struct MyKnowledgeBaseService {
    faqs: Ref<dyn FaqRepository>,
    categories: Ref<dyn CategoryRepository>,
    assistants: Ref<dyn AssistantRepository>,
}

impl MyKnowledgeBaseService {
    pub fn new(
        faqs: Ref<dyn FaqRepository>,
        categories: Ref<dyn CategoryRepository>,
        assistants: Ref<dyn AssistantRepository>,
    ) -> Self {
        MyKnowledgeBaseService {
            faqs,
            categories,
            assistants,
        }
    }

    async fn owned_faq(&self, user_id: Uuid, faq_id: Uuid) -> AppResult<Faq> {
        self.faqs
            .find_faq(faq_id)
            .await?
            .filter(|faq| faq.user_id == user_id)
            .ok_or(AppError::NotFound("faq"))
    }

    async fn check_category(&self, user_id: Uuid, category_id: Option<Uuid>) -> AppResult<()> {
        if let Some(category_id) = category_id {
            self.categories
                .find_category(user_id, category_id)
                .await?
                .ok_or(AppError::NotFound("category"))?;
        }
        Ok(())
    }

    async fn check_assistant(&self, user_id: Uuid, assistant_id: Option<Uuid>) -> AppResult<()> {
        if let Some(assistant_id) = assistant_id {
            self.assistants
                .find_assistant(user_id, assistant_id)
                .await?
                .ok_or(AppError::NotFound("assistant"))?;
        }
        Ok(())
    }

    /// Runs every check `create_faq` does, without writing.
    async fn validate_new_faq(&self, user_id: Uuid, faq: &NewFaq) -> AppResult<()> {
        required("question", &faq.question)?;
        required("answer", &faq.answer)?;
        if let Some(position) = faq.sort_position {
            check_position(position)?;
        }
        self.check_category(user_id, faq.category_id).await?;
        self.check_assistant(user_id, faq.assistant_id).await
    }
}

#[async_trait]
impl KnowledgeBaseService for MyKnowledgeBaseService {
    async fn list_faqs(&self, user_id: Uuid, filter: FaqFilter) -> AppResult<Vec<Faq>> {
        self.faqs
            .list_faqs(user_id, filter.assistant_id, filter.only_visible)
            .await
    }

    async fn get_faq(&self, user_id: Uuid, faq_id: Uuid) -> AppResult<Faq> {
        self.owned_faq(user_id, faq_id).await
    }

    async fn create_faq(&self, user_id: Uuid, faq: NewFaq) -> AppResult<Faq> {
        self.validate_new_faq(user_id, &faq).await?;

        let sort_position = match faq.sort_position {
            Some(position) => position,
            None => {
                self.faqs
                    .next_sort_position(user_id, faq.category_id)
                    .await?
            }
        };

        let now = Utc::now();
        let created = self
            .faqs
            .insert_faq(Faq {
                id: Uuid::new_v4(),
                user_id,
                assistant_id: faq.assistant_id,
                question: required("question", &faq.question)?,
                answer: faq.answer,
                category_id: faq.category_id,
                tags: Json(normalize_tags(faq.tags)),
                is_visible: faq.is_visible.unwrap_or(true),
                sort_position,
                created_at: now,
                updated_at: now,
            })
            .await?;

        debug!("created faq {} for user {user_id}", created.id);
        Ok(created)
    }

    async fn update_faq(&self, user_id: Uuid, faq_id: Uuid, update: FaqUpdate) -> AppResult<Faq> {
        let mut faq = self.owned_faq(user_id, faq_id).await?;

        if let Some(question) = update.question {
            faq.question = required("question", &question)?;
        }
        if let Some(answer) = update.answer {
            required("answer", &answer)?;
            faq.answer = answer;
        }
        if let Some(tags) = update.tags {
            faq.tags = Json(normalize_tags(tags));
        }
        if let Some(is_visible) = update.is_visible {
            faq.is_visible = is_visible;
        }

        let moved = match update.category_id {
            Some(category_id) if category_id != faq.category_id => {
                self.check_category(user_id, category_id).await?;
                faq.category_id = category_id;
                true
            }
            _ => false,
        };

        faq.sort_position = match update.sort_position {
            Some(position) => check_position(position)?,
            None if moved => {
                self.faqs
                    .next_sort_position(user_id, faq.category_id)
                    .await?
            }
            None => faq.sort_position,
        };

        faq.updated_at = Utc::now();
        self.faqs
            .update_faq(faq)
            .await?
            .ok_or(AppError::NotFound("faq"))
    }

    async fn update_positions(
        &self,
        user_id: Uuid,
        positions: Vec<(Uuid, i64)>,
    ) -> AppResult<Vec<Faq>> {
        if positions.is_empty() {
            return Ok(Vec::new());
        }
        for (_, position) in &positions {
            check_position(*position)?;
        }

        self.faqs
            .update_positions(user_id, positions, Utc::now())
            .await?
            .ok_or(AppError::NotFound("faq"))
    }

    async fn delete_faq(&self, user_id: Uuid, faq_id: Uuid) -> AppResult<()> {
        match self.faqs.find_faq(faq_id).await? {
            None => Ok(()),
            Some(faq) if faq.user_id != user_id => Err(AppError::NotFound("faq")),
            Some(_) => {
                // Remaining positions keep their gap until the next reorder.
                self.faqs.delete_faq(user_id, faq_id).await?;
                Ok(())
            }
        }
    }

    async fn import_faqs(&self, user_id: Uuid, rows: Vec<NewFaq>) -> AppResult<Vec<Faq>> {
        for (index, row) in rows.iter().enumerate() {
            self.validate_new_faq(user_id, row)
                .await
                .map_err(|e| match e {
                    AppError::Validation(_) | AppError::NotFound(_) => {
                        AppError::Validation(format!("row {index}: {e}"))
                    }
                    e => e,
                })?;
        }

        let mut imported = Vec::with_capacity(rows.len());
        for row in rows {
            imported.push(self.create_faq(user_id, row).await?);
        }
        info!("imported {} faqs for user {user_id}", imported.len());
        Ok(imported)
    }

    async fn list_categories(&self, user_id: Uuid) -> AppResult<Vec<Category>> {
        self.categories.list_categories(user_id).await
    }

    async fn create_category(&self, user_id: Uuid, category: NewCategory) -> AppResult<Category> {
        let name = required("name", &category.name)?;
        let color = match category.color {
            Some(color) => check_color(&color)?,
            None => DEFAULT_CATEGORY_COLOR.to_owned(),
        };

        let existing = self.categories.list_categories(user_id).await?;
        let lowered = name.to_lowercase();
        if existing.iter().any(|c| c.name.to_lowercase() == lowered) {
            return Err(AppError::Conflict(format!("category `{name}` already exists")));
        }
        let sort_position = existing
            .iter()
            .map(|c| c.sort_position + 1)
            .max()
            .unwrap_or(0);

        self.categories
            .insert_category(Category {
                id: Uuid::new_v4(),
                user_id,
                name,
                description: category.description.unwrap_or_default().trim().to_owned(),
                color,
                sort_position,
                created_at: Utc::now(),
            })
            .await
    }

    async fn ensure_default_categories(&self, user_id: Uuid) -> AppResult<Vec<Category>> {
        let now = Utc::now();
        let defaults = DEFAULT_CATEGORIES
            .iter()
            .enumerate()
            .map(|(position, (name, description, color))| Category {
                id: Uuid::new_v4(),
                user_id,
                name: (*name).to_owned(),
                description: (*description).to_owned(),
                color: (*color).to_owned(),
                sort_position: position as i64,
                created_at: now,
            })
            .collect();

        let inserted = self
            .categories
            .insert_defaults_if_empty(user_id, defaults)
            .await?;
        if inserted > 0 {
            info!("provisioned {inserted} default categories for user {user_id}");
        }

        self.categories.list_categories(user_id).await
    }
}

#[injectable(AssistantService)]
pub struct MyAssistantService {
    repo: Ref<dyn AssistantRepository>,
}

impl MyAssistantService {
    pub fn new(repo: Ref<dyn AssistantRepository>) -> Self {
        MyAssistantService { repo }
    }
}

#[async_trait]
impl AssistantService for MyAssistantService {
    async fn list_assistants(&self, user_id: Uuid) -> AppResult<Vec<Assistant>> {
        self.repo.list_active_assistants(user_id).await
    }

    async fn get_assistant(&self, user_id: Uuid, assistant_id: Uuid) -> AppResult<Assistant> {
        self.repo
            .find_assistant(user_id, assistant_id)
            .await?
            .ok_or(AppError::NotFound("assistant"))
    }

    async fn create_assistant(&self, user_id: Uuid, assistant: NewAssistant) -> AppResult<Assistant> {
        let name = required("name", &assistant.name)?;
        let history_window = assistant.history_window.unwrap_or(0);
        if history_window < 0 {
            return Err(AppError::validation("history window must not be negative"));
        }

        let now = Utc::now();
        self.repo
            .insert_assistant(Assistant {
                id: Uuid::new_v4(),
                user_id,
                name,
                description: assistant.description,
                tone: assistant.tone,
                personality: assistant.personality,
                is_active: true,
                history_window,
                created_at: now,
                updated_at: now,
            })
            .await
    }
}

#[injectable(ChatService)]
pub struct MyChatService {
    assistants: Ref<dyn AssistantRepository>,
    sessions: Ref<dyn ChatSessionRepository>,
    knowledge_base: Ref<dyn KnowledgeBaseService>,
    assembler: Ref<ResponseAssembler>,
}

impl MyChatService {
    pub fn new(
        assistants: Ref<dyn AssistantRepository>,
        sessions: Ref<dyn ChatSessionRepository>,
        knowledge_base: Ref<dyn KnowledgeBaseService>,
        assembler: Ref<ResponseAssembler>,
    ) -> Self {
        MyChatService {
            assistants,
            sessions,
            knowledge_base,
            assembler,
        }
    }

    async fn owned_session(&self, user_id: Uuid, session_id: Uuid) -> AppResult<ChatSession> {
        self.sessions
            .find_session(user_id, session_id)
            .await?
            .ok_or(AppError::NotFound("chat session"))
    }

    /// Appends a message, moving `last_activity` strictly forward.
    async fn append(
        &self,
        session: &mut ChatSession,
        role: MessageRole,
        content: String,
    ) -> AppResult<ChatMessage> {
        let now = Utc::now().max(session.last_activity + Duration::microseconds(1));
        let message = self
            .sessions
            .append_message(
                ChatMessage {
                    id: Uuid::new_v4(),
                    session_id: session.id,
                    role,
                    content,
                    created_at: now,
                },
                now,
            )
            .await?;
        session.last_activity = now;
        Ok(message)
    }

    /// Visible FAQs in the assistant's scope, in knowledge base display order.
    async fn context_faqs(&self, user_id: Uuid, assistant_id: Uuid) -> AppResult<Vec<Faq>> {
        let faqs = self
            .knowledge_base
            .list_faqs(
                user_id,
                FaqFilter {
                    assistant_id: Some(assistant_id),
                    only_visible: true,
                },
            )
            .await?;
        let categories = self.knowledge_base.list_categories(user_id).await?;

        Ok(ordering::group_by_category(&faqs, &categories)
            .into_iter()
            .flat_map(|group| group.faqs)
            .collect())
    }
}

#[async_trait]
impl ChatService for MyChatService {
    async fn list_sessions(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<ChatSession>> {
        self.sessions
            .list_recent_sessions(user_id, limit.clamp(1, 100))
            .await
    }

    async fn list_messages(&self, user_id: Uuid, session_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        let session = self.owned_session(user_id, session_id).await?;
        self.sessions.list_session_messages(session.id).await
    }

    async fn send_message(&self, user_id: Uuid, request: SendMessage) -> AppResult<ChatExchange> {
        let message = required("message", &request.message)?;

        let assistant = self
            .assistants
            .find_assistant(user_id, request.assistant_id)
            .await?
            .filter(|assistant| assistant.is_active)
            .ok_or(AppError::NotFound("assistant"))?;

        let mut session = match request.session_id {
            Some(session_id) => {
                let session = self.owned_session(user_id, session_id).await?;
                if session.assistant_id != assistant.id {
                    return Err(AppError::NotFound("chat session"));
                }
                session
            }
            None => {
                let now = Utc::now();
                self.sessions
                    .create_session(ChatSession {
                        id: Uuid::new_v4(),
                        user_id,
                        assistant_id: assistant.id,
                        is_test_session: request.is_test,
                        started_at: now,
                        last_activity: now,
                    })
                    .await?
            }
        };

        let window = usize::try_from(assistant.history_window).unwrap_or(0);
        let history: Vec<ChatTurn> = if window > 0 {
            self.sessions
                .list_session_messages(session.id)
                .await?
                .into_iter()
                .map(ChatTurn::from)
                .collect()
        } else {
            Vec::new()
        };

        let user_message = self
            .append(&mut session, MessageRole::User, message.clone())
            .await?;

        let faqs = self.context_faqs(user_id, assistant.id).await?;
        let persona = Persona::from(&assistant);
        let session_type = if session.is_test_session {
            SessionType::Test
        } else {
            SessionType::Production
        };

        let reply = self
            .assembler
            .respond(ReplyRequest {
                policy: ResponsePolicy::knowledge_base(window),
                persona: &persona,
                faqs: &faqs,
                history: &history,
                message: &message,
                analytics: Some(AnalyticsTag {
                    user_id,
                    assistant_id: Some(assistant.id),
                    session_type,
                }),
            })
            .await;

        let fallback = reply.is_fallback();
        let assistant_message = self
            .append(&mut session, MessageRole::Assistant, reply.content)
            .await?;

        Ok(ChatExchange {
            session,
            user_message,
            assistant_message,
            fallback,
        })
    }

    async fn help(
        &self,
        _user_id: Uuid,
        message: String,
        history: Vec<ChatTurn>,
    ) -> AppResult<AssistantReply> {
        let message = required("message", &message)?;
        let persona = Persona::dashboard_help();

        Ok(self
            .assembler
            .respond(ReplyRequest {
                policy: ResponsePolicy::dashboard_help(),
                persona: &persona,
                faqs: &[],
                history: &history,
                message: &message,
                analytics: None,
            })
            .await)
    }
}
