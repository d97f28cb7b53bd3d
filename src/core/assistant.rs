//! Assistant response assembly.
//!
//! Turns an assistant persona and its knowledge base into a system prompt,
//! forwards it to the completion client and records the exchange. Completion
//! failures never reach the chat UI: they are logged and replaced by a canned
//! reply.

use crate::core::completion::CompletionRequest;
use crate::core::traits::CompletionClient;
use crate::error::{AppError, AppResult};
use crate::infrastructure::entities;
use crate::infrastructure::traits::AnalyticsRepository;
use crate::config;
use chrono::Utc;
use di::{Ref, inject, injectable};
use log::{error, info, warn};
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json;
use uuid::Uuid;

pub const FAQ_FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";
pub const HELP_FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble responding right now. Please try again later.";

/// Turns of client history the dashboard help assistant forwards.
pub const HELP_HISTORY_WINDOW: usize = 10;

pub const CHAT_MESSAGE_EVENT: &str = "chat_message";

const DEFAULT_PERSONALITY: &str = "Be helpful and friendly.";
const DEFAULT_TONE: &str = "professional";

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a helpful AI assistant. {{ personality }}
Your tone should be {{ tone }}.
{%- if knowledge_base %}

Knowledge Base:
{{ knowledge_base }}

If you have relevant information from the knowledge base above, use it to provide accurate answers.
If the question is not covered in your knowledge base, provide a helpful general response.
{%- endif %}"#;

/// Author of a conversation turn. The system instruction is built server-side,
/// so clients can only send user and assistant turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ChatTurn {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatTurn {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<entities::ChatMessage> for ChatTurn {
    fn from(m: entities::ChatMessage) -> Self {
        Self {
            content: m.content,
            role: match m.role {
                entities::MessageRole::User => Role::User,
                entities::MessageRole::Assistant => Role::Assistant,
            },
        }
    }
}

/// Which assistant a turn is answered by.
///
/// The knowledge-base assistant forwards its configured history window (none
/// by default); the dashboard help assistant ignores FAQs and always forwards
/// the last [`HELP_HISTORY_WINDOW`] turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePolicy {
    KnowledgeBase { history_window: usize },
    DashboardHelp { history_window: usize },
}

impl ResponsePolicy {
    pub fn knowledge_base(history_window: usize) -> Self {
        ResponsePolicy::KnowledgeBase { history_window }
    }

    pub fn dashboard_help() -> Self {
        ResponsePolicy::DashboardHelp {
            history_window: HELP_HISTORY_WINDOW,
        }
    }

    pub fn history_window(&self) -> usize {
        match *self {
            ResponsePolicy::KnowledgeBase { history_window }
            | ResponsePolicy::DashboardHelp { history_window } => history_window,
        }
    }

    pub fn fallback_reply(&self) -> &'static str {
        match self {
            ResponsePolicy::KnowledgeBase { .. } => FAQ_FALLBACK_REPLY,
            ResponsePolicy::DashboardHelp { .. } => HELP_FALLBACK_REPLY,
        }
    }

    fn uses_knowledge_base(&self) -> bool {
        matches!(self, ResponsePolicy::KnowledgeBase { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Persona {
    pub name: String,
    pub tone: Option<String>,
    pub personality: Option<String>,
}

impl Persona {
    pub fn dashboard_help() -> Self {
        Persona {
            name: "Dashboard Assistant".to_owned(),
            tone: Some("friendly".to_owned()),
            personality: Some(
                "You help users of the AI FAQ Assistant dashboard create assistants, manage FAQs and categories, test chats and read their analytics."
                    .to_owned(),
            ),
        }
    }
}

impl From<&entities::Assistant> for Persona {
    fn from(assistant: &entities::Assistant) -> Self {
        Persona {
            name: assistant.name.clone(),
            tone: assistant.tone.clone(),
            personality: assistant.personality.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Test,
    Production,
}

/// Who the analytics event of a successful turn is attributed to.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticsTag {
    pub user_id: Uuid,
    pub assistant_id: Option<Uuid>,
    pub session_type: SessionType,
}

pub struct ReplyRequest<'a> {
    pub policy: ResponsePolicy,
    pub persona: &'a Persona,
    /// Rendered as-is; filtering and ordering are the caller's job.
    pub faqs: &'a [entities::Faq],
    pub history: &'a [ChatTurn],
    pub message: &'a str,
    /// `None` skips the analytics write.
    pub analytics: Option<AnalyticsTag>,
}

#[derive(Debug)]
pub struct AssistantReply {
    pub content: String,
    /// The completion error hidden behind the fallback text, for logging.
    pub error: Option<AppError>,
}

impl AssistantReply {
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

fn render_pair(faq: &entities::Faq) -> String {
    format!("Q: {}\nA: {}", faq.question, faq.answer)
}

/// Renders FAQs as `Q: …` / `A: …` pairs separated by blank lines.
///
/// No filtering happens here: a hidden FAQ in `faqs` ends up in the context.
pub fn build_context(faqs: &[entities::Faq]) -> String {
    build_context_within(faqs, None)
}

/// Like [`build_context`], but stops before the first pair that would push
/// the block past `max_chars` characters.
pub fn build_context_within(faqs: &[entities::Faq], max_chars: Option<usize>) -> String {
    let mut context = String::new();
    let mut used = 0;

    for (index, faq) in faqs.iter().enumerate() {
        let pair = render_pair(faq);
        let separator = if context.is_empty() { 0 } else { 2 };
        let cost = separator + pair.chars().count();

        if let Some(limit) = max_chars {
            if used + cost > limit {
                warn!(
                    "knowledge base truncated to {index} of {} FAQs ({limit} characters)",
                    faqs.len()
                );
                break;
            }
        }

        if separator > 0 {
            context.push_str("\n\n");
        }
        context.push_str(&pair);
        used += cost;
    }

    context
}

/// System instruction combining the persona with the knowledge base block.
pub fn system_prompt(persona: &Persona, knowledge_base: &str) -> AppResult<String> {
    let personality = persona
        .personality
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_PERSONALITY);
    let tone = persona
        .tone
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_TONE);

    let env = Environment::new();
    let prompt = env.render_str(
        SYSTEM_PROMPT_TEMPLATE,
        context! {
            personality => personality,
            tone => tone,
            knowledge_base => knowledge_base,
        },
    )?;
    Ok(prompt)
}

pub struct ResponseAssembler {
    completion: Ref<dyn CompletionClient>,
    analytics: Ref<dyn AnalyticsRepository>,
    max_context_chars: Option<usize>,
}

#[injectable]
impl ResponseAssembler {
    #[inject]
    pub fn create(
        completion: Ref<dyn CompletionClient>,
        analytics: Ref<dyn AnalyticsRepository>,
    ) -> ResponseAssembler {
        ResponseAssembler::new(completion, analytics, config::max_context_chars())
    }
}

impl ResponseAssembler {
    pub fn new(
        completion: Ref<dyn CompletionClient>,
        analytics: Ref<dyn AnalyticsRepository>,
        max_context_chars: Option<usize>,
    ) -> ResponseAssembler {
        ResponseAssembler {
            completion,
            analytics,
            max_context_chars,
        }
    }

    /// The exact payload `respond` would send.
    pub fn completion_request(&self, request: &ReplyRequest<'_>) -> AppResult<CompletionRequest> {
        let knowledge_base = if request.policy.uses_knowledge_base() {
            build_context_within(request.faqs, self.max_context_chars)
        } else {
            String::new()
        };
        let system = system_prompt(request.persona, &knowledge_base)?;

        let window = request.policy.history_window();
        let skip = request.history.len().saturating_sub(window);
        let mut messages: Vec<ChatTurn> = request.history[skip..].to_vec();
        messages.push(ChatTurn::user(request.message));

        Ok(CompletionRequest { system, messages })
    }

    /// Answers one turn. Never fails: completion errors become the policy's
    /// fallback reply and skip analytics.
    pub async fn respond(&self, request: ReplyRequest<'_>) -> AssistantReply {
        let result = match self.completion_request(&request) {
            Ok(completion_request) => self.completion.complete(completion_request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(content) => {
                if let Some(tag) = request.analytics {
                    self.record_exchange(tag, request.message, &content).await;
                }
                AssistantReply {
                    content,
                    error: None,
                }
            }
            Err(e) => {
                error!("{} failed to answer: {e}", request.persona.name);
                AssistantReply {
                    content: request.policy.fallback_reply().to_owned(),
                    error: Some(e),
                }
            }
        }
    }

    /// Best-effort: a failed write is logged and otherwise ignored.
    async fn record_exchange(&self, tag: AnalyticsTag, user_message: &str, reply: &str) {
        let event = entities::AnalyticsEvent {
            id: Uuid::new_v4(),
            event_type: CHAT_MESSAGE_EVENT.to_owned(),
            event_data: Json(json!({
                "user_message": user_message,
                "ai_response": reply,
                "session_type": tag.session_type,
            })),
            assistant_id: tag.assistant_id,
            user_id: tag.user_id,
            created_at: Utc::now(),
        };

        match self.analytics.record_event(event).await {
            Ok(()) => info!("recorded chat analytics for user {}", tag.user_id),
            Err(e) => warn!("chat analytics not recorded: {e}"),
        }
    }
}
