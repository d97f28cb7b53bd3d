//! Client for OpenAI-compatible `/chat/completions` endpoints.

use crate::config::CompletionConfig;
use crate::core::assistant::{ChatTurn, Role};
use crate::core::traits::CompletionClient;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use di::{inject, injectable};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Everything the completion service sees for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    /// Forwarded history followed by the latest user message.
    pub messages: Vec<ChatTurn>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireErrorBody {
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

pub struct OpenAiCompletionClient {
    http: reqwest::Client,
    config: CompletionConfig,
}

#[injectable(CompletionClient)]
impl OpenAiCompletionClient {
    #[inject]
    pub fn create() -> OpenAiCompletionClient {
        OpenAiCompletionClient::new(CompletionConfig::from_env())
    }
}

impl OpenAiCompletionClient {
    pub fn new(config: CompletionConfig) -> OpenAiCompletionClient {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("falling back to a default HTTP client: {e}");
                reqwest::Client::new()
            });

        OpenAiCompletionClient { http, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> AppResult<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("API key not configured".to_owned()))?;

        let messages = std::iter::once(WireMessage {
            role: "system",
            content: &request.system,
        })
        .chain(request.messages.iter().map(|turn| WireMessage {
            role: role_name(turn.role),
            content: &turn.content,
        }))
        .collect();

        let body = WireRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(
            "requesting completion from {} with {} messages",
            self.config.model,
            body.messages.len()
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<WireErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .map(|error| error.message)
                .unwrap_or_else(|| "Unknown error".to_owned());
            return Err(AppError::Upstream(format!("{status}: {detail}")));
        }

        let data: WireResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("malformed response: {e}")))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Upstream("completion contained no content".to_owned()))
    }
}
