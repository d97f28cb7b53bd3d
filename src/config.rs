//! Environment-driven settings.
//!
//! Every value falls back to a default so the server starts with an empty
//! environment. `.env` files are honoured through `dotenvy`.

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://faq_assistant.db?mode=rwc";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| T::from_str(s.trim()).ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let cors_origins = var_or("CORS_ORIGINS", "http://localhost:3000,http://localhost:5173")
            .split(',')
            .map(|origin| origin.trim().to_owned())
            .filter(|origin| !origin.is_empty())
            .collect();

        ServerConfig {
            bind_address: var_or("BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            cors_origins,
        }
    }
}

pub fn database_url() -> String {
    load_dotenv();
    var_or("DATABASE_URL", DEFAULT_DATABASE_URL)
}

/// Settings for the OpenAI-compatible completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl CompletionConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        CompletionConfig {
            api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: var_or("COMPLETION_BASE_URL", DEFAULT_COMPLETION_BASE_URL),
            model: var_or("COMPLETION_MODEL", DEFAULT_COMPLETION_MODEL),
            max_tokens: parsed_or("COMPLETION_MAX_TOKENS", 500),
            temperature: parsed_or("COMPLETION_TEMPERATURE", 0.7),
            timeout: Duration::from_secs(parsed_or("COMPLETION_TIMEOUT_SECS", 30)),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            api_key: None,
            base_url: DEFAULT_COMPLETION_BASE_URL.to_owned(),
            model: DEFAULT_COMPLETION_MODEL.to_owned(),
            max_tokens: 500,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Character budget for the knowledge base block, `None` when disabled.
pub fn max_context_chars() -> Option<usize> {
    load_dotenv();
    match parsed_or("ASSISTANT_MAX_CONTEXT_CHARS", DEFAULT_MAX_CONTEXT_CHARS) {
        0 => None,
        limit => Some(limit),
    }
}
