//! AI FAQ assistant backend
//!
//! Serves the knowledge base and chat API over HTTP.

use faq_assistant_api::api;
use faq_assistant_api::config::ServerConfig;
use faq_assistant_api::core::assistant::ResponseAssembler;
use faq_assistant_api::core::completion::OpenAiCompletionClient;
use faq_assistant_api::core::services::{
    MyAssistantService, MyChatService, MyKnowledgeBaseService,
};
use faq_assistant_api::infrastructure::database::DatabaseConnection;
use faq_assistant_api::infrastructure::repositories::{
    DbAnalyticsRepository, DbAssistantRepository, DbCategoryRepository, DbChatSessionRepository,
    DbFaqRepository,
};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use log::{info, warn};
use tokio::runtime::{Builder, Runtime};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(web_server_task())
}

async fn web_server_task() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    DatabaseConnection::create()
        .migrate()
        .await
        .context("failed to apply migrations")?;

    let provider = ServiceCollection::new()
        .add(DatabaseConnection::singleton())
        .add(DbFaqRepository::scoped())
        .add(DbCategoryRepository::scoped())
        .add(DbAssistantRepository::scoped())
        .add(DbChatSessionRepository::scoped())
        .add(DbAnalyticsRepository::scoped())
        .add(OpenAiCompletionClient::singleton())
        .add(ResponseAssembler::scoped())
        .add(MyKnowledgeBaseService::scoped())
        .add(MyAssistantService::scoped())
        .add(MyChatService::scoped())
        .build_provider()
        .context("failed to build the service provider")?;

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {origin}");
                None
            }
        })
        .collect();

    let app = api::router()
        .layer(
            CorsLayer::new()
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                .allow_origin(origins),
        )
        .with_provider(provider);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("cannot bind {}", config.bind_address))?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    info!("Shutting down...");
    Ok(())
}
