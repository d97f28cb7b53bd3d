//! Assistant endpoints

use crate::api::ExtractUser;
use crate::api::assistants::schemas::{AssistantList, CreateAssistant};
use crate::core::traits::{AssistantService, NewAssistant};
use crate::error::AppError;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;
use uuid::Uuid;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_assistants).post(create_assistant))
        .route("/:id", get(get_assistant))
}

async fn list_assistants(
    Inject(assistant_service): Inject<dyn AssistantService>,
    ExtractUser(current_user): ExtractUser,
) -> Result<Json<AssistantList>, AppError> {
    let assistants = assistant_service.list_assistants(current_user).await?;

    Ok(Json(AssistantList {
        assistants: assistants
            .into_iter()
            .map(schemas::Assistant::from)
            .collect(),
    }))
}

async fn get_assistant(
    Inject(assistant_service): Inject<dyn AssistantService>,
    ExtractUser(current_user): ExtractUser,
    Path(assistant_id): Path<Uuid>,
) -> Result<Json<schemas::Assistant>, AppError> {
    let assistant = assistant_service
        .get_assistant(current_user, assistant_id)
        .await?;
    Ok(Json(assistant.into()))
}

async fn create_assistant(
    Inject(assistant_service): Inject<dyn AssistantService>,
    ExtractUser(current_user): ExtractUser,
    Json(create_assistant): Json<CreateAssistant>,
) -> Result<(StatusCode, Json<schemas::Assistant>), AppError> {
    let assistant = assistant_service
        .create_assistant(
            current_user,
            NewAssistant {
                name: create_assistant.name,
                description: create_assistant.description,
                tone: create_assistant.tone,
                personality: create_assistant.personality,
                history_window: create_assistant.history_window,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(assistant.into())))
}

pub mod schemas {
    use crate::infrastructure::entities;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Deserialize, Debug)]
    pub struct CreateAssistant {
        pub name: String,
        pub description: Option<String>,
        pub tone: Option<String>,
        pub personality: Option<String>,
        pub history_window: Option<i64>,
    }

    #[derive(Serialize, Debug)]
    pub struct Assistant {
        pub id: Uuid,
        pub name: String,
        pub description: Option<String>,
        pub tone: Option<String>,
        pub personality: Option<String>,
        pub is_active: bool,
        pub history_window: i64,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::Assistant> for Assistant {
        fn from(assistant: entities::Assistant) -> Self {
            Assistant {
                id: assistant.id,
                name: assistant.name,
                description: assistant.description,
                tone: assistant.tone,
                personality: assistant.personality,
                is_active: assistant.is_active,
                history_window: assistant.history_window,
                created_at: assistant.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct AssistantList {
        pub assistants: Vec<Assistant>,
    }
}
